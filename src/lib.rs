//! # Repo Pulse
//!
//! A webhook-driven repository indexing and change-analysis service.
//!
//! Repo Pulse connects to GitHub repositories, keeps a summarized and
//! embedded index of their source files in SQLite, and reacts to webhook
//! deliveries: pushes update the index incrementally, significant change
//! sets escalate to a full structural re-analysis, and pull requests and
//! releases are queued for analysis. A standalone diff engine produces
//! line-level and semantic diffs with impact assessment.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌───────────┐
//! │ Webhooks │──▶│ Processors │──▶│  SQLite   │
//! │ (GitHub) │   │ + Job Bus  │   │ Idx+Jobs  │
//! └──────────┘   └─────┬──────┘   └─────┬─────┘
//!                      │                │
//!                ┌─────▼──────┐   ┌─────▼─────┐
//!                │ Reindexer  │   │    CLI    │
//!                │ Sum+Embed  │   │   (rpx)   │
//!                └────────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rpx init                                  # create database
//! rpx project add https://github.com/o/r    # connect a repository
//! rpx analyze https://github.com/o/r        # structure snapshot + key files
//! rpx diff old.ts new.ts --semantic         # impact-assessed diff
//! rpx serve webhook                         # start the receiver
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`patterns`] | Path classification and framework detection |
//! | [`policy`] | Smart-reindex trigger decision |
//! | [`github`] | GitHub REST client |
//! | [`structure`] | Repository structure analysis |
//! | [`reindex`] | Incremental file re-indexing |
//! | [`webhook`] | Webhook event processors |
//! | [`jobs`] | Typed job bus (outbox) |
//! | [`diff`] | Line diff engine |
//! | [`semantic`] | Semantic diff and impact assessment |
//! | [`summarize`] | Summarization providers |
//! | [`embedding`] | Embedding providers and vector codecs |
//! | [`server`] | Webhook HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod diff;
pub mod embedding;
pub mod github;
pub mod jobs;
pub mod migrate;
pub mod models;
pub mod patterns;
pub mod policy;
pub mod projects;
pub mod reindex;
pub mod semantic;
pub mod server;
pub mod structure;
pub mod summarize;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testutil;
