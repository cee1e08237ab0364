//! # Repo Pulse CLI (`rpx`)
//!
//! The `rpx` binary is the primary interface for Repo Pulse. It provides
//! commands for database initialization, project management, repository
//! analysis, manual re-indexing, diffing, and starting the webhook server.
//!
//! ## Usage
//!
//! ```bash
//! rpx --config ./config/rpx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rpx init` | Create the SQLite database and run schema migrations |
//! | `rpx project add <url>` | Connect a repository |
//! | `rpx project list` | List connected projects |
//! | `rpx analyze <url>` | Analyze repository structure and list key files |
//! | `rpx reindex <url> <paths>...` | Re-index specific files |
//! | `rpx diff <old> <new>` | Diff two file versions |
//! | `rpx jobs` | Show pending queued jobs |
//! | `rpx serve webhook` | Start the webhook receiver |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use repo_pulse::{
    config, db, diff, embedding, github::GitHubClient, jobs, migrate, projects, reindex, semantic,
    server, structure, summarize,
};

/// Repo Pulse CLI — webhook-driven repository indexing and change analysis.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rpx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rpx",
    about = "Repo Pulse — webhook-driven repository indexing and change analysis",
    version,
    long_about = "Repo Pulse keeps a summarized, embedded index of connected GitHub \
    repositories in SQLite, updates it incrementally from webhook deliveries, and \
    provides line-level and semantic diffs with impact assessment."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rpx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (projects,
    /// source_files, commits, jobs). Idempotent.
    Init,

    /// Manage connected projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Analyze a connected repository's structure.
    ///
    /// Fetches the language breakdown and full file tree, classifies every
    /// file, persists the snapshot, and prints the prioritized key files.
    Analyze {
        /// Repository URL (must match a connected project exactly).
        repo_url: String,
    },

    /// Re-index specific files of a connected repository.
    ///
    /// Fetches, summarizes, and embeds each path; deleted files are removed
    /// from the index. Prints one outcome per path.
    Reindex {
        /// Repository URL (must match a connected project exactly).
        repo_url: String,

        /// Paths to re-index, relative to the repository root.
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Diff two versions of a file.
    ///
    /// Reads both files from disk and prints the unified diff with change
    /// statistics. With `--semantic`, layers on change classification,
    /// risk assessment, and recommendations as JSON.
    Diff {
        /// Path to the original version.
        old: PathBuf,

        /// Path to the modified version.
        new: PathBuf,

        /// Produce a semantic diff with impact assessment.
        #[arg(long)]
        semantic: bool,

        /// Logical file name used in the diff header (defaults to the new path).
        #[arg(long)]
        name: Option<String>,
    },

    /// Show pending queued jobs.
    Jobs,

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

/// Project management subcommands.
#[derive(Subcommand)]
enum ProjectAction {
    /// Connect a repository.
    Add {
        /// Repository URL, e.g. `https://github.com/acme/widgets`.
        repo_url: String,

        /// Branch whose pushes drive indexing.
        #[arg(long, default_value = "main")]
        default_branch: String,
    },
    /// List connected projects.
    List,
}

/// Server subcommands.
#[derive(Subcommand)]
enum ServeService {
    /// Start the webhook receiver.
    ///
    /// Binds to `[server].bind` and accepts GitHub webhook deliveries.
    Webhook,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Diff works on local files and needs no config or database.
    if let Commands::Diff {
        old,
        new,
        semantic,
        name,
    } = &cli.command
    {
        return run_diff(old, new, *semantic, name.as_deref());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Project { action } => match action {
            ProjectAction::Add {
                repo_url,
                default_branch,
            } => {
                let pool = db::connect(&cfg).await?;
                let project = projects::create_project(&pool, &repo_url, &default_branch).await?;
                println!("Connected {} as project {}", repo_url, project.id);
            }
            ProjectAction::List => {
                let pool = db::connect(&cfg).await?;
                let all = projects::list_projects(&pool).await?;
                if all.is_empty() {
                    println!("No connected projects.");
                }
                for project in all {
                    println!(
                        "{}  {}/{} (default branch: {})",
                        project.id,
                        project.repository.owner,
                        project.repository.repo,
                        project.repository.default_branch
                    );
                }
            }
        },
        Commands::Analyze { repo_url } => {
            let pool = db::connect(&cfg).await?;
            let project = find_project(&pool, &repo_url).await?;
            let client = GitHubClient::from_config(&cfg.github)?;

            let (key_files, s) =
                structure::identify_key_files(&pool, &client, &project.id, &repo_url).await?;

            println!("Framework: {}", s.framework);
            println!("Files: {} ({} directories)", s.total_files, s.directories.len());
            if !s.languages.is_empty() {
                let langs: Vec<String> = s
                    .languages
                    .iter()
                    .map(|(name, bytes)| format!("{} ({} bytes)", name, bytes))
                    .collect();
                println!("Languages: {}", langs.join(", "));
            }
            println!(
                "Categories: {} config, {} entry, {} core, {} api, {} schema, {} test, {} docs",
                s.config_files.len(),
                s.entry_points.len(),
                s.core_files.len(),
                s.api_files.len(),
                s.schema_files.len(),
                s.test_files.len(),
                s.doc_files.len()
            );
            println!("\nKey files ({}):", key_files.len());
            for file in key_files {
                println!("  {}", file);
            }
        }
        Commands::Reindex { repo_url, paths } => {
            let pool = db::connect(&cfg).await?;
            let project = find_project(&pool, &repo_url).await?;

            let processor = reindex::FileProcessor::new(
                pool.clone(),
                GitHubClient::from_config(&cfg.github)?,
                summarize::create_summarizer(&cfg.summarizer)?,
                embedding::create_embedder(&cfg.embedding)?,
            );

            let outcomes = processor
                .reindex_changed_files(&project.id, &repo_url, &paths)
                .await;
            for outcome in outcomes {
                match outcome.detail {
                    Some(detail) => {
                        println!("{:?}: {} ({})", outcome.status, outcome.file_path, detail)
                    }
                    None => println!("{:?}: {}", outcome.status, outcome.file_path),
                }
            }
        }
        Commands::Jobs => {
            let pool = db::connect(&cfg).await?;
            let pending = jobs::list_pending(&pool).await?;
            if pending.is_empty() {
                println!("No pending jobs.");
            }
            for job in pending {
                println!("{}  {}  {}", job.id, job.event, job.payload_json);
            }
        }
        Commands::Serve { service } => match service {
            ServeService::Webhook => {
                let pool = db::connect(&cfg).await?;
                migrate::apply_schema(&pool).await?;
                server::run_server(&cfg, pool).await?;
            }
        },
        Commands::Diff { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

async fn find_project(
    pool: &sqlx::SqlitePool,
    repo_url: &str,
) -> anyhow::Result<repo_pulse::models::Project> {
    projects::get_projects_for_repository(pool, repo_url)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No project connected for {} — run `rpx project add {}` first",
                repo_url,
                repo_url
            )
        })
}

fn run_diff(old: &PathBuf, new: &PathBuf, semantic_mode: bool, name: Option<&str>) -> anyhow::Result<()> {
    let original = std::fs::read_to_string(old)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", old.display(), e))?;
    let modified = std::fs::read_to_string(new)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", new.display(), e))?;
    let file_name = name
        .map(str::to_string)
        .unwrap_or_else(|| new.display().to_string());

    if semantic_mode {
        let result = semantic::generate_semantic_diff(&file_name, &original, &modified);
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let result = diff::generate_file_diff(&file_name, &original, &modified);
        print!("{}", result.unified_diff);
        println!(
            "{} insertion(s), {} deletion(s), {} total change(s) in {} hunk(s)",
            result.stats.insertions,
            result.stats.deletions,
            result.stats.total_changes,
            result.hunks.len()
        );
    }

    Ok(())
}
