//! Summarization provider abstraction.
//!
//! The file processor indexes a semantic summary of each file, not the raw
//! source. Providers:
//! - **truncate** — offline default; the first `max_lines` lines prefixed
//!   with the source label. No network.
//! - **openai** — chat-completions call asking for a short summary.
//! - **disabled** — always returns an empty string, which the file processor
//!   treats as "nothing to index".
//!
//! An empty or blank summary is a valid provider output, not an error.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SummarizerConfig;

/// Produces a short semantic summary of file content.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `content`; `source_label` names the file for context.
    /// May return an empty string, meaning "nothing to index".
    async fn summarize(&self, content: &str, source_label: &str) -> Result<String>;
}

/// Instantiate the configured provider.
pub fn create_summarizer(config: &SummarizerConfig) -> Result<Arc<dyn Summarizer>> {
    match config.provider.as_str() {
        "truncate" => Ok(Arc::new(TruncateSummarizer {
            max_lines: config.max_lines,
        })),
        "openai" => Ok(Arc::new(OpenAiSummarizer::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledSummarizer)),
        other => bail!("Unknown summarizer provider: {}", other),
    }
}

/// Always produces an empty summary; everything is skipped downstream.
pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarize(&self, _content: &str, _source_label: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// Offline summarizer: label plus the first `max_lines` lines of content.
pub struct TruncateSummarizer {
    pub max_lines: usize,
}

#[async_trait]
impl Summarizer for TruncateSummarizer {
    async fn summarize(&self, content: &str, source_label: &str) -> Result<String> {
        let head: Vec<&str> = content.lines().take(self.max_lines).collect();
        if head.iter().all(|l| l.trim().is_empty()) {
            return Ok(String::new());
        }
        Ok(format!("{}\n{}", source_label, head.join("\n")))
    }
}

/// Summarizer backed by the OpenAI chat completions API.
///
/// Requires `OPENAI_API_KEY` in the environment. Non-success responses are
/// errors (no retry — the file processor already isolates per-file failures).
pub struct OpenAiSummarizer {
    model: String,
    http: reqwest::Client,
}

impl OpenAiSummarizer {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { model, http })
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, content: &str, source_label: &str) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "Summarize the given source file in a few sentences for a code search index. Mention its purpose and main exports.",
                },
                {
                    "role": "user",
                    "content": format!("File: {}\n\n{}", source_label, content),
                },
            ],
        });

        let response = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let summary = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.pointer("/message/content"))
            .and_then(|content| content.as_str())
            .unwrap_or_default();

        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_truncate_summarizer() {
        let summarizer = TruncateSummarizer { max_lines: 2 };
        let summary = summarizer
            .summarize("line 1\nline 2\nline 3\n", "src/a.ts")
            .await
            .unwrap();
        assert!(summary.starts_with("src/a.ts"));
        assert!(summary.contains("line 2"));
        assert!(!summary.contains("line 3"));
    }

    #[tokio::test]
    async fn test_truncate_blank_content_is_empty() {
        let summarizer = TruncateSummarizer { max_lines: 10 };
        let summary = summarizer.summarize("  \n\n  \n", "src/a.ts").await.unwrap();
        assert!(summary.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_summarizer_is_empty() {
        let summary = DisabledSummarizer
            .summarize("function f() {}", "src/a.ts")
            .await
            .unwrap();
        assert!(summary.is_empty());
    }
}
