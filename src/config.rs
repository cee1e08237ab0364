use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Environment variable holding the API token; unauthenticated if unset.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Line budget for the offline `truncate` provider.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_summarizer_provider(),
            model: None,
            max_lines: default_max_lines(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_summarizer_provider() -> String {
    "truncate".to_string()
}
fn default_max_lines() -> usize {
    40
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Environment variable holding the webhook shared secret. Verification
    /// fails closed when the variable is unset.
    #[serde(default = "default_secret_env")]
    pub webhook_secret_env: String,
}

fn default_secret_env() -> String {
    "WEBHOOK_SECRET".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    // Validate summarizer
    match config.summarizer.provider.as_str() {
        "truncate" | "openai" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown summarizer provider: '{}'. Must be truncate, openai, or disabled.",
            other
        ),
    }
    if config.summarizer.provider == "truncate" && config.summarizer.max_lines == 0 {
        anyhow::bail!("summarizer.max_lines must be > 0 for the truncate provider");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rpx.toml");
        std::fs::write(&path, body).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/rpx.sqlite"

[server]
bind = "127.0.0.1:7420"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.summarizer.provider, "truncate");
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.server.webhook_secret_env, "WEBHOOK_SECRET");
    }

    #[test]
    fn test_embedding_requires_dims_and_model() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/rpx.sqlite"

[server]
bind = "127.0.0.1:7420"

[embedding]
provider = "openai"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/rpx.sqlite"

[server]
bind = "127.0.0.1:7420"

[embedding]
provider = "quantum"
model = "m"
dims = 8
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
