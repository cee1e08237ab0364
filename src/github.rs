//! GitHub REST API adapter.
//!
//! A thin I/O client over the endpoints the pipeline needs: content-by-path
//! (base64 envelope), language breakdown, and the recursive tree of the
//! default branch. The client is constructed explicitly and passed into each
//! component — no module-level singletons or token fallbacks.
//!
//! Failure semantics are deliberately asymmetric:
//! - [`GitHubClient::check_file_exists`] swallows transport errors and
//!   returns `false`. A transient network failure during a delete-detection
//!   check therefore reads as "file removed" — callers relying on it for
//!   deletes must accept that trade-off.
//! - [`GitHubClient::get_file_content`] logs and returns `None` on any
//!   failure; callers treat `None` as "skip this file".
//! - Tree and language fetches propagate errors; there is no reasonable
//!   fallback for them.

use anyhow::{bail, Context, Result};
use base64::Engine;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GitHubConfig;

/// One entry of the recursive repository tree.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    /// `"blob"` for files, `"tree"` for directories.
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
    #[serde(default)]
    pub size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct RepoMetadata {
    default_branch: String,
}

/// Authenticated GitHub REST client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Build a client against an explicit API base URL.
    pub fn new(api_base: impl Into<String>, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build a client from configuration, reading the token from the
    /// configured environment variable if present.
    pub fn from_config(config: &GitHubConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env).ok();
        Self::new(&config.api_url, token, config.timeout_secs)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .header("User-Agent", "repo-pulse")
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    /// Check whether a path exists at the HEAD of the default branch.
    ///
    /// Any transport or API error maps to `false`.
    pub async fn check_file_exists(&self, owner: &str, repo: &str, path: &str) -> bool {
        let url = format!("/repos/{}/{}/contents/{}", owner, repo, path);
        match self.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(path, error = %e, "existence check failed, treating as absent");
                false
            }
        }
    }

    /// Fetch a file's decoded content, or `None` when the file is missing,
    /// the API returns no `content` field, or any error occurs.
    pub async fn get_file_content(&self, owner: &str, repo: &str, path: &str) -> Option<String> {
        let url = format!("/repos/{}/{}/contents/{}", owner, repo, path);

        let response = match self.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(path, error = %e, "content fetch failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(path, status = %response.status(), "content fetch returned non-success");
            return None;
        }

        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(path, error = %e, "content response was not valid JSON");
                return None;
            }
        };

        let encoded = body.get("content").and_then(|c| c.as_str())?;
        // GitHub wraps the base64 payload across lines.
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

        match base64::engine::general_purpose::STANDARD.decode(compact) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).to_string()),
            Err(e) => {
                warn!(path, error = %e, "content envelope was not valid base64");
                None
            }
        }
    }

    /// Fetch the language → byte-count breakdown.
    pub async fn get_repository_languages(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<BTreeMap<String, i64>> {
        let url = format!("/repos/{}/{}/languages", owner, repo);
        let response = self
            .get(&url)
            .send()
            .await
            .with_context(|| format!("language fetch failed for {}/{}", owner, repo))?;

        if !response.status().is_success() {
            bail!(
                "language fetch for {}/{} returned {}",
                owner,
                repo,
                response.status()
            );
        }

        Ok(response.json().await?)
    }

    /// Fetch the full recursive tree from the HEAD of the default branch.
    pub async fn get_repository_tree(&self, owner: &str, repo: &str) -> Result<Vec<TreeEntry>> {
        // Resolve the default branch first; tree-by-SHA accepts a branch name.
        let meta_url = format!("/repos/{}/{}", owner, repo);
        let response = self
            .get(&meta_url)
            .send()
            .await
            .with_context(|| format!("repository metadata fetch failed for {}/{}", owner, repo))?;

        if !response.status().is_success() {
            bail!(
                "repository metadata fetch for {}/{} returned {}",
                owner,
                repo,
                response.status()
            );
        }

        let meta: RepoMetadata = response.json().await?;

        let tree_url = format!(
            "/repos/{}/{}/git/trees/{}?recursive=1",
            owner, repo, meta.default_branch
        );
        let response = self
            .get(&tree_url)
            .send()
            .await
            .with_context(|| format!("tree fetch failed for {}/{}", owner, repo))?;

        if !response.status().is_success() {
            bail!(
                "tree fetch for {}/{} returned {}",
                owner,
                repo,
                response.status()
            );
        }

        let tree: TreeResponse = response.json().await?;
        Ok(tree.tree)
    }
}

/// Split a repository URL into `(owner, repo)`.
///
/// Strips the github.com prefix and a trailing `.git`, then splits on `/`.
/// Missing components come back as empty strings — callers must validate.
pub fn parse_repository_url(url: &str) -> (String, String) {
    let trimmed = url
        .trim()
        .trim_start_matches("https://github.com/")
        .trim_start_matches("http://github.com/")
        .trim_end_matches('/')
        .trim_end_matches(".git");

    let mut parts = trimmed.splitn(2, '/');
    let owner = parts.next().unwrap_or_default().to_string();
    let repo = parts.next().unwrap_or_default().to_string();
    (owner, repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GitHubClient {
        GitHubClient::new(server.uri(), None, 5).unwrap()
    }

    #[test]
    fn test_parse_repository_url() {
        assert_eq!(
            parse_repository_url("https://github.com/acme/widgets"),
            ("acme".to_string(), "widgets".to_string())
        );
        assert_eq!(
            parse_repository_url("https://github.com/acme/widgets.git"),
            ("acme".to_string(), "widgets".to_string())
        );
        assert_eq!(
            parse_repository_url("https://github.com/acme"),
            ("acme".to_string(), String::new())
        );
        assert_eq!(parse_repository_url(""), (String::new(), String::new()));
    }

    #[tokio::test]
    async fn test_check_file_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/contents/src/a.ts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.check_file_exists("acme", "widgets", "src/a.ts").await);
        assert!(!client.check_file_exists("acme", "widgets", "src/gone.ts").await);
    }

    #[tokio::test]
    async fn test_get_file_content_decodes_envelope() {
        let server = MockServer::start().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode("export const x = 1;\n");
        // GitHub splits the payload across lines; reproduce that.
        let wrapped = format!("{}\n", encoded);

        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/contents/src/x.ts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": wrapped,
                "encoding": "base64",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let content = client.get_file_content("acme", "widgets", "src/x.ts").await;
        assert_eq!(content.as_deref(), Some("export const x = 1;\n"));
    }

    #[tokio::test]
    async fn test_get_file_content_missing_field_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/contents/dir"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.get_file_content("acme", "widgets", "dir").await.is_none());
        // 404 is also None, not an error.
        assert!(client.get_file_content("acme", "widgets", "nope.ts").await.is_none());
    }

    #[tokio::test]
    async fn test_get_repository_tree() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "default_branch": "main",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/git/trees/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "abc123",
                "tree": [
                    {"path": "src", "type": "tree", "sha": "d1"},
                    {"path": "src/index.ts", "type": "blob", "sha": "f1", "size": 120},
                ],
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let tree = client.get_repository_tree("acme", "widgets").await.unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[1].path, "src/index.ts");
        assert_eq!(tree[1].kind, "blob");
        assert_eq!(tree[1].size, Some(120));
    }

    #[tokio::test]
    async fn test_tree_fetch_propagates_errors() {
        let server = MockServer::start().await;
        // No mocks mounted: metadata fetch 404s.
        let client = client_for(&server);
        assert!(client.get_repository_tree("acme", "widgets").await.is_err());
        assert!(client.get_repository_languages("acme", "widgets").await.is_err());
    }
}
