//! Scrape task abstraction and the HTTP page probe.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use super::config::WorkerConfig;

/// Errors from running a scrape task.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The target URL could not be built.
    #[error("invalid target url {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },

    /// Transport-level failure.
    #[error("request failed: {0}")]
    Http(String),

    /// The request did not finish in time.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The page snapshot could not be written.
    #[error("failed to write artifact {path}: {reason}")]
    Artifact { path: String, reason: String },

    /// Task-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Result of a successful scrape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub url: String,
    pub http_status: u16,
    pub title: Option<String>,
    pub bytes: usize,
    /// Hex SHA-256 of the page body.
    pub sha256: String,
    pub artifact: Option<PathBuf>,
}

/// The work a worker performs for one item.
#[async_trait]
pub trait ScrapeTask: Send + Sync {
    /// Task name for logging.
    fn name(&self) -> &str;

    /// Scrape one `(group, item)`.
    async fn run(&self, group: &str, item: &str) -> Result<TaskOutput, TaskError>;
}

static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid")
});

/// Snapshot file name for an item; anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn artifact_file_name(group: &str, item: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };
    format!("{}_{}.html", clean(group), clean(item))
}

fn extract_title(body: &str) -> Option<String> {
    TITLE_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|title| !title.is_empty())
}

/// Fetches one page per item and keeps a snapshot of it.
pub struct PageProbe {
    client: Client,
    target_url: String,
    artifact_dir: PathBuf,
    timeout_secs: u64,
}

impl PageProbe {
    /// Create a probe from the worker configuration.
    pub fn new(config: &WorkerConfig) -> Result<Self, TaskError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TaskError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            target_url: config.target_url.clone(),
            artifact_dir: config.artifact_dir.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// The URL fetched for an item.
    pub fn target_for(&self, group: &str, item: &str) -> Result<reqwest::Url, TaskError> {
        let url = self
            .target_url
            .replace("{group}", &urlencoding::encode(group))
            .replace("{item}", &urlencoding::encode(item));
        reqwest::Url::parse(&url).map_err(|e| TaskError::InvalidTarget {
            url,
            reason: e.to_string(),
        })
    }

    async fn write_artifact(&self, file_name: &str, body: &[u8]) -> Result<PathBuf, TaskError> {
        let path = self.artifact_dir.join(file_name);
        let to_error = |path: &Path, e: std::io::Error| TaskError::Artifact {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.artifact_dir)
            .await
            .map_err(|e| to_error(&self.artifact_dir, e))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| to_error(&path, e))?;
        Ok(path)
    }
}

#[async_trait]
impl ScrapeTask for PageProbe {
    fn name(&self) -> &str {
        "page-probe"
    }

    async fn run(&self, group: &str, item: &str) -> Result<TaskOutput, TaskError> {
        let url = self.target_for(group, item)?;
        debug!(group, item, url = %url, "Fetching page");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                TaskError::Timeout(self.timeout_secs)
            } else {
                TaskError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TaskError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TaskError::Timeout(self.timeout_secs)
            } else {
                TaskError::Http(e.to_string())
            }
        })?;

        let title = extract_title(&String::from_utf8_lossy(&body));
        let sha256 = format!("{:x}", Sha256::digest(&body));
        let artifact = self
            .write_artifact(&artifact_file_name(group, item), &body)
            .await?;

        info!(
            group,
            item,
            url = %url,
            status = status.as_u16(),
            title = title.as_deref().unwrap_or("-"),
            bytes = body.len(),
            sha256 = %sha256,
            artifact = %artifact.display(),
            "Page captured"
        );

        Ok(TaskOutput {
            url: url.to_string(),
            http_status: status.as_u16(),
            title,
            bytes: body.len(),
            sha256,
            artifact: Some(artifact),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::Html;
    use axum::routing::get;
    use axum::Router;
    use tempfile::TempDir;

    const PAGE: &str =
        "<html><head><title>\n  Fleet   Test </title></head><body>ok</body></html>";

    async fn serve() -> String {
        let app = Router::new()
            .route("/page", get(|| async { Html(PAGE) }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn probe(target_url: String, dir: &TempDir) -> PageProbe {
        PageProbe::new(&WorkerConfig {
            target_url,
            artifact_dir: dir.path().join("artifacts"),
            request_timeout_secs: 5,
            ..WorkerConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<TITLE lang=\"en\">GitHub  ·  Build</TITLE>"),
            Some("GitHub · Build".to_string())
        );
        assert_eq!(extract_title("<title>   </title>"), None);
        assert_eq!(extract_title("no title here"), None);
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(artifact_file_name("UK", "London"), "UK_London.html");
        assert_eq!(artifact_file_name("UK", "../etc/passwd"), "UK_.._etc_passwd.html");
    }

    #[test]
    fn test_target_placeholders_are_encoded() {
        let dir = TempDir::new().unwrap();
        let probe = probe("https://example.com/search?c={group}&q={item}".to_string(), &dir);
        let url = probe.target_for("UK", "Stoke-on-Trent&x=1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/search?c=UK&q=Stoke-on-Trent%26x%3D1"
        );
    }

    #[tokio::test]
    async fn test_probe_captures_page() {
        let base = serve().await;
        let dir = TempDir::new().unwrap();
        let probe = probe(format!("{}/page", base), &dir);

        let output = probe.run("UK", "London").await.unwrap();
        assert_eq!(output.http_status, 200);
        assert_eq!(output.title.as_deref(), Some("Fleet Test"));
        assert_eq!(output.sha256.len(), 64);

        let artifact = output.artifact.unwrap();
        assert!(artifact.ends_with("UK_London.html"));
        let saved = std::fs::read_to_string(artifact).unwrap();
        assert!(saved.contains("<body>ok</body>"));
    }

    #[tokio::test]
    async fn test_probe_rejects_error_status() {
        let base = serve().await;
        let dir = TempDir::new().unwrap();
        let probe = probe(format!("{}/missing", base), &dir);

        let err = probe.run("UK", "London").await.unwrap_err();
        assert!(matches!(err, TaskError::Status { status: 404, .. }));
        assert!(!dir.path().join("artifacts").join("UK_London.html").exists());
    }

    #[tokio::test]
    async fn test_probe_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = TempDir::new().unwrap();
        let probe = probe(format!("http://{}/page", addr), &dir);
        let err = probe.run("UK", "London").await.unwrap_err();
        assert!(matches!(err, TaskError::Http(_)));
    }
}
