//! The execution service seam
//!
//! [`ExecutionService`] is what the run client talks to. The HTTP
//! implementation speaks to the simulation backend:
//!
//! - `POST /api/run` with `{graph, headless}` answers `{run_dir, metrics}`
//! - `GET /api/catalog` answers `{blocks: [...]}`
//! - `GET /health` answers `{ok: true}`
//!
//! Non-success responses carry a JSON body whose `detail` field is a
//! human-readable message.

use std::time::Duration;

use async_trait::async_trait;
use graph_engine::GraphDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RunError};

/// Body of a run submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub graph: GraphDocument,
    pub headless: bool,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    /// Directory the service wrote the run's artifacts to
    pub run_dir: String,
    #[serde(default)]
    pub metrics: serde_json::Map<String, Value>,
}

/// Something that can execute a graph
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Execute a graph and wait for its result
    async fn run(&self, request: &RunRequest) -> Result<RunResponse>;

    /// Fetch the raw block catalog payload
    async fn catalog(&self) -> Result<Value>;

    /// Whether the service is reachable and healthy
    async fn health_check(&self) -> bool;
}

/// Execution service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpExecutionService {
    /// HTTP client for API requests
    http_client: reqwest::Client,
    /// Base URL of the service, without a trailing slash
    base_url: String,
}

impl HttpExecutionService {
    /// Create a client for the service at `base_url`
    ///
    /// `timeout` bounds each whole request, including the run itself.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, http_client))
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into a service error
    async fn service_error(response: reqwest::Response) -> RunError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        RunError::Service {
            status: status.as_u16(),
            detail: error_detail(&body, status.canonical_reason()),
        }
    }
}

/// Extract the human-readable message from an error body
///
/// Prefers a string `detail`, then any other `detail` rendered as JSON,
/// then the raw body, then the status reason.
fn error_detail(body: &str, reason: Option<&str>) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        match map.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    reason.unwrap_or("unknown error").to_string()
}

#[async_trait]
impl ExecutionService for HttpExecutionService {
    async fn run(&self, request: &RunRequest) -> Result<RunResponse> {
        let url = self.url("/api/run");
        log::debug!("POST {} ({} nodes)", url, request.graph.nodes.len());

        let response = self.http_client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(Self::service_error(response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| RunError::InvalidResponse(format!("Failed to parse run result: {}", e)))
    }

    async fn catalog(&self) -> Result<Value> {
        let url = self.url("/api/catalog");
        log::debug!("GET {}", url);

        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::service_error(response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| RunError::InvalidResponse(format!("Failed to parse catalog: {}", e)))
    }

    async fn health_check(&self) -> bool {
        let url = self.url("/health");
        match self.http_client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("ok").and_then(Value::as_bool))
                .unwrap_or(false),
            Ok(resp) => {
                log::debug!("Health check returned {}", resp.status());
                false
            }
            Err(e) => {
                log::debug!("Health check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_prefers_detail_field() {
        assert_eq!(
            error_detail(r#"{"detail": "Missing input: n1.command"}"#, Some("Internal Server Error")),
            "Missing input: n1.command"
        );
        assert_eq!(
            error_detail(r#"{"detail": [{"loc": ["body"]}]}"#, None),
            r#"[{"loc":["body"]}]"#
        );
    }

    #[test]
    fn test_error_detail_fallbacks() {
        assert_eq!(error_detail("upstream exploded", None), "upstream exploded");
        assert_eq!(error_detail("  ", Some("Bad Gateway")), "Bad Gateway");
        assert_eq!(error_detail("", None), "unknown error");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let service =
            HttpExecutionService::new("http://127.0.0.1:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(service.base_url(), "http://127.0.0.1:8000");
        assert_eq!(service.url("/health"), "http://127.0.0.1:8000/health");
    }

    #[test]
    fn test_response_metrics_default() {
        let response: RunResponse = serde_json::from_str(r#"{"run_dir": "runs/1"}"#).unwrap();
        assert_eq!(response.run_dir, "runs/1");
        assert!(response.metrics.is_empty());
    }
}
