//! Remote code execution.
//!
//! `HttpBackend` is the production client; tests use in-memory
//! implementations of [`ExecutionBackend`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ChatError, ChatResult};

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Button action: code plus the deployment-specific endpoint identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub code: String,
    pub context: String,
}

/// Queued code block run on behalf of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecRequest {
    pub chat_id: String,
    pub message_id: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecResult {
    pub id: String,
    /// LML source of the tool message reporting the run.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Errors are split so callers can tell an unreachable backend
/// ([`ChatError::Network`]) from code that ran and failed
/// ([`ChatError::Execution`]).
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn action(&self, request: ActionRequest) -> ChatResult<ExecResult>;

    async fn exec(&self, request: ExecRequest) -> ChatResult<ExecResult>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> ChatResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ChatError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.backend_url.clone(),
        })
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> ChatResult<ExecResult> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "posting execution request");

        // Transport failures surface as `ChatError::Network`.
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ChatError::Execution(format!(
                "{} returned {}: {}",
                path,
                status.as_u16(),
                text
            )));
        }

        parse_result(&text)
    }
}

#[async_trait]
impl ExecutionBackend for HttpBackend {
    async fn action(&self, request: ActionRequest) -> ChatResult<ExecResult> {
        self.post("/action", &request).await
    }

    async fn exec(&self, request: ExecRequest) -> ChatResult<ExecResult> {
        self.post("/exec", &request).await
    }
}

/// Decodes a success body. Kept separate from the transport for testability.
pub fn parse_result(body: &str) -> ChatResult<ExecResult> {
    serde_json::from_str(body)
        .map_err(|e| ChatError::Execution(format!("malformed execution response: {}", e)))
}
