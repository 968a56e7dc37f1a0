use std::time::Duration;

use crate::error::{ChatError, ChatResult};

const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
const DEFAULT_EXEC_CONTEXT: &str = "lugha";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Client settings. Every field is overridable via env for custom deployments.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the execution backend (`LUGHA_BACKEND_URL`).
    pub backend_url: String,
    /// Endpoint identifier sent with button actions (`LUGHA_EXEC_CONTEXT`).
    pub exec_context: String,
    /// Per-request timeout (`LUGHA_REQUEST_TIMEOUT_SECS`).
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            exec_context: DEFAULT_EXEC_CONTEXT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source; `from_env` uses the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ChatResult<Self> {
        let defaults = Self::default();

        let backend_url = lookup("LUGHA_BACKEND_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.backend_url);
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(ChatError::Config(format!(
                "LUGHA_BACKEND_URL must be an http(s) URL, got '{}'",
                backend_url
            )));
        }

        let exec_context = lookup("LUGHA_EXEC_CONTEXT").unwrap_or(defaults.exec_context);

        let request_timeout = match lookup("LUGHA_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ChatError::Config(format!(
                        "LUGHA_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                        raw
                    ))
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        Ok(Self {
            backend_url,
            exec_context,
            request_timeout,
        })
    }
}
