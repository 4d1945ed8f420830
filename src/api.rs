//! HTTP client for the AI-Bridge backend API.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Backend API types (mirror what the bridge server exposes) ---

/// Body of `POST /api/start_session`.
#[derive(Debug, Clone, Serialize)]
pub struct StartSessionRequest {
    pub objective: String,
    pub mode: String,
    /// agent id → role id map, e.g. `{"claude-a": "controller"}`.
    pub roles: HashMap<String, String>,
}

/// Body of `POST /api/send_message`.
///
/// Optional fields are omitted from the serialized JSON body entirely
/// (not sent as `null`) — manual sends carry no `last_seen`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub role: String,
    pub intent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// One entry of the server's authoritative message list.
///
/// Only `sender` and `content` are load-bearing; everything else is
/// tolerated-if-absent so the client survives server-side shape drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Response of `GET /api/messages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesResponse {
    /// Authoritative total. Falls back to `messages.len()` when absent.
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

impl MessagesResponse {
    /// The server-side total this response represents.
    pub fn total(&self) -> usize {
        self.count.unwrap_or(self.messages.len())
    }
}

/// Response of `GET /api/metrics`. Each value independently defaults to 0.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct MetricsResponse {
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub messages_per_minute: f64,
    #[serde(default)]
    pub repeat_count: u64,
}

/// Body of `POST /api/set_yes_all`.
#[derive(Debug, Clone, Serialize)]
pub struct SetYesAllRequest {
    pub agent: String,
    pub value: bool,
}

/// One file of a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleFile {
    pub path: String,
    pub content: String,
}

/// Body of `POST /api/apply_file_bundle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBundleRequest {
    #[serde(default)]
    pub base_dir: String,
    pub files: Vec<BundleFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileBundleResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub created: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Crate-level error taxonomy.
///
/// Validation variants fire before any network call; transport variants carry
/// enough context to diagnose the failure without inspecting the source.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The backend replied with a non-2xx HTTP status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    /// Response body could not be parsed as the expected JSON structure.
    #[error("JSON parse error on field '{field}': {detail}")]
    Json { field: String, detail: String },
    /// A TCP-level connection could not be established.
    #[error("Connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },
    /// The backend accepted the request but reported a failure.
    #[error("{message}")]
    Backend { message: String },
    /// `start` was invoked with an empty objective.
    #[error("Define an objective before starting")]
    EmptyObjective,
    /// A dispatch was attempted with empty message text.
    #[error("Write a message first")]
    EmptyMessage,
    /// Export was attempted with no history.
    #[error("No conversation to export")]
    EmptyExport,
    /// The objective store could not be read or written.
    #[error("Store error at {path}: {detail}")]
    Store { path: String, detail: String },
    /// An export file could not be written.
    #[error("Export failed: {detail}")]
    Export { detail: String },
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Configuration for the backend client.
#[derive(Debug, Clone)]
pub struct BridgeClientConfig {
    /// Base URL of the bridge backend (e.g. `http://localhost:8000`).
    pub base_url: String,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Per-request read timeout.
    pub request_timeout: Duration,
}

impl BridgeClientConfig {
    /// Create a config with sensible defaults.
    ///
    /// - connect_timeout: 3 s
    /// - request_timeout: 10 s
    pub fn new(base_url: impl Into<String>) -> Self {
        BridgeClientConfig {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// The backend HTTP client. Use [`BridgeClientBuilder`] for construction.
pub struct BridgeClient {
    config: BridgeClientConfig,
    client: reqwest::Client,
}

impl BridgeClient {
    /// Start building a client aimed at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> BridgeClientBuilder {
        BridgeClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, BridgeError> {
        let url = self.url(path);
        self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BridgeError::Connect {
                url,
                detail: e.to_string(),
            })
    }

    /// `POST /api/start_session`. Any 2xx response counts as success.
    pub async fn start_session(&self, req: &StartSessionRequest) -> Result<(), BridgeError> {
        let resp = self.post_json("/api/start_session", req).await?;
        if !resp.status().is_success() {
            return Err(BridgeError::Http {
                status: resp.status().as_u16(),
                url: self.url("/api/start_session"),
            });
        }
        Ok(())
    }

    /// `POST /api/send_message`.
    ///
    /// # Returns
    /// - `Ok(())` — the backend acknowledged with `success: true`.
    /// - `Err(BridgeError::Backend)` — the backend replied `success: false`;
    ///   the server-supplied error string is carried when present.
    /// - `Err(BridgeError::Connect)` / `Err(BridgeError::Http)` — transport
    ///   failures.
    pub async fn send_message(&self, req: &SendMessageRequest) -> Result<(), BridgeError> {
        let url = self.url("/api/send_message");
        let resp = self.post_json("/api/send_message", req).await?;
        let status = resp.status();

        // The server reports dispatch failures as success:false bodies, on
        // both 2xx and 4xx statuses. Prefer the body's error string.
        let bytes = resp.bytes().await.map_err(|e| BridgeError::Json {
            field: "body".into(),
            detail: e.to_string(),
        })?;

        if let Ok(parsed) = serde_json::from_slice::<SendMessageResponse>(&bytes) {
            if parsed.success {
                return Ok(());
            }
            return Err(BridgeError::Backend {
                message: parsed
                    .error
                    .unwrap_or_else(|| "Failed to send message".to_string()),
            });
        }

        if !status.is_success() {
            return Err(BridgeError::Http {
                status: status.as_u16(),
                url,
            });
        }
        Err(BridgeError::Json {
            field: "success".into(),
            detail: "unrecognized send_message response body".to_string(),
        })
    }

    /// `GET /api/messages` — the authoritative count and message list.
    pub async fn fetch_messages(&self) -> Result<MessagesResponse, BridgeError> {
        let url = self.url("/api/messages");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Connect {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(BridgeError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }

        resp.json::<MessagesResponse>()
            .await
            .map_err(|e| BridgeError::Json {
                field: "messages".into(),
                detail: e.to_string(),
            })
    }

    /// `GET /api/metrics` — aggregate counters for display only.
    pub async fn fetch_metrics(&self) -> Result<MetricsResponse, BridgeError> {
        let url = self.url("/api/metrics");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Connect {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(BridgeError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }

        resp.json::<MetricsResponse>()
            .await
            .map_err(|e| BridgeError::Json {
                field: "metrics".into(),
                detail: e.to_string(),
            })
    }

    /// `POST /api/set_yes_all` — best-effort gating toggle.
    ///
    /// Failure is part of the contract here: callers log the error and move
    /// on, never retry, never surface it as a session failure.
    pub async fn set_yes_all(&self, agent: &str, value: bool) -> Result<(), BridgeError> {
        let req = SetYesAllRequest {
            agent: agent.to_string(),
            value,
        };
        let resp = self.post_json("/api/set_yes_all", &req).await?;
        if !resp.status().is_success() {
            return Err(BridgeError::Http {
                status: resp.status().as_u16(),
                url: self.url("/api/set_yes_all"),
            });
        }
        Ok(())
    }

    /// `POST /api/apply_file_bundle` — create files under the server workspace.
    pub async fn apply_file_bundle(
        &self,
        req: &FileBundleRequest,
    ) -> Result<FileBundleResponse, BridgeError> {
        let resp = self.post_json("/api/apply_file_bundle", req).await?;
        let parsed = resp
            .json::<FileBundleResponse>()
            .await
            .map_err(|e| BridgeError::Json {
                field: "bundle".into(),
                detail: e.to_string(),
            })?;
        if parsed.success {
            Ok(parsed)
        } else {
            Err(BridgeError::Backend {
                message: parsed
                    .error
                    .unwrap_or_else(|| "failed applying bundle".to_string()),
            })
        }
    }

    /// `GET /api/logs?tail=N` — the project log tail as plain text.
    pub async fn fetch_log_tail(&self, tail: usize) -> Result<String, BridgeError> {
        let url = format!("{}/api/logs?tail={}", self.config.base_url, tail);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Connect {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(BridgeError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }

        resp.text().await.map_err(|e| BridgeError::Json {
            field: "body".into(),
            detail: e.to_string(),
        })
    }
}

/// Builder for [`BridgeClient`].
pub struct BridgeClientBuilder {
    config: BridgeClientConfig,
}

impl BridgeClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        BridgeClientBuilder {
            config: BridgeClientConfig::new(base_url),
        }
    }

    /// Override the TCP connect timeout (default 3 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Override the per-request read timeout (default 10 s).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Consume the builder and construct a [`BridgeClient`].
    pub fn build(self) -> BridgeClient {
        // reqwest::Client::builder() can fail in extreme environments, but
        // unwrap_or_default() falls back to a default client instead of panicking.
        let client = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .build()
            .unwrap_or_default();
        BridgeClient {
            config: self.config,
            client,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
