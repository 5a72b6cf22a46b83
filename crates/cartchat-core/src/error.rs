//! Turn-level errors surfaced to the chat layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of failures for one user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrorKind {
    /// Non-2xx response from the backend
    HttpStatus,
    /// Connection or request failure before or while streaming
    Network,
    /// Response body could not be read (or the SSE framing broke)
    Stream,
    /// The backend sent an `error` event
    Protocol,
    /// Non-streaming body was not valid JSON
    Parse,
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErrorKind::HttpStatus => write!(f, "http_status"),
            ClientErrorKind::Network => write!(f, "network"),
            ClientErrorKind::Stream => write!(f, "stream"),
            ClientErrorKind::Protocol => write!(f, "protocol"),
            ClientErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// Structured error with a kind, a one-line message and optional details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientError {
    pub kind: ClientErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, keeping the body as details.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = if body.is_empty() {
            None
        } else {
            // Prefer a backend-provided message when the body is JSON
            if let Ok(json) = serde_json::from_str::<Value>(body)
                && let Some(msg) = json
                    .get("error")
                    .and_then(|e| e.get("message").or(Some(e)))
                    .and_then(Value::as_str)
            {
                return Self {
                    kind: ClientErrorKind::HttpStatus,
                    message: format!("HTTP error! status: {status}: {msg}"),
                    details: Some(body.to_string()),
                };
            }
            Some(body.to_string())
        };
        Self {
            kind: ClientErrorKind::HttpStatus,
            message: format!("HTTP error! status: {status}"),
            details,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Protocol, message)
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Stream, message)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ClientError {}

/// Result type for turn operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Maps a reqwest failure onto the turn taxonomy.
pub fn classify_reqwest_error(e: &reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::new(ClientErrorKind::Network, format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ClientError::new(ClientErrorKind::Network, format!("Connection failed: {e}"))
    } else if e.is_body() || e.is_decode() {
        ClientError::stream(format!("Failed to read response body: {e}"))
    } else {
        ClientError::new(ClientErrorKind::Network, format!("Network error: {e}"))
    }
}
