//! HTTP client for the agent's run endpoint.

use anyhow::{Context, Result};
use bytes::Bytes;
use cartchat_types::BotResponse;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ClientError, ClientErrorKind, ClientResult, classify_reqwest_error};
use crate::fallback::parse_run_output;
use crate::sse::SseReader;
use crate::turn::{ProgressSink, interpret_stream};

const ACCEPT_VALUE: &str = "application/json, text/event-stream";
const USER_AGENT_VALUE: &str = concat!("cartchat/", env!("CARGO_PKG_VERSION"));
const EVENT_STREAM: &str = "text/event-stream";

/// Body of `POST /api/runs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    pub agent_name: String,
    pub mode: String,
    pub session_id: String,
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
    pub input: Vec<RunInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunInput {
    pub role: String,
    pub parts: Vec<RunPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPart {
    pub content_type: String,
    pub content: String,
}

impl RunRequest {
    /// Single user message addressed with the identity from `config`.
    pub fn user_message(config: &Config, text: &str) -> Self {
        Self {
            agent_name: config.agent_name.clone(),
            mode: config.mode.clone(),
            session_id: config.session_id().to_string(),
            tenant_id: config.tenant_id.clone(),
            input: vec![RunInput {
                role: "user".to_string(),
                parts: vec![RunPart {
                    content_type: "text/plain".to_string(),
                    content: text.to_string(),
                }],
            }],
        }
    }
}

/// Byte stream of a streamed response body.
pub type BodyStream = BoxStream<'static, reqwest::Result<Bytes>>;

/// What the backend answered with, before interpretation.
pub enum AgentReply {
    /// `text/event-stream` body
    Stream(SseReader<BodyStream>),
    /// Any other body, parsed as JSON
    Json(Value),
}

impl std::fmt::Debug for AgentReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("AgentReply::Stream"),
            Self::Json(value) => f.debug_tuple("AgentReply::Json").field(value).finish(),
        }
    }
}

/// Agent backend client.
#[derive(Debug, Clone)]
pub struct AgentClient {
    config: Config,
    base_url: String,
    http: reqwest::Client,
}

impl AgentClient {
    /// Creates a client for the endpoint and identity in `config`.
    ///
    /// # Errors
    /// Returns an error if the resolved base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.resolve_base_url()?;
        Ok(Self {
            config: config.clone(),
            base_url,
            http: reqwest::Client::new(),
        })
    }

    /// Replaces the endpoint, taking precedence over env and config.
    ///
    /// # Errors
    /// Returns an error if `base_url` is not a valid URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let base_url = base_url.trim();
        url::Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run_url(&self) -> String {
        format!("{}{}", self.base_url, self.config.run_path)
    }

    /// Sends one user message and returns the undecoded reply.
    ///
    /// # Errors
    /// Returns a network error if the request fails, an HTTP status error on
    /// a non-2xx response, or a parse error for a non-JSON, non-SSE body.
    pub async fn send(&self, text: &str) -> ClientResult<AgentReply> {
        let request = RunRequest::user_message(&self.config, text);
        let url = self.run_url();
        info!(url = %url, session_id = %request.session_id, "sending run request");

        let response = self
            .http
            .post(&url)
            .headers(build_headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ClientError::http_status(status.as_u16(), &error_body));
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().starts_with(EVENT_STREAM));

        if is_event_stream {
            debug!("reading streamed reply");
            return Ok(AgentReply::Stream(SseReader::new(
                response.bytes_stream().boxed(),
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        let value = serde_json::from_str(&body).map_err(|e| {
            ClientError::new(ClientErrorKind::Parse, format!("Invalid JSON response: {e}"))
                .with_details(body.clone())
        })?;
        Ok(AgentReply::Json(value))
    }

    /// Runs one complete turn, forwarding progress to `sink`.
    ///
    /// Non-streamed replies produce no progress updates.
    ///
    /// # Errors
    /// See [`AgentClient::send`] and [`interpret_stream`].
    pub async fn run_turn(
        &self,
        text: &str,
        sink: &mut dyn ProgressSink,
    ) -> ClientResult<BotResponse> {
        match self.send(text).await? {
            AgentReply::Stream(events) => interpret_stream(events, sink).await,
            AgentReply::Json(body) => Ok(parse_run_output(&body)),
        }
    }
}

fn build_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers
}
