use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CommonError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone, Debug)]
pub struct CompletionClientConfig {
    pub base_url: String,
    pub api_key: String,
    /// OpenAI organization header, sent only for the public API.
    pub organization: Option<String>,
    /// When set, requests use the Azure deployment URL shape and `api-key` header.
    pub api_version: Option<String>,
    pub default_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl CompletionClientConfig {
    /// Required:
    /// - `OPENAI_API_KEY`
    ///
    /// Optional:
    /// - `OPENAI_BASE_URL` (default: public OpenAI endpoint)
    /// - `OPENAI_API_VERSION` (switches to Azure deployments)
    /// - `OPENAI_API_ORGANIZATION`
    /// - `OPENAI_TIMEOUT_SECS`, `OPENAI_MAX_RETRIES`, `OPENAI_RETRY_INITIAL_MS`,
    ///   `OPENAI_RETRY_MAX_MS`, `OPENAI_MAX_ERROR_BODY_BYTES`
    pub fn from_env() -> Result<Self, CommonError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(CommonError::MissingEnv("OPENAI_API_KEY"))?;

        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let default_timeout = env_parse::<u64>("OPENAI_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));
        let max_retries = env_parse::<u32>("OPENAI_MAX_RETRIES")?.unwrap_or(3);
        let initial_backoff = env_parse::<u64>("OPENAI_RETRY_INITIAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));
        let max_backoff = env_parse::<u64>("OPENAI_RETRY_MAX_MS")?
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(5_000));
        let max_error_body_bytes =
            env_parse::<usize>("OPENAI_MAX_ERROR_BODY_BYTES")?.unwrap_or(8 * 1024);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            organization: std::env::var("OPENAI_API_ORGANIZATION").ok(),
            api_version: std::env::var("OPENAI_API_VERSION")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            default_timeout,
            max_retries,
            initial_backoff,
            max_backoff,
            max_error_body_bytes,
        })
    }

    /// Chat endpoint for `model`. With an API version this is the Azure deployment route,
    /// where the model name doubles as the deployment id.
    pub fn chat_url(&self, model: &str) -> String {
        match &self.api_version {
            Some(version) => format!(
                "{}/openai/deployments/{model}/chat/completions?api-version={version}",
                self.base_url
            ),
            None => format!("{}/chat/completions", self.base_url),
        }
    }
}

fn env_parse<T: FromStr>(name: &'static str) -> Result<Option<T>, CommonError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CommonError::InvalidEnv { name, value: raw }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("streaming response ended without a completion")]
    StreamEnded,
}

#[derive(Clone)]
pub struct CompletionClient {
    config: CompletionClientConfig,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: CompletionClientConfig) -> Result<Self, CompletionClientError> {
        let http = reqwest::Client::builder()
            .user_agent("guideline-extractor")
            .build()?;
        Ok(Self { config, http })
    }

    fn post(&self, url: &str, timeout: Duration) -> reqwest::RequestBuilder {
        let builder = self.http.post(url).timeout(timeout);
        if self.config.api_version.is_some() {
            builder.header("api-key", &self.config.api_key)
        } else {
            let builder = builder.bearer_auth(&self.config.api_key);
            match &self.config.organization {
                Some(org) => builder.header("OpenAI-Organization", org),
                None => builder,
            }
        }
    }

    pub async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
        timeout_override: Option<Duration>,
    ) -> Result<ChatCompletionResponse, CompletionClientError> {
        let url = self.config.chat_url(&request.model);
        let timeout = timeout_override.unwrap_or(self.config.default_timeout);
        debug!(url = %url, messages = request.messages.len(), "sending chat completion");
        self.request_with_retry(|| {
            let req = request.clone();
            let url = url.clone();
            async move {
                let resp = self.post(&url, timeout).json(&req).send().await?;
                Self::parse_json_response(resp, self.config.max_error_body_bytes).await
            }
        })
        .await
    }

    /// Sends a streaming request and concatenates the `delta.content` pieces of every
    /// server-sent event until `[DONE]`.
    pub async fn chat_completions_streaming_aggregate(
        &self,
        request: ChatCompletionRequest,
        timeout_override: Option<Duration>,
    ) -> Result<String, CompletionClientError> {
        let url = self.config.chat_url(&request.model);
        let timeout = timeout_override.unwrap_or(self.config.default_timeout);
        self.request_with_retry(|| {
            let mut req = request.clone();
            req.stream = Some(true);
            let url = url.clone();
            async move {
                let resp = self.post(&url, timeout).json(&req).send().await?;

                if !resp.status().is_success() {
                    return Err(
                        Self::to_upstream_error(resp, self.config.max_error_body_bytes).await
                    );
                }

                let mut stream = resp.bytes_stream();
                let mut buffer = String::new();
                let mut out = String::new();
                while let Some(next) = stream.next().await {
                    let chunk = next?;
                    buffer.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(idx) = buffer.find("\n\n") {
                        let event: String = buffer.drain(..idx + 2).collect();
                        if append_stream_event(&event, &mut out) {
                            return Ok(out);
                        }
                    }
                }
                Err(CompletionClientError::StreamEnded)
            }
        })
        .await
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, CompletionClientError> {
        if resp.status().is_success() {
            let json = resp.json::<T>().await?;
            return Ok(json);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> CompletionClientError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(&body) {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| "unknown upstream error".to_string());
            return CompletionClientError::Upstream { status, message };
        }
        CompletionClientError::UpstreamBody { status, body }
    }

    async fn request_with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, CompletionClientError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CompletionClientError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.config.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "completion request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Folds one SSE event into `out`. Returns true once the terminating `[DONE]` line is seen.
fn append_stream_event(event: &str, out: &mut String) -> bool {
    for line in event.lines() {
        let Some(data) = line.trim().strip_prefix("data:").map(str::trim) else {
            continue;
        };
        if data == "[DONE]" {
            return true;
        }
        if data.is_empty() {
            continue;
        }
        if let Ok(delta) = serde_json::from_str::<ChatCompletionStreamChunk>(data) {
            if let Some(piece) = delta
                .choices
                .first()
                .and_then(|c| c.delta.content.as_deref())
            {
                out.push_str(piece);
            }
        }
    }
    false
}

fn should_retry(err: &CompletionClientError) -> bool {
    match err {
        CompletionClientError::Request(e) => {
            e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
        }
        CompletionClientError::Upstream { status, .. }
        | CompletionClientError::UpstreamBody { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        CompletionClientError::InvalidJson(_) | CompletionClientError::StreamEnded => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    let jitter_ms = pseudo_jitter_ms(jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorObject,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<ChatCompletionUsage>,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if the upstream returned one.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: Option<u32>,
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionStreamChunk {
    choices: Vec<ChatCompletionStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionStreamChoice {
    delta: ChatCompletionStreamDelta,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionStreamDelta {
    content: Option<String>,
}
