//! OpenAI-compatible chat-completions backend for [`CompletionAgent`].
//!
//! Works against any server exposing `POST {base_url}/chat/completions`.
//! Rate limits, server errors and transport failures come back as
//! [`ExternalCallError::Transient`] so the call controls retry them; every
//! other failure is permanent.
//!
//! [`CompletionAgent`]: super::CompletionAgent

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::completion::CompletionClient;
use crate::domain::{Result, SdbenchError};
use crate::ports::ExternalCallError;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Environment variables checked for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["SDBENCH_API_KEY", "OPENAI_API_KEY"];
pub const API_BASE_VAR: &str = "SDBENCH_API_BASE";

const USER_AGENT: &str = concat!("sdbench/", env!("CARGO_PKG_VERSION"));
const ERROR_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatConfig {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            temperature: 0.3,
            max_tokens: 200,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Key from `SDBENCH_API_KEY` or `OPENAI_API_KEY`, base URL from
    /// `SDBENCH_API_BASE` when set.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| {
                SdbenchError::InvalidConfig(format!(
                    "completion agent needs an API key in {}",
                    API_KEY_VARS.join(" or ")
                ))
            })?;
        let mut config = Self::new(model, api_key);
        if let Ok(base) = std::env::var(API_BASE_VAR) {
            if !base.trim().is_empty() {
                config.base_url = base;
            }
        }
        Ok(config)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Map a non-success HTTP status to a call error.
pub fn classify_status(status: StatusCode, body: &str) -> ExternalCallError {
    let snippet: String = body.chars().take(ERROR_SNIPPET_CHARS).collect();
    let reason = format!("HTTP {}: {}", status.as_u16(), snippet.trim());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        ExternalCallError::Transient(reason)
    } else {
        ExternalCallError::Permanent(reason)
    }
}

fn classify_transport(err: reqwest::Error) -> ExternalCallError {
    if err.is_builder() {
        ExternalCallError::Permanent(format!("invalid request: {err}"))
    } else {
        ExternalCallError::Transient(format!("transport error: {err}"))
    }
}

pub struct ChatCompletionsClient {
    config: ChatConfig,
    http: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SdbenchError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ExternalCallError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let resp = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| {
            if e.is_decode() {
                ExternalCallError::Permanent(format!("unreadable completion response: {e}"))
            } else {
                classify_transport(e)
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ExternalCallError::Permanent("completion had no content".to_string()))
    }
}
