use crate::config::LlmConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;

/// Soft timeout for one completion call.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(60);

const API_VERSION: &str = "2024-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub temperature: f32,
    /// Advisory output budget in characters. The backend gets a token cap
    /// derived from it; callers still trim the returned text.
    pub max_chars: usize,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_chars: 800,
        }
    }
}

/// Chat-completion backend seam. One call, full response text back.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        opts: CompletionOptions,
    ) -> Result<String, ClientError>;
}

/// Azure-OpenAI-style chat deployment client.
pub struct AzureOpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    deployment: String,
}

impl AzureOpenAiClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            deployment: config.deployment.clone(),
        }
    }

    fn completion_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, API_VERSION
        )
    }
}

fn request_body(system_prompt: &str, messages: &[ChatMessage], opts: CompletionOptions) -> Value {
    let mut all: Vec<Value> = vec![json!({"role": "system", "content": system_prompt})];
    for msg in messages {
        all.push(json!({"role": msg.role.as_str(), "content": msg.text}));
    }
    json!({
        "messages": all,
        "temperature": opts.temperature,
        "max_tokens": (opts.max_chars / 3).max(256),
    })
}

fn map_send_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transient(format!("network error: {err}"))
    }
}

fn map_api_error(status: StatusCode, body: &str) -> ClientError {
    let message = match status.as_u16() {
        401 | 403 => "invalid or unauthorized API key".to_string(),
        404 => "deployment not found; check the configured deployment name".to_string(),
        429 => "rate limited by the completion endpoint".to_string(),
        500..=599 => "completion endpoint is temporarily unavailable".to_string(),
        _ => format!("API error ({status}): {body}"),
    };
    if status.is_server_error() || status.as_u16() == 429 {
        ClientError::Transient(message)
    } else {
        ClientError::Permanent(message)
    }
}

#[async_trait]
impl LlmClient for AzureOpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        opts: CompletionOptions,
    ) -> Result<String, ClientError> {
        let request = self
            .http
            .post(self.completion_url())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request_body(system_prompt, messages, opts))
            .send();

        let response = timeout(LLM_TIMEOUT, request)
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Transient(format!("failed to read completion body: {e}")))?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ClientError::Permanent("malformed completion response".to_string()))
    }
}

/// Truncate `text` to at most `max_chars` characters, cutting at the last
/// whitespace boundary and appending an ellipsis when anything was dropped.
pub fn trim_to_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let kept = match cut.rfind(char::is_whitespace) {
        Some(pos) => &cut[..pos],
        None => cut.as_str(),
    };
    format!("{}…", kept.trim_end())
}
