use crate::config::TtsConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

/// Soft timeout for one synthesis call.
pub const TTS_TIMEOUT: Duration = Duration::from_secs(30);

const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";
const OUTPUT_MIME: &str = "audio/mpeg";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeechAudio {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Speech-synthesis backend seam. Empty input never reaches the backend.
#[async_trait]
pub trait TtsClient: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<Option<SpeechAudio>, ClientError>;
}

/// Azure-Speech-style REST client: region-scoped endpoint, subscription key
/// header, SSML in, MP3 out.
pub struct AzureSpeechClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl AzureSpeechClient {
    pub fn new(config: &TtsConfig) -> Self {
        let endpoint = if config.endpoint.is_empty() {
            format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                config.region
            )
        } else {
            config.endpoint.clone()
        };
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key: config.api_key.clone(),
        }
    }
}

fn escape_ssml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn ssml_body(text: &str, voice_id: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='en-US'><voice name='{}'>{}</voice></speak>",
        voice_id,
        escape_ssml(text)
    )
}

fn map_send_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transient(format!("network error: {err}"))
    }
}

#[async_trait]
impl TtsClient for AzureSpeechClient {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<Option<SpeechAudio>, ClientError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let request = self
            .http
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(ssml_body(text, voice_id))
            .send();

        let response = timeout(TTS_TIMEOUT, request)
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("synthesis error ({status}): {body}");
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                ClientError::Transient(message)
            } else {
                ClientError::Permanent(message)
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transient(format!("failed to read audio: {e}")))?;
        Ok(Some(SpeechAudio {
            bytes: bytes.to_vec(),
            mime: OUTPUT_MIME.to_string(),
        }))
    }
}
