use crate::error::ClientError;
use async_trait::async_trait;
use serde_json::Value;

/// Read-through source of a single headline, used to prefill debate topics.
#[async_trait]
pub trait HeadlineProvider: Send + Sync {
    async fn top_headline(&self) -> Result<Option<String>, ClientError>;
}

/// Fetches the first article title from a JSON headline feed
/// (`{"articles": [{"title": "..."}]}`).
pub struct HttpHeadlineProvider {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpHeadlineProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl HeadlineProvider for HttpHeadlineProvider {
    async fn top_headline(&self) -> Result<Option<String>, ClientError> {
        let response = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| ClientError::Transient(format!("network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("headline feed error ({status})");
            return Err(if status.is_server_error() {
                ClientError::Transient(message)
            } else {
                ClientError::Permanent(message)
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Transient(format!("failed to read headline feed: {e}")))?;
        Ok(data["articles"][0]["title"]
            .as_str()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}
