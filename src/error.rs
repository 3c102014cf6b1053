use thiserror::Error;

/// Failures from the LLM and TTS backends.
///
/// `Transient` covers network hiccups and 5xx responses and is retried by
/// the orchestrator; `Permanent` covers 4xx responses and malformed payloads
/// and is not. A `Timeout` counts as transient the first time it is seen for
/// a given call and permanent after that.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transient upstream failure: {0}")]
    Transient(String),
    #[error("permanent upstream failure: {0}")]
    Permanent(String),
    #[error("call exceeded its soft timeout")]
    Timeout,
    #[error("call was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persona not found: {0}")]
    NotFound(String),
    #[error("invalid persona name {0:?}: must not contain '/', '\\', '#' or '?'")]
    InvalidName(String),
    #[error("storage backend error: {0}")]
    Backend(#[from] rusqlite::Error),
}

/// Synchronous rejections of `start_debate`.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("pro and con must be different personas")]
    SamePersona,
    #[error("topic title must not be empty")]
    EmptyTopic,
    #[error("topic title exceeds {max} characters (got {got})")]
    TopicTooLong { got: usize, max: usize },
    #[error("unknown persona: {0}")]
    UnknownPersona(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown session: {0}")]
    UnknownSession(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read or write config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}
