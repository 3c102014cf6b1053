//! Scripted client doubles for the end-to-end tests. Each mock pops one
//! reply per call; an exhausted script fails the call loudly instead of
//! panicking inside the orchestrator task.

use crate::error::ClientError;
use crate::llm::{ChatMessage, CompletionOptions, LlmClient};
use crate::tts::{SpeechAudio, TtsClient};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) enum ScriptedReply {
    Text(String),
    Transient,
    Permanent,
    Timeout,
}

pub(crate) struct ScriptedLlm {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub(crate) fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        _system_prompt: &str,
        _messages: &[ChatMessage],
        _opts: CompletionOptions,
    ) -> Result<String, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.lock().unwrap().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Transient) => {
                Err(ClientError::Transient("scripted transient".to_string()))
            }
            Some(ScriptedReply::Permanent) => {
                Err(ClientError::Permanent("scripted permanent".to_string()))
            }
            Some(ScriptedReply::Timeout) => Err(ClientError::Timeout),
            None => Err(ClientError::Permanent("llm script exhausted".to_string())),
        }
    }
}

pub(crate) enum TtsReply {
    Audio(Vec<u8>),
    /// Audio came back zero-length.
    Empty,
    /// The backend was skipped (blank input).
    Skip,
    Transient,
}

/// Falls back to one byte of audio per call once the script runs out.
pub(crate) struct ScriptedTts {
    replies: Mutex<VecDeque<TtsReply>>,
    calls: AtomicUsize,
}

impl ScriptedTts {
    pub(crate) fn new(replies: Vec<TtsReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TtsClient for ScriptedTts {
    async fn synthesize(
        &self,
        _text: &str,
        _voice_id: &str,
    ) -> Result<Option<SpeechAudio>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let audio = |bytes: Vec<u8>| SpeechAudio {
            bytes,
            mime: "audio/mpeg".to_string(),
        };
        match self.replies.lock().unwrap().pop_front() {
            Some(TtsReply::Audio(bytes)) => Ok(Some(audio(bytes))),
            Some(TtsReply::Empty) => Ok(Some(audio(Vec::new()))),
            Some(TtsReply::Skip) => Ok(None),
            Some(TtsReply::Transient) => {
                Err(ClientError::Transient("scripted transient".to_string()))
            }
            None => Ok(Some(audio(vec![1]))),
        }
    }
}
