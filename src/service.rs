use crate::config::{AppConfig, VoiceConfig};
use crate::error::{ClientError, SessionError, StartError, StoreError};
use crate::events::{EventChannel, EventSubscription};
use crate::llm::{AzureOpenAiClient, LlmClient};
use crate::news::HeadlineProvider;
use crate::orchestrator::{DebateOrchestrator, SessionShared};
use crate::personas::{LeaderboardRow, Persona, PersonaStore};
use crate::prompt::Topic;
use crate::session::{SessionRegistry, SESSION_TTL};
use crate::tts::{AzureSpeechClient, TtsClient};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub const MAX_TOPIC_CHARS: usize = 150;
pub const LEADERBOARD_CAP: usize = 10;

/// Transport-agnostic front door: every client operation goes through here.
/// Owns the persona store, the backend clients and the session registry;
/// each started debate runs as its own task and reports back over its event
/// channel.
pub struct DebateService {
    store: Arc<PersonaStore>,
    llm: Arc<dyn LlmClient>,
    tts: Arc<dyn TtsClient>,
    headlines: Option<Arc<dyn HeadlineProvider>>,
    voices: VoiceConfig,
    registry: Arc<SessionRegistry>,
}

impl DebateService {
    pub fn new(
        store: Arc<PersonaStore>,
        llm: Arc<dyn LlmClient>,
        tts: Arc<dyn TtsClient>,
        headlines: Option<Arc<dyn HeadlineProvider>>,
        voices: VoiceConfig,
        seed: &[String],
    ) -> Result<Self, StoreError> {
        store.seed_if_empty(seed)?;
        Ok(Self {
            store,
            llm,
            tts,
            headlines,
            voices,
            registry: SessionRegistry::new(SESSION_TTL),
        })
    }

    /// Wire up the real backends from configuration.
    pub fn from_config(
        config: &AppConfig,
        headlines: Option<Arc<dyn HeadlineProvider>>,
    ) -> Result<Self, StoreError> {
        let store = Arc::new(PersonaStore::open(&config.store.connection)?);
        let llm = Arc::new(AzureOpenAiClient::new(&config.llm));
        let tts = Arc::new(AzureSpeechClient::new(&config.tts));
        Self::new(
            store,
            llm,
            tts,
            headlines,
            config.voices.clone(),
            &config.personas.seed,
        )
    }

    /// Validate and launch a debate. Returns the session id and the read
    /// handle for its snapshot stream.
    pub fn start_debate(
        &self,
        pro: &str,
        con: &str,
        topic_title: &str,
        topic_description: Option<String>,
    ) -> Result<(String, EventSubscription), StartError> {
        let title = topic_title.trim();
        if title.is_empty() {
            return Err(StartError::EmptyTopic);
        }
        let title_chars = title.chars().count();
        if title_chars > MAX_TOPIC_CHARS {
            return Err(StartError::TopicTooLong {
                got: title_chars,
                max: MAX_TOPIC_CHARS,
            });
        }
        if pro == con {
            return Err(StartError::SamePersona);
        }
        for name in [pro, con] {
            if self.store.get(name)?.is_none() {
                return Err(StartError::UnknownPersona(name.to_string()));
            }
        }

        let description = topic_description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let topic = Topic::new(title, description);

        let (events, subscription) = EventChannel::channel();
        let shared = Arc::new(SessionShared::new());
        let session_id = Uuid::new_v4().to_string();
        self.registry.insert(&session_id, shared.clone());

        let orchestrator = DebateOrchestrator::new(
            pro.to_string(),
            con.to_string(),
            topic,
            self.llm.clone(),
            self.tts.clone(),
            self.store.clone(),
            self.voices.clone(),
            events,
            shared,
        );
        let registry = self.registry.clone();
        let retire_id = session_id.clone();
        tokio::spawn(async move {
            orchestrator.run().await;
            registry.retire_after_ttl(retire_id);
        });

        Ok((session_id, subscription))
    }

    /// Signal that the current turn's audio finished playing. An ack with no
    /// audio pending is out of order and ignored with a warning.
    pub fn ack_audio(&self, session_id: &str) -> Result<(), SessionError> {
        if !self.registry.ack_audio(session_id)? {
            warn!(session = session_id, "out-of-order ack ignored, no audio pending");
        }
        Ok(())
    }

    /// Cancel a debate. Idempotent, including after the session is gone.
    pub fn cancel(&self, session_id: &str) {
        self.registry.cancel(session_id);
    }

    pub fn leaderboard(&self) -> Result<Vec<LeaderboardRow>, StoreError> {
        self.store.leaderboard(LEADERBOARD_CAP)
    }

    pub fn list_personas(&self) -> Result<Vec<Persona>, StoreError> {
        self.store.list()
    }

    /// Topic prefill helper; `None` when no provider is wired up.
    pub async fn top_headline(&self) -> Result<Option<String>, ClientError> {
        match &self.headlines {
            Some(provider) => provider.top_headline().await,
            None => Ok(None),
        }
    }

    /// Cancel every live session. Call on process shutdown.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}
