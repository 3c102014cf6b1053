pub mod config;
pub mod error;
pub mod events;
pub mod judge;
pub mod llm;
pub mod news;
pub mod orchestrator;
pub mod personas;
pub mod prompt;
pub mod service;
pub mod session;
pub mod tts;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use error::{ClientError, ConfigError, SessionError, StartError, StoreError};
pub use events::{DebateSnapshot, EventSubscription, Phase};
pub use judge::{Judgment, Rubric, Winner};
pub use personas::{LeaderboardRow, Persona, PersonaStore};
pub use prompt::Topic;
pub use service::DebateService;
pub use tts::SpeechAudio;
