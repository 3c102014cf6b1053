use crate::config::VoiceConfig;
use crate::error::ClientError;
use crate::events::{DebateSnapshot, EventChannel, Phase};
use crate::judge::{parse_judgment, Judgment, Winner};
use crate::llm::{trim_to_chars, ChatMessage, CompletionOptions, LlmClient};
use crate::personas::PersonaStore;
use crate::prompt::{self, Topic};
use crate::tts::{SpeechAudio, TtsClient};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Three rounds, two speakers each.
pub const TOTAL_TURNS: u32 = 6;

/// Character cap asserted in the turn prompt and enforced on the response.
pub const TURN_MAX_CHARS: usize = 600;

const JUDGE_MAX_CHARS: usize = 2400;
const TURN_TEMPERATURE: f32 = 0.9;
const JUDGE_TEMPERATURE: f32 = 0.2;

/// Transient failures are retried this many times after the first attempt.
const MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// How long a turn without audio stays on screen before the loop advances.
const NO_AUDIO_GRACE: Duration = Duration::from_secs(1);

/// Spoken in place of a verse the model never delivered.
const MIC_CUT_VERSE: &str =
    "Yo, my mic just cut out, but the beat goes on — call that verse a wash and run the next one strong.";

/// The rendezvous surface a session exposes to the outside: the one-shot
/// playback ack and the session-scoped cancellation token. The orchestrator
/// arms a fresh ack per audio snapshot; the client releases it.
pub struct SessionShared {
    ack: Mutex<Option<oneshot::Sender<()>>>,
    cancel: CancellationToken,
}

impl Default for SessionShared {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionShared {
    pub fn new() -> Self {
        Self {
            ack: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Release the pending playback ack. Returns `false` when no audio was
    /// awaiting acknowledgement (an out-of-order ack).
    pub fn ack_audio(&self) -> bool {
        match self.ack.lock().unwrap().take() {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Cancel the session: aborts in-flight external calls and frees any
    /// pending playback wait. Idempotent.
    pub fn trigger_cancel(&self) {
        self.cancel.cancel();
        self.ack.lock().unwrap().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn arm_ack(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.ack.lock().unwrap() = Some(tx);
        rx
    }
}

/// Mutable per-debate state, owned exclusively by the orchestrator task.
struct DebateSession {
    pro: String,
    con: String,
    topic: Topic,
    history: Vec<String>,
    current_turn: u32,
    is_pro_turn: bool,
    phase: Phase,
    current_turn_text: String,
    result: Option<Judgment>,
    error_message: Option<String>,
}

enum RunError {
    Cancelled,
    Fatal(String),
}

/// Drives one debate from first verse to judged outcome.
///
/// The loop alternates `GeneratingText → SynthesizingAudio →
/// AwaitingPlaybackAck` for six turns, then judges the transcript and
/// records the outcome. The client paces the loop through the playback ack;
/// cancellation can interrupt any suspension point.
pub struct DebateOrchestrator {
    session: DebateSession,
    llm: Arc<dyn LlmClient>,
    tts: Arc<dyn TtsClient>,
    store: Arc<PersonaStore>,
    voices: VoiceConfig,
    events: Arc<EventChannel>,
    shared: Arc<SessionShared>,
}

impl DebateOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        pro: String,
        con: String,
        topic: Topic,
        llm: Arc<dyn LlmClient>,
        tts: Arc<dyn TtsClient>,
        store: Arc<PersonaStore>,
        voices: VoiceConfig,
        events: Arc<EventChannel>,
        shared: Arc<SessionShared>,
    ) -> Self {
        Self {
            session: DebateSession {
                pro,
                con,
                topic,
                history: Vec::new(),
                current_turn: 0,
                is_pro_turn: true,
                phase: Phase::Idle,
                current_turn_text: String::new(),
                result: None,
                error_message: None,
            },
            llm,
            tts,
            store,
            voices,
            events,
            shared,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(
            pro = %self.session.pro,
            con = %self.session.con,
            topic = %self.session.topic.title,
            "debate session starting"
        );
        match self.drive().await {
            Ok(()) => info!(winner = ?self.session.result.as_ref().map(|j| j.winner.label().to_string()), "debate finished"),
            Err(RunError::Cancelled) => {
                info!("debate cancelled");
                self.session.phase = Phase::Cancelled;
                self.publish_terminal();
            }
            Err(RunError::Fatal(message)) => {
                error!(%message, "debate failed");
                self.session.phase = Phase::Failed;
                self.session.error_message = Some(message);
                self.publish_terminal();
            }
        }
    }

    async fn drive(&mut self) -> Result<(), RunError> {
        self.publish(None)?;
        while self.session.current_turn < TOTAL_TURNS {
            if self.shared.is_cancelled() {
                return Err(RunError::Cancelled);
            }
            self.run_turn().await?;
        }
        if self.shared.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        self.run_judging().await
    }

    async fn run_turn(&mut self) -> Result<(), RunError> {
        self.session.current_turn += 1;
        self.session.current_turn_text.clear();
        self.set_phase(Phase::GeneratingText)?;

        let (active, opponent) = self.speakers();
        let system = prompt::turn_system_prompt(
            &active,
            &opponent,
            &self.session.topic,
            self.session.is_pro_turn,
            self.session.current_turn,
            TURN_MAX_CHARS,
        );
        let messages = prompt::turn_messages(&self.session.history, self.session.is_pro_turn);
        let opts = CompletionOptions {
            temperature: TURN_TEMPERATURE,
            max_chars: TURN_MAX_CHARS,
        };

        let (text, generation_failed) = match self
            .complete_with_retry(&system, &messages, opts, "turn generation")
            .await
        {
            Ok(raw) => (
                trim_to_chars(&prompt::normalize_spoken_text(&raw), TURN_MAX_CHARS),
                false,
            ),
            Err(ClientError::Cancelled) => return Err(RunError::Cancelled),
            Err(err) => {
                warn!(turn = self.session.current_turn, %err, "turn generation failed, substituting placeholder verse");
                (MIC_CUT_VERSE.to_string(), true)
            }
        };
        self.session.current_turn_text = text.clone();

        let audio = if generation_failed {
            None
        } else {
            self.set_phase(Phase::SynthesizingAudio)?;
            let voice = self.voices.voice_for(&active).to_string();
            match self.synthesize_with_retry(&text, &voice).await {
                Ok(audio) => audio.filter(|a| !a.bytes.is_empty()),
                Err(ClientError::Cancelled) => return Err(RunError::Cancelled),
                Err(err) => {
                    warn!(turn = self.session.current_turn, %err, "synthesis failed, continuing without audio");
                    None
                }
            }
        };

        match audio {
            Some(audio) => {
                let ack = self.shared.arm_ack();
                self.session.phase = Phase::AwaitingPlaybackAck;
                self.publish(Some(audio))?;
                self.await_ack(ack).await?;
            }
            None => {
                self.session.phase = Phase::SynthesizingAudio;
                self.publish(None)?;
                self.guarded_sleep(NO_AUDIO_GRACE)
                    .await
                    .map_err(|_| RunError::Cancelled)?;
            }
        }

        self.session.history.push(text);
        self.session.is_pro_turn = !self.session.is_pro_turn;
        Ok(())
    }

    async fn run_judging(&mut self) -> Result<(), RunError> {
        self.set_phase(Phase::Judging)?;

        let pro = self.session.pro.clone();
        let con = self.session.con.clone();
        let system = prompt::judge_system_prompt(&pro, &con, &self.session.topic);
        let transcript = prompt::judge_user_message(&self.session.history, &pro, &con);
        let opts = CompletionOptions {
            temperature: JUDGE_TEMPERATURE,
            max_chars: JUDGE_MAX_CHARS,
        };

        let judgment = match self
            .complete_with_retry(&system, &[ChatMessage::user(transcript)], opts, "judging")
            .await
        {
            Ok(raw) => parse_judgment(&raw, &pro, &con),
            Err(ClientError::Cancelled) => return Err(RunError::Cancelled),
            Err(err) => {
                warn!(%err, "judge call failed");
                Judgment::judging_failed(&err.to_string())
            }
        };

        if let Winner::Persona(winner) = &judgment.winner {
            let loser = if *winner == pro { &con } else { &pro };
            if let Err(err) = self.store.record_outcome(winner, loser) {
                warn!(%err, winner = %winner, "failed to record outcome, publishing result anyway");
            }
        }

        info!(winner = %judgment.winner, "debate judged");
        self.session.result = Some(judgment);
        self.session.phase = Phase::Finished;
        self.publish(None)
    }

    /// One completion call with transient retries and session cancellation.
    /// The first soft timeout counts as transient, the second is permanent.
    async fn complete_with_retry(
        &self,
        system: &str,
        messages: &[ChatMessage],
        opts: CompletionOptions,
        what: &str,
    ) -> Result<String, ClientError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut timed_out = false;
        let mut last_err = ClientError::Transient(format!("{what} was never attempted"));
        for attempt in 0..=MAX_RETRIES {
            let result = tokio::select! {
                biased;
                _ = self.shared.cancel.cancelled() => Err(ClientError::Cancelled),
                result = self.llm.complete(system, messages, opts) => result,
            };
            match result {
                Ok(text) => return Ok(text),
                Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
                Err(ClientError::Permanent(m)) => return Err(ClientError::Permanent(m)),
                Err(ClientError::Timeout) if timed_out => {
                    return Err(ClientError::Permanent(format!("{what} timed out twice")))
                }
                Err(err) => {
                    if matches!(err, ClientError::Timeout) {
                        timed_out = true;
                    }
                    last_err = err;
                }
            }
            if attempt < MAX_RETRIES {
                warn!(what, attempt = attempt + 1, %last_err, "transient failure, backing off before retry");
                self.guarded_sleep(delay).await?;
                delay *= 2;
            }
        }
        Err(last_err)
    }

    async fn synthesize_with_retry(
        &self,
        text: &str,
        voice: &str,
    ) -> Result<Option<SpeechAudio>, ClientError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut timed_out = false;
        let mut last_err = ClientError::Transient("synthesis was never attempted".to_string());
        for attempt in 0..=MAX_RETRIES {
            let result = tokio::select! {
                biased;
                _ = self.shared.cancel.cancelled() => Err(ClientError::Cancelled),
                result = self.tts.synthesize(text, voice) => result,
            };
            match result {
                Ok(audio) => return Ok(audio),
                Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
                Err(ClientError::Permanent(m)) => return Err(ClientError::Permanent(m)),
                Err(ClientError::Timeout) if timed_out => {
                    return Err(ClientError::Permanent("synthesis timed out twice".to_string()))
                }
                Err(err) => {
                    if matches!(err, ClientError::Timeout) {
                        timed_out = true;
                    }
                    last_err = err;
                }
            }
            if attempt < MAX_RETRIES {
                warn!(attempt = attempt + 1, %last_err, "transient synthesis failure, backing off before retry");
                self.guarded_sleep(delay).await?;
                delay *= 2;
            }
        }
        Err(last_err)
    }

    /// Block until the client acknowledges playback. A delivered ack wins
    /// over a simultaneous cancellation so the acked turn still commits.
    async fn await_ack(&self, ack: oneshot::Receiver<()>) -> Result<(), RunError> {
        tokio::select! {
            biased;
            result = ack => match result {
                Ok(()) => Ok(()),
                Err(_) => Err(RunError::Cancelled),
            },
            _ = self.shared.cancel.cancelled() => Err(RunError::Cancelled),
        }
    }

    async fn guarded_sleep(&self, duration: Duration) -> Result<(), ClientError> {
        tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => Err(ClientError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn speakers(&self) -> (String, String) {
        if self.session.is_pro_turn {
            (self.session.pro.clone(), self.session.con.clone())
        } else {
            (self.session.con.clone(), self.session.pro.clone())
        }
    }

    fn set_phase(&mut self, phase: Phase) -> Result<(), RunError> {
        self.session.phase = phase;
        self.publish(None)
    }

    fn publish(&self, audio: Option<SpeechAudio>) -> Result<(), RunError> {
        if self.events.publish(self.snapshot(audio)) {
            Ok(())
        } else {
            Err(RunError::Fatal(
                "event channel closed before the debate ended".to_string(),
            ))
        }
    }

    fn publish_terminal(&self) {
        self.events.publish(self.snapshot(None));
    }

    fn snapshot(&self, audio: Option<SpeechAudio>) -> DebateSnapshot {
        let result = self.session.result.as_ref();
        DebateSnapshot {
            pro: self.session.pro.clone(),
            con: self.session.con.clone(),
            topic: self.session.topic.clone(),
            phase: self.session.phase,
            current_turn: self.session.current_turn,
            total_turns: TOTAL_TURNS,
            is_pro_turn: self.session.is_pro_turn,
            current_turn_text: self.session.current_turn_text.clone(),
            current_turn_audio: audio,
            history: self.session.history.clone(),
            winner: result.map(|j| j.winner.clone()),
            reasoning: result.map(|j| j.reasoning.clone()),
            rubric: result.and_then(|j| j.rubric),
            error_message: self.session.error_message.clone(),
        }
    }
}
