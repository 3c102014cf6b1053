use crate::judge::{Rubric, Winner};
use crate::prompt::Topic;
use crate::tts::SpeechAudio;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::debug;

/// Most snapshots a slow client may have outstanding before the oldest
/// non-terminal one is dropped.
pub const SNAPSHOT_BUFFER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    GeneratingText,
    SynthesizingAudio,
    AwaitingPlaybackAck,
    Judging,
    Finished,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Cancelled | Phase::Failed)
    }
}

/// Immutable value copy of a session's observable state. Clients never see
/// the orchestrator's mutable session directly.
#[derive(Debug, Clone, Serialize)]
pub struct DebateSnapshot {
    pub pro: String,
    pub con: String,
    pub topic: Topic,
    pub phase: Phase,
    pub current_turn: u32,
    pub total_turns: u32,
    pub is_pro_turn: bool,
    pub current_turn_text: String,
    pub current_turn_audio: Option<SpeechAudio>,
    pub history: Vec<String>,
    pub winner: Option<Winner>,
    pub reasoning: Option<String>,
    pub rubric: Option<Rubric>,
    pub error_message: Option<String>,
}

struct ChannelState {
    buffer: VecDeque<DebateSnapshot>,
    closed: bool,
}

/// Per-session outbound snapshot stream. Single producer (the orchestrator
/// task), single consumer (the client). Publishing a terminal snapshot
/// closes the channel; `recv` drains what is buffered, then yields `None`.
pub struct EventChannel {
    state: Mutex<ChannelState>,
    notify: Notify,
}

impl EventChannel {
    pub fn channel() -> (Arc<EventChannel>, EventSubscription) {
        let channel = Arc::new(EventChannel {
            state: Mutex::new(ChannelState {
                buffer: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        });
        let subscription = EventSubscription {
            channel: Arc::clone(&channel),
        };
        (channel, subscription)
    }

    /// Deliver a snapshot. Returns `false` once the channel is closed.
    ///
    /// When the buffer is full the oldest non-terminal snapshot is dropped;
    /// the snapshot being published (the latest) and terminal snapshots are
    /// never dropped.
    pub fn publish(&self, snapshot: DebateSnapshot) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return false;
        }
        if state.buffer.len() >= SNAPSHOT_BUFFER {
            if let Some(pos) = state.buffer.iter().position(|s| !s.phase.is_terminal()) {
                let dropped = state.buffer.remove(pos);
                debug!(
                    phase = ?dropped.map(|s| s.phase),
                    "slow consumer, dropped buffered snapshot"
                );
            }
        }
        let terminal = snapshot.phase.is_terminal();
        state.buffer.push_back(snapshot);
        if terminal {
            state.closed = true;
        }
        drop(state);
        self.notify.notify_one();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    async fn recv(&self) -> Option<DebateSnapshot> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().unwrap();
                if let Some(snapshot) = state.buffer.pop_front() {
                    return Some(snapshot);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }
}

/// The read handle returned to the client by `start_debate`.
pub struct EventSubscription {
    channel: Arc<EventChannel>,
}

impl EventSubscription {
    pub async fn recv(&self) -> Option<DebateSnapshot> {
        self.channel.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(phase: Phase, turn: u32) -> DebateSnapshot {
        DebateSnapshot {
            pro: "A".to_string(),
            con: "B".to_string(),
            topic: Topic::new("AI", None),
            phase,
            current_turn: turn,
            total_turns: 6,
            is_pro_turn: true,
            current_turn_text: String::new(),
            current_turn_audio: None,
            history: Vec::new(),
            winner: None,
            reasoning: None,
            rubric: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn unit_snapshots_arrive_in_publish_order() {
        let (channel, subscription) = EventChannel::channel();
        channel.publish(snapshot(Phase::Idle, 0));
        channel.publish(snapshot(Phase::GeneratingText, 1));

        assert_eq!(subscription.recv().await.expect("first").phase, Phase::Idle);
        assert_eq!(
            subscription.recv().await.expect("second").phase,
            Phase::GeneratingText
        );
    }

    #[tokio::test]
    async fn unit_full_buffer_drops_oldest_but_keeps_latest() {
        let (channel, subscription) = EventChannel::channel();
        for turn in 0..6 {
            channel.publish(snapshot(Phase::GeneratingText, turn));
        }

        let mut turns = Vec::new();
        for _ in 0..SNAPSHOT_BUFFER {
            turns.push(subscription.recv().await.expect("buffered").current_turn);
        }
        // The two oldest were dropped; the latest survived.
        assert_eq!(turns, vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn unit_terminal_snapshot_closes_channel_after_drain() {
        let (channel, subscription) = EventChannel::channel();
        channel.publish(snapshot(Phase::Judging, 6));
        channel.publish(snapshot(Phase::Finished, 6));
        assert!(channel.is_closed());
        assert!(!channel.publish(snapshot(Phase::Idle, 0)));

        assert_eq!(
            subscription.recv().await.expect("judging").phase,
            Phase::Judging
        );
        assert_eq!(
            subscription.recv().await.expect("finished").phase,
            Phase::Finished
        );
        assert!(subscription.recv().await.is_none());
    }

    #[tokio::test]
    async fn unit_terminal_snapshot_is_never_dropped_by_overflow() {
        let (channel, subscription) = EventChannel::channel();
        for turn in 0..SNAPSHOT_BUFFER as u32 {
            channel.publish(snapshot(Phase::GeneratingText, turn));
        }
        channel.publish(snapshot(Phase::Cancelled, 2));

        let mut last = None;
        while let Some(s) = subscription.recv().await {
            last = Some(s);
        }
        assert_eq!(last.expect("terminal snapshot").phase, Phase::Cancelled);
    }
}
