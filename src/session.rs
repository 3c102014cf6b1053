use crate::error::SessionError;
use crate::orchestrator::SessionShared;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// How long a finished, cancelled or failed session stays addressable
/// before the registry drops it.
pub const SESSION_TTL: Duration = Duration::from_secs(300);

pub struct SessionHandle {
    pub id: String,
    pub(crate) shared: Arc<SessionShared>,
}

/// Maps opaque session ids to live debates. The map mutex is held only for
/// insert, lookup and remove; acks and cancels run against the handle after
/// the lock is released.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        })
    }

    pub(crate) fn insert(&self, id: &str, shared: Arc<SessionShared>) {
        let handle = Arc::new(SessionHandle {
            id: id.to_string(),
            shared,
        });
        self.sessions.lock().unwrap().insert(id.to_string(), handle);
    }

    fn lookup(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    /// Release the session's pending playback ack. `Ok(false)` means the
    /// session exists but no audio was awaiting acknowledgement.
    pub fn ack_audio(&self, id: &str) -> Result<bool, SessionError> {
        let handle = self
            .lookup(id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        Ok(handle.shared.ack_audio())
    }

    /// Cancel a session. Idempotent; a session already disposed of is a
    /// logged no-op so late cancels after TTL expiry stay harmless.
    pub fn cancel(&self, id: &str) {
        match self.lookup(id) {
            Some(handle) => handle.shared.trigger_cancel(),
            None => debug!(session = id, "cancel for unknown session ignored"),
        }
    }

    /// Drop a session, cancelling it first in case it is still running.
    pub fn remove(&self, id: &str) {
        let removed = self.sessions.lock().unwrap().remove(id);
        if let Some(handle) = removed {
            handle.shared.trigger_cancel();
            debug!(session = id, "session removed");
        }
    }

    /// Drop the session after the registry TTL. Spawned once its
    /// orchestrator task has reached a terminal state.
    pub(crate) fn retire_after_ttl(self: &Arc<Self>, id: String) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(registry.ttl).await;
            registry.remove(&id);
        });
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }

    /// Cancel every live session. Process-shutdown path.
    pub fn shutdown(&self) {
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.lock().unwrap().values().cloned().collect();
        info!(sessions = handles.len(), "shutting down session registry");
        for handle in handles {
            handle.shared.trigger_cancel();
        }
    }
}
