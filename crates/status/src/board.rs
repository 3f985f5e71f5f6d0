use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

use recbridge_protocol::TransferStatus;

/// Capacity of the change stream. Laggy subscribers fall back to
/// polling the store they actually care about, so a small buffer is
/// enough.
const CHANGE_BUFFER: usize = 64;

/// One change to a status record. `record: None` means the record was
/// removed (the delete half of delete-then-rewrite, or an explicit
/// [`StatusBoard::remove`]).
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub recording_id: String,
    pub record: Option<TransferStatus>,
}

/// Shared map of recording id → [`TransferStatus`] with a broadcast
/// change stream, plus integer progress records keyed by session id.
///
/// Clones share state; hand a clone to each context.
#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<BoardState>,
    changes: broadcast::Sender<StatusChange>,
}

#[derive(Default)]
struct BoardState {
    records: HashMap<String, TransferStatus>,
    progress: HashMap<String, u8>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BoardState::default()),
                changes,
            }),
        }
    }

    /// Writes the status record for `recording_id`, removing any prior
    /// record first. Emits one removal event (when a prior record
    /// existed) followed by one write event, so subscribers observe the
    /// new record even when it equals the old one.
    pub fn publish(&self, recording_id: &str, record: TransferStatus) {
        let mut state = self.inner.state.lock().unwrap();
        if state.records.remove(recording_id).is_some() {
            let _ = self.inner.changes.send(StatusChange {
                recording_id: recording_id.to_string(),
                record: None,
            });
        }
        state.records.insert(recording_id.to_string(), record.clone());
        debug!(recording_id, status = ?record.status, "status record published");
        let _ = self.inner.changes.send(StatusChange {
            recording_id: recording_id.to_string(),
            record: Some(record),
        });
    }

    /// Current record for `recording_id`, if any.
    pub fn get(&self, recording_id: &str) -> Option<TransferStatus> {
        let state = self.inner.state.lock().unwrap();
        state.records.get(recording_id).cloned()
    }

    /// Removes the record for `recording_id`, emitting a removal event
    /// if one existed.
    pub fn remove(&self, recording_id: &str) {
        let mut state = self.inner.state.lock().unwrap();
        if state.records.remove(recording_id).is_some() {
            let _ = self.inner.changes.send(StatusChange {
                recording_id: recording_id.to_string(),
                record: None,
            });
        }
    }

    /// Subscribes to the change stream. Events published before the
    /// call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.inner.changes.subscribe()
    }

    /// Records transfer progress (integer percent) for a session.
    pub fn set_progress(&self, session_id: &str, percent: u8) {
        let mut state = self.inner.state.lock().unwrap();
        state.progress.insert(session_id.to_string(), percent);
    }

    /// Last recorded progress for a session.
    pub fn progress(&self, session_id: &str) -> Option<u8> {
        let state = self.inner.state.lock().unwrap();
        state.progress.get(session_id).copied()
    }

    /// Drops the progress record for a finished session.
    pub fn clear_progress(&self, session_id: &str) {
        let mut state = self.inner.state.lock().unwrap();
        state.progress.remove(session_id);
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
