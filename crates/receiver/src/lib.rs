//! Chunked transfer receiver.
//!
//! Accepts one session per channel: `INIT → CHUNK* → FINISH`. Chunks
//! may arrive in any order; only completeness matters. On FINISH the
//! slots are concatenated in index order, persisted to the cache, and
//! the outcome is announced on the status board. The receiver never
//! retries — any malformed or out-of-session frame terminates the
//! session with an ERROR frame, and retry means a new session opened
//! by the producer.

mod serve;
mod session;

pub use serve::serve;
pub use session::{SessionPhase, TransferSession};

use recbridge_cache::CacheError;

/// Errors that terminate a transfer session.
#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    /// Malformed or out-of-session frame (bad index, id mismatch,
    /// duplicate INIT, frame before INIT).
    #[error("{0}")]
    Protocol(String),

    /// FINISH arrived with at least one empty slot. Names the lowest
    /// missing index.
    #[error("Missing chunk at index {0}")]
    MissingChunk(usize),

    /// The reassembled binary could not be persisted; no cache entry
    /// was written.
    #[error("failed to save recording: {0}")]
    Persistence(#[from] CacheError),
}
