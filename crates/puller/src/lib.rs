//! Consumer-side pull orchestration.
//!
//! A pull asks the producer to stream a recording, then waits for the
//! binary to land in the local cache. Completion is detected two ways
//! at once: a status-board change listener and a periodic cache poll.
//! The poll is a deliberate, paid-for defense against a missed
//! notification when contexts restart mid-transfer; whichever watcher
//! fires first wins and everything else is torn down.

mod producer;
mod pull;

pub use producer::{Producer, ProducerFuture, TransportError};
pub use pull::{PullConfig, Puller};

use recbridge_cache::CacheError;

/// Errors surfaced by [`Puller::pull`].
///
/// [`Transport`](PullError::Transport) means the producer is
/// unreachable or refused the request — recoverable by the user (start
/// the producer, retry). The other variants describe a failed or
/// abandoned transfer, which a bare retry will not fix.
#[derive(Debug, thiserror::Error)]
pub enum PullError {
    #[error("producer unreachable: {0}")]
    Transport(#[from] TransportError),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The status board says complete but the cache has no entry.
    #[error("recording {0} reported complete but missing from cache")]
    MissingAfterComplete(String),

    #[error("pull timed out")]
    Timeout,

    #[error("pull cancelled")]
    Cancelled,
}
