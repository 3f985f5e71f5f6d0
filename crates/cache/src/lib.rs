//! Durable file-backed cache for pulled recordings.
//!
//! One entry per recording id, stored under a single root directory.
//! Every write is all-or-nothing: the entry is assembled in a temp file
//! and committed with a rename, so a reader never observes a partial
//! entry. Absence on read is a normal outcome, not an error.

mod store;

pub use store::{CachedVideo, VideoCache};

/// Default retention for [`VideoCache::sweep_expired`].
pub const DEFAULT_MAX_AGE_DAYS: u32 = 7;

/// Errors produced by the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidId(#[from] recbridge_protocol::InvalidRecordingId),

    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}
