//! Storage key scheme shared by the cache, status, and progress stores.

/// Prefix for cached binaries, keyed by recording id.
pub const CACHE_KEY_PREFIX: &str = "recorder_video_";

/// Prefix for transfer status records, keyed by recording id.
pub const STATUS_KEY_PREFIX: &str = "recorder_transfer_";

/// Prefix for integer progress records, keyed by session id.
pub const PROGRESS_KEY_PREFIX: &str = "recorder_progress_";

/// A recording id that cannot be used as a storage key.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid recording id: {0}")]
pub struct InvalidRecordingId(pub String);

/// Validates a recording id before it becomes part of a storage key.
///
/// Cache keys end up as file names, so ids must not be empty, start
/// with a dot, or smuggle in path syntax.
pub fn validate_recording_id(id: &str) -> Result<(), InvalidRecordingId> {
    if id.is_empty() {
        return Err(InvalidRecordingId("empty id".into()));
    }
    if id.starts_with('.') {
        return Err(InvalidRecordingId(format!("leading dot: {id}")));
    }
    if id
        .chars()
        .any(|c| c == '/' || c == '\\' || c == ':' || c.is_control())
    {
        return Err(InvalidRecordingId(format!(
            "path separator or control character: {id}"
        )));
    }
    Ok(())
}

/// Cache key for a recording id.
pub fn cache_key(recording_id: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{recording_id}")
}

/// Status record key for a recording id.
pub fn status_key(recording_id: &str) -> String {
    format!("{STATUS_KEY_PREFIX}{recording_id}")
}

/// Progress record key for a session id.
pub fn progress_key(session_id: &str) -> String {
    format!("{PROGRESS_KEY_PREFIX}{session_id}")
}
