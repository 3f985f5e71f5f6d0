//! Wire protocol types for recorder-to-publisher video transfers.
//!
//! A *producer* (the recorder component) streams a finished screen
//! recording to a *consumer* (the publishing client) over a chunked
//! session: `INIT → CHUNK* → FINISH`. Outside the session, consumers
//! talk to the producer with one-shot requests (ping, catalogue
//! listing, pull requests). This crate defines the serde types for
//! both, plus the storage key scheme shared by the cache, the status
//! board, and progress records.

pub mod frames;
pub mod keys;
pub mod requests;
pub mod types;

pub use frames::TransferFrame;
pub use keys::{
    CACHE_KEY_PREFIX, PROGRESS_KEY_PREFIX, STATUS_KEY_PREFIX, InvalidRecordingId, cache_key,
    progress_key, status_key, validate_recording_id,
};
pub use requests::{
    ListRecordingsRequest, ListRecordingsResponse, PullRecordingRequest, PullRecordingResponse,
};
pub use types::{RecordingFormat, RecordingInfo, TransferMetadata, TransferPhase, TransferStatus};
