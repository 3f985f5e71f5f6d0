use serde::{Deserialize, Serialize};

/// Container format of a recording.
///
/// The set is closed: a metadata payload carrying any other value fails
/// deserialization, which the receiver reports as a protocol error at
/// INIT instead of silently falling back to a default container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingFormat {
    #[serde(rename = "webm")]
    Webm,
    #[serde(rename = "mp4")]
    Mp4,
}

impl RecordingFormat {
    /// MIME type of the reassembled binary.
    pub fn mime_type(self) -> &'static str {
        match self {
            RecordingFormat::Webm => "video/webm",
            RecordingFormat::Mp4 => "video/mp4",
        }
    }
}

/// Metadata announcing a transfer session, sent by the producer in the
/// INIT frame. Immutable for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    /// Session id chosen by the producer.
    pub id: String,
    /// Number of chunks the producer will send. Fixed once INIT is
    /// processed.
    pub chunk_count: usize,
    pub format: RecordingFormat,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Total recording size in bytes, if the producer knows it up front.
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub size: u64,
    /// Duration in milliseconds.
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub duration: u64,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub width: u32,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub height: u32,
    /// Recording id, when it differs from the session id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recording_id: String,
    /// Opaque producer-specific payload echoed back from the pull
    /// request. May carry a `recordingId` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl TransferMetadata {
    /// Resolves the recording id the reassembled binary is stored
    /// under: first non-empty value wins, in order
    /// `payload.recordingId`, `recording_id`, `id`.
    pub fn resolved_recording_id(&self) -> &str {
        if let Some(id) = self
            .payload
            .as_ref()
            .and_then(|p| p.get("recordingId"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
        {
            return id;
        }
        if !self.recording_id.is_empty() {
            return &self.recording_id;
        }
        &self.id
    }
}

/// Outcome of a transfer as seen through the status board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferPhase {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "error")]
    Error,
}

/// Status record for one recording id. Written only by the receiver,
/// always delete-then-rewrite, so observers see every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatus {
    pub status: TransferPhase,
    /// `true` once the binary is durably in the cache.
    pub saved: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    /// Epoch milliseconds of the status write.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl TransferStatus {
    /// Record for a successfully persisted transfer.
    pub fn complete(mime_type: &str, timestamp: i64) -> Self {
        Self {
            status: TransferPhase::Complete,
            saved: true,
            mime_type: mime_type.to_string(),
            timestamp,
            error: String::new(),
        }
    }

    /// Record for a failed transfer.
    pub fn error(message: &str, timestamp: i64) -> Self {
        Self {
            status: TransferPhase::Error,
            saved: false,
            mime_type: String::new(),
            timestamp,
            error: message.to_string(),
        }
    }
}

/// Catalogue entry returned by the producer for LIST_RECORDINGS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub format: RecordingFormat,
    pub size: u64,
    /// Duration in milliseconds.
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub duration: u64,
    /// Epoch milliseconds the recording finished.
    pub timestamp: i64,
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
