use serde::{Deserialize, Serialize};

use crate::types::TransferMetadata;

/// Frames exchanged over a transfer session channel.
///
/// On the wire each frame is `{"type": "...", "data": {...}}`; chunk
/// bytes travel base64-encoded inside the JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferFrame {
    /// Producer opens the session and announces the chunk count.
    Init { metadata: TransferMetadata },
    /// Receiver acknowledges INIT; the buffer is allocated.
    Ready { id: String },
    /// One binary fragment. Arrival order is unconstrained.
    Chunk {
        id: String,
        index: usize,
        #[serde(with = "base64_bytes")]
        chunk: Vec<u8>,
    },
    /// Receiver acknowledges a stored chunk.
    ChunkAck { id: String, index: usize },
    /// Producer declares all chunks sent.
    Finish { id: String },
    /// Receiver reassembled and persisted the recording.
    Complete { id: String },
    /// Session failed; the channel closes after this frame.
    Error { id: String, error: String },
}

impl TransferFrame {
    /// Session id carried by the frame, if any. INIT carries it inside
    /// the metadata.
    pub fn session_id(&self) -> &str {
        match self {
            TransferFrame::Init { metadata } => &metadata.id,
            TransferFrame::Ready { id }
            | TransferFrame::Chunk { id, .. }
            | TransferFrame::ChunkAck { id, .. }
            | TransferFrame::Finish { id }
            | TransferFrame::Complete { id }
            | TransferFrame::Error { id, .. } => id,
        }
    }
}

/// Base64 serde module for chunk bytes in JSON frames.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
