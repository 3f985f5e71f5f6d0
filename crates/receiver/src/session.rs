use std::sync::Arc;

use tracing::{debug, info, warn};

use recbridge_cache::VideoCache;
use recbridge_protocol::{TransferFrame, TransferMetadata, TransferStatus};
use recbridge_status::StatusBoard;

use crate::ReceiverError;

/// Lifecycle of one transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No INIT processed yet.
    Idle,
    /// Buffer allocated, no chunk stored yet.
    Initialized,
    /// At least one chunk stored.
    Receiving,
    /// Recording persisted and COMPLETE sent.
    Complete,
    /// Session terminated by an error.
    Failed,
    /// Channel closed; the buffer is gone.
    Closed,
}

/// State machine for one chunked transfer.
///
/// Owns the chunk buffer exclusively; the buffer is discarded when the
/// session ends, whatever the outcome. `handle_frame` returns the
/// reply frames to send back to the producer; an `Err` means the
/// session is failed and the channel must close.
pub struct TransferSession {
    cache: Arc<VideoCache>,
    status: StatusBoard,
    phase: SessionPhase,
    metadata: Option<TransferMetadata>,
    chunks: Vec<Option<Vec<u8>>>,
}

impl TransferSession {
    pub fn new(cache: Arc<VideoCache>, status: StatusBoard) -> Self {
        Self {
            cache,
            status,
            phase: SessionPhase::Idle,
            metadata: None,
            chunks: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Session id from the INIT metadata, once known.
    pub fn session_id(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.id.as_str())
    }

    /// Releases the chunk buffer. Called by the serve loop when the
    /// channel closes for any reason.
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
        self.chunks = Vec::new();
    }

    /// Processes one frame, returning replies for the producer.
    ///
    /// On error the session is failed and, when the recording id is
    /// already known, a status-board error record is published so
    /// pullers learn about the failure too.
    pub async fn handle_frame(
        &mut self,
        frame: TransferFrame,
    ) -> Result<Vec<TransferFrame>, ReceiverError> {
        let result = match frame {
            TransferFrame::Init { metadata } => self.handle_init(metadata),
            TransferFrame::Chunk { id, index, chunk } => self.handle_chunk(&id, index, chunk),
            TransferFrame::Finish { id } => self.handle_finish(&id).await,
            other => Err(ReceiverError::Protocol(format!(
                "unexpected {} frame from producer",
                frame_name(&other)
            ))),
        };
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    fn handle_init(&mut self, metadata: TransferMetadata) -> Result<Vec<TransferFrame>, ReceiverError> {
        if self.phase != SessionPhase::Idle {
            // A restart requires a fresh session; silently resetting
            // state would discard chunks the producer believes are
            // already acknowledged.
            return Err(ReceiverError::Protocol(format!(
                "duplicate INIT for session {}",
                metadata.id
            )));
        }

        info!(
            session_id = %metadata.id,
            chunk_count = metadata.chunk_count,
            format = ?metadata.format,
            "transfer session initialized"
        );

        self.chunks = vec![None; metadata.chunk_count];
        let id = metadata.id.clone();
        self.metadata = Some(metadata);
        self.phase = SessionPhase::Initialized;
        Ok(vec![TransferFrame::Ready { id }])
    }

    fn handle_chunk(
        &mut self,
        id: &str,
        index: usize,
        chunk: Vec<u8>,
    ) -> Result<Vec<TransferFrame>, ReceiverError> {
        let (session_id, chunk_count) = {
            let metadata = self.active_metadata("CHUNK")?;
            if id != metadata.id {
                return Err(ReceiverError::Protocol(format!(
                    "chunk for unknown session {id}, active session is {}",
                    metadata.id
                )));
            }
            (metadata.id.clone(), metadata.chunk_count)
        };
        if index >= chunk_count {
            return Err(ReceiverError::Protocol(format!("Invalid chunk index {index}")));
        }

        debug!(session_id = %session_id, index, size = chunk.len(), "chunk stored");
        self.chunks[index] = Some(chunk);
        self.phase = SessionPhase::Receiving;

        // Best-effort: reflects the latest index, not distinct chunks.
        let percent = ((index as f64 + 1.0) / chunk_count as f64 * 100.0).round() as u8;
        self.status.set_progress(&session_id, percent);

        Ok(vec![TransferFrame::ChunkAck {
            id: session_id,
            index,
        }])
    }

    async fn handle_finish(&mut self, id: &str) -> Result<Vec<TransferFrame>, ReceiverError> {
        let (session_id, recording_id, mime_type) = {
            let metadata = self.active_metadata("FINISH")?;
            if id != metadata.id {
                return Err(ReceiverError::Protocol(format!(
                    "finish for unknown session {id}, active session is {}",
                    metadata.id
                )));
            }
            (
                metadata.id.clone(),
                metadata.resolved_recording_id().to_string(),
                metadata.format.mime_type(),
            )
        };

        if let Some(missing) = self.chunks.iter().position(|slot| slot.is_none()) {
            return Err(ReceiverError::MissingChunk(missing));
        }

        let total: usize = self.chunks.iter().flatten().map(Vec::len).sum();
        let mut data = Vec::with_capacity(total);
        for slot in self.chunks.drain(..) {
            data.extend_from_slice(&slot.unwrap_or_default());
        }

        self.cache.put(&recording_id, data, mime_type).await?;

        let now = chrono::Utc::now().timestamp_millis();
        self.status
            .publish(&recording_id, TransferStatus::complete(mime_type, now));
        self.status.clear_progress(&session_id);
        self.phase = SessionPhase::Complete;

        info!(
            session_id = %session_id,
            recording_id = %recording_id,
            size = total,
            mime_type,
            "recording persisted"
        );

        Ok(vec![TransferFrame::Complete { id: session_id }])
    }

    fn active_metadata(&self, frame: &str) -> Result<&TransferMetadata, ReceiverError> {
        let metadata = self.metadata.as_ref().ok_or_else(|| {
            ReceiverError::Protocol(format!("{frame} before INIT"))
        })?;
        match self.phase {
            SessionPhase::Initialized | SessionPhase::Receiving => Ok(metadata),
            _ => Err(ReceiverError::Protocol(format!(
                "{frame} on ended session {}",
                metadata.id
            ))),
        }
    }

    /// Marks the session failed and surfaces the error to pullers when
    /// the recording id is already known.
    fn fail(&mut self, error: &ReceiverError) {
        self.phase = SessionPhase::Failed;
        if let Some(metadata) = &self.metadata {
            let recording_id = metadata.resolved_recording_id().to_string();
            warn!(
                session_id = %metadata.id,
                recording_id = %recording_id,
                error = %error,
                "transfer session failed"
            );
            let now = chrono::Utc::now().timestamp_millis();
            self.status
                .publish(&recording_id, TransferStatus::error(&error.to_string(), now));
            self.status.clear_progress(&metadata.id);
        }
        self.chunks = Vec::new();
    }
}

fn frame_name(frame: &TransferFrame) -> &'static str {
    match frame {
        TransferFrame::Init { .. } => "INIT",
        TransferFrame::Ready { .. } => "READY",
        TransferFrame::Chunk { .. } => "CHUNK",
        TransferFrame::ChunkAck { .. } => "CHUNK_ACK",
        TransferFrame::Finish { .. } => "FINISH",
        TransferFrame::Complete { .. } => "COMPLETE",
        TransferFrame::Error { .. } => "ERROR",
    }
}
