//! Contract with the external producer.

use std::future::Future;
use std::pin::Pin;

use recbridge_protocol::RecordingInfo;

/// A boxed future returned by producer methods.
pub type ProducerFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// One-shot request transport errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The producer did not answer (not installed, not running).
    #[error("{0}")]
    Unreachable(String),

    /// The producer answered but refused the request.
    #[error("{0}")]
    Rejected(String),
}

/// One-shot request interface to the producer.
///
/// Implementors must honor `pull_recording` by eventually opening a
/// transfer session (`INIT → CHUNK* → FINISH`) toward the receiver; the
/// acknowledgment itself carries no data. "Not yet cached" after an
/// acknowledged pull is normal — the binary arrives asynchronously.
pub trait Producer: Send + Sync {
    /// Liveness check.
    fn ping(&self) -> ProducerFuture<'_, ()>;

    /// Fetches up to `limit` catalogue entries.
    fn list_recordings(&self, limit: usize) -> ProducerFuture<'_, Vec<RecordingInfo>>;

    /// Asks the producer to stream `recording_id`. Resolves once the
    /// request is acknowledged, not when the data arrives.
    fn pull_recording(
        &self,
        recording_id: &str,
        payload: Option<serde_json::Value>,
    ) -> ProducerFuture<'_, ()>;
}
