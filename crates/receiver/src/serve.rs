//! Channel-driven serve loop for a single transfer session.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use recbridge_cache::VideoCache;
use recbridge_protocol::TransferFrame;
use recbridge_status::StatusBoard;

use crate::{ReceiverError, SessionPhase, TransferSession};

/// Runs one transfer session over a frame channel pair.
///
/// Returns when the session completes, the producer disconnects (the
/// incoming channel closes), the token is cancelled, or a session
/// error occurs. On error an ERROR frame is sent first when the
/// session id is known, then the channel closes by dropping the
/// sender. There is no session-level timeout here; the puller's outer
/// ceiling bounds total wait.
pub async fn serve(
    cache: Arc<VideoCache>,
    status: StatusBoard,
    mut incoming: mpsc::Receiver<TransferFrame>,
    outgoing: mpsc::Sender<TransferFrame>,
    cancel: CancellationToken,
) -> Result<(), ReceiverError> {
    let mut session = TransferSession::new(cache, status);

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("transfer serve loop cancelled");
                session.close();
                return Ok(());
            }
            frame = incoming.recv() => match frame {
                Some(frame) => frame,
                None => {
                    debug!(session_id = ?session.session_id(), "producer disconnected");
                    session.close();
                    return Ok(());
                }
            },
        };

        match session.handle_frame(frame).await {
            Ok(replies) => {
                for reply in replies {
                    if outgoing.send(reply).await.is_err() {
                        debug!("reply channel closed by producer");
                        session.close();
                        return Ok(());
                    }
                }
                if session.phase() == SessionPhase::Complete {
                    session.close();
                    return Ok(());
                }
            }
            Err(e) => {
                warn!(error = %e, "terminating transfer session");
                if let Some(id) = session.session_id() {
                    let frame = TransferFrame::Error {
                        id: id.to_string(),
                        error: e.to_string(),
                    };
                    let _ = outgoing.send(frame).await;
                }
                session.close();
                return Err(e);
            }
        }
    }
}
