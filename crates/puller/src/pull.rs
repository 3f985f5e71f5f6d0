use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use recbridge_cache::{CachedVideo, VideoCache};
use recbridge_protocol::{RecordingInfo, TransferPhase};
use recbridge_status::{StatusBoard, StatusChange};

use crate::{Producer, PullError};

/// Tuning for a pull wait.
#[derive(Debug, Clone)]
pub struct PullConfig {
    /// How often the cache is re-checked directly, independent of
    /// status notifications.
    pub poll_interval: Duration,
    /// Overall ceiling for one pull, covering request, transfer, and
    /// persist.
    pub timeout: Duration,
    /// Producer-specific payload attached to every pull request and
    /// echoed back in the session metadata.
    pub pull_payload: Option<serde_json::Value>,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5 * 60),
            pull_payload: None,
        }
    }
}

/// Requests recordings from the producer and awaits their arrival in
/// the cache.
pub struct Puller {
    cache: Arc<VideoCache>,
    status: StatusBoard,
    config: PullConfig,
}

impl Puller {
    pub fn new(cache: Arc<VideoCache>, status: StatusBoard) -> Self {
        Self::with_config(cache, status, PullConfig::default())
    }

    pub fn with_config(cache: Arc<VideoCache>, status: StatusBoard, config: PullConfig) -> Self {
        Self {
            cache,
            status,
            config,
        }
    }

    /// Producer liveness check.
    pub async fn ping<P: Producer + ?Sized>(&self, producer: &P) -> Result<(), PullError> {
        producer.ping().await.map_err(Into::into)
    }

    /// Fetches the producer's recording catalogue.
    pub async fn list_recordings<P: Producer + ?Sized>(
        &self,
        producer: &P,
        limit: usize,
    ) -> Result<Vec<RecordingInfo>, PullError> {
        producer.list_recordings(limit).await.map_err(Into::into)
    }

    /// Pulls a recording, waiting until it is durably cached.
    pub async fn pull<P: Producer + ?Sized>(
        &self,
        producer: &P,
        recording_id: &str,
    ) -> Result<CachedVideo, PullError> {
        self.pull_with_cancel(producer, recording_id, &CancellationToken::new())
            .await
    }

    /// Like [`pull`](Self::pull), with cooperative cancellation.
    pub async fn pull_with_cancel<P: Producer + ?Sized>(
        &self,
        producer: &P,
        recording_id: &str,
        cancel: &CancellationToken,
    ) -> Result<CachedVideo, PullError> {
        // Fast path: already cached, no producer contact at all.
        if let Some(video) = self.cache.get(recording_id).await? {
            debug!(recording_id, size = video.size, "pull served from cache");
            return Ok(video);
        }

        // Arm the watchers before sending the request so nothing that
        // happens in between is missed.
        let mut changes = self.status.subscribe();
        let mut listener_alive = true;
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let deadline = tokio::time::sleep(self.config.timeout);
        tokio::pin!(deadline);

        producer
            .pull_recording(recording_id, self.config.pull_payload.clone())
            .await?;
        info!(recording_id, "pull requested from producer");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(recording_id, "pull cancelled");
                    return Err(PullError::Cancelled);
                }
                _ = &mut deadline => {
                    warn!(recording_id, timeout = ?self.config.timeout, "pull timed out");
                    return Err(PullError::Timeout);
                }
                change = changes.recv(), if listener_alive => match change {
                    Ok(StatusChange { recording_id: id, record: Some(record) })
                        if id == recording_id =>
                    {
                        match record.status {
                            TransferPhase::Complete if record.saved => {
                                debug!(recording_id, "status listener saw completion");
                                return self.cache.get(recording_id).await?.ok_or_else(|| {
                                    PullError::MissingAfterComplete(recording_id.to_string())
                                });
                            }
                            TransferPhase::Error => {
                                return Err(PullError::Transfer(record.error));
                            }
                            _ => {}
                        }
                    }
                    Ok(_) => {}
                    // The poll covers events dropped from the buffer.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(recording_id, skipped, "status listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        listener_alive = false;
                    }
                },
                _ = poll.tick() => {
                    if let Some(video) = self.cache.get(recording_id).await? {
                        debug!(recording_id, size = video.size, "poll found cached recording");
                        return Ok(video);
                    }
                }
            }
        }
    }
}
