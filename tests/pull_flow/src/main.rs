fn main() {
    println!("Run `cargo test -p pull-flow` to execute the end-to-end pull tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use recbridge_cache::VideoCache;
    use recbridge_protocol::{RecordingFormat, RecordingInfo, TransferFrame, TransferMetadata};
    use recbridge_puller::{
        Producer, ProducerFuture, PullConfig, PullError, Puller, TransportError,
    };
    use recbridge_receiver::serve;
    use recbridge_status::StatusBoard;

    const CHUNK_SIZE: usize = 5;

    struct SimRecording {
        data: Vec<u8>,
        format: RecordingFormat,
        title: String,
    }

    /// In-process producer that answers pull requests by opening a real
    /// transfer session against the shared receiver.
    struct SimProducer {
        cache: Arc<VideoCache>,
        status: StatusBoard,
        recordings: HashMap<String, SimRecording>,
        reachable: bool,
        /// Skip sending this chunk index, forcing a missing-chunk error.
        drop_chunk: Option<usize>,
        /// Acknowledge the pull but never deliver anything.
        silent: bool,
        deliveries: AtomicUsize,
    }

    impl SimProducer {
        fn new(cache: Arc<VideoCache>, status: StatusBoard) -> Self {
            Self {
                cache,
                status,
                recordings: HashMap::new(),
                reachable: true,
                drop_chunk: None,
                silent: false,
                deliveries: AtomicUsize::new(0),
            }
        }

        fn with_recording(mut self, id: &str, data: &[u8], format: RecordingFormat) -> Self {
            self.recordings.insert(
                id.to_string(),
                SimRecording {
                    data: data.to_vec(),
                    format,
                    title: format!("Recording {id}"),
                },
            );
            self
        }

        fn deliveries(&self) -> usize {
            self.deliveries.load(Ordering::SeqCst)
        }

        /// Streams one recording through a freshly spawned serve loop.
        async fn deliver(
            cache: Arc<VideoCache>,
            status: StatusBoard,
            recording_id: String,
            data: Vec<u8>,
            format: RecordingFormat,
            payload: Option<serde_json::Value>,
            drop_chunk: Option<usize>,
        ) {
            let (to_receiver, incoming) = mpsc::channel(16);
            let (outgoing, mut from_receiver) = mpsc::channel(16);
            tokio::spawn(serve(
                cache,
                status,
                incoming,
                outgoing,
                CancellationToken::new(),
            ));

            let chunks: Vec<Vec<u8>> = data.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
            let session_id = format!("xfer-{recording_id}");
            let metadata = TransferMetadata {
                id: session_id.clone(),
                chunk_count: chunks.len(),
                format,
                title: String::new(),
                size: data.len() as u64,
                duration: 0,
                width: 0,
                height: 0,
                recording_id,
                payload,
            };

            if to_receiver
                .send(TransferFrame::Init { metadata })
                .await
                .is_err()
            {
                return;
            }
            if from_receiver.recv().await.is_none() {
                return;
            }

            for (index, chunk) in chunks.into_iter().enumerate() {
                if drop_chunk == Some(index) {
                    continue;
                }
                let frame = TransferFrame::Chunk {
                    id: session_id.clone(),
                    index,
                    chunk,
                };
                if to_receiver.send(frame).await.is_err() {
                    return;
                }
                if from_receiver.recv().await.is_none() {
                    return;
                }
            }

            let _ = to_receiver
                .send(TransferFrame::Finish {
                    id: session_id.clone(),
                })
                .await;
            // COMPLETE or ERROR; either way the session is over.
            let _ = from_receiver.recv().await;
        }
    }

    impl Producer for SimProducer {
        fn ping(&self) -> ProducerFuture<'_, ()> {
            Box::pin(async move {
                if self.reachable {
                    Ok(())
                } else {
                    Err(TransportError::Unreachable("producer not running".into()))
                }
            })
        }

        fn list_recordings(&self, limit: usize) -> ProducerFuture<'_, Vec<RecordingInfo>> {
            Box::pin(async move {
                if !self.reachable {
                    return Err(TransportError::Unreachable("producer not running".into()));
                }
                Ok(self
                    .recordings
                    .iter()
                    .take(limit)
                    .map(|(id, rec)| RecordingInfo {
                        id: id.clone(),
                        title: rec.title.clone(),
                        format: rec.format,
                        size: rec.data.len() as u64,
                        duration: 0,
                        timestamp: 0,
                    })
                    .collect())
            })
        }

        fn pull_recording(
            &self,
            recording_id: &str,
            payload: Option<serde_json::Value>,
        ) -> ProducerFuture<'_, ()> {
            let recording_id = recording_id.to_string();
            Box::pin(async move {
                if !self.reachable {
                    return Err(TransportError::Unreachable("producer not running".into()));
                }
                let Some(rec) = self.recordings.get(&recording_id) else {
                    return Err(TransportError::Rejected(format!(
                        "unknown recording {recording_id}"
                    )));
                };
                self.deliveries.fetch_add(1, Ordering::SeqCst);
                if self.silent {
                    return Ok(());
                }
                tokio::spawn(Self::deliver(
                    Arc::clone(&self.cache),
                    self.status.clone(),
                    recording_id,
                    rec.data.clone(),
                    rec.format,
                    payload,
                    self.drop_chunk,
                ));
                Ok(())
            })
        }
    }

    struct Rig {
        _dir: TempDir,
        cache: Arc<VideoCache>,
        status: StatusBoard,
    }

    async fn rig() -> Rig {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(VideoCache::open(dir.path()).await.unwrap());
        Rig {
            _dir: dir,
            cache,
            status: StatusBoard::new(),
        }
    }

    fn puller(rig: &Rig) -> Puller {
        Puller::with_config(
            Arc::clone(&rig.cache),
            rig.status.clone(),
            PullConfig {
                poll_interval: Duration::from_millis(25),
                timeout: Duration::from_secs(2),
                pull_payload: None,
            },
        )
    }

    #[tokio::test]
    async fn full_pull_end_to_end() {
        let rig = rig().await;
        let producer = SimProducer::new(Arc::clone(&rig.cache), rig.status.clone())
            .with_recording("rec-1", b"the quick brown fox", RecordingFormat::Webm);

        let video = puller(&rig).pull(&producer, "rec-1").await.unwrap();
        assert_eq!(video.data, b"the quick brown fox");
        assert_eq!(video.mime_type, "video/webm");
        assert_eq!(producer.deliveries(), 1);

        let record = rig.status.get("rec-1").unwrap();
        assert!(record.saved);
        // Progress is transient and gone once the session finished.
        assert!(rig.status.progress("xfer-rec-1").is_none());
    }

    #[tokio::test]
    async fn mp4_recording_keeps_its_mime_type() {
        let rig = rig().await;
        let producer = SimProducer::new(Arc::clone(&rig.cache), rig.status.clone())
            .with_recording("clip", b"mp4 payload bytes", RecordingFormat::Mp4);

        let video = puller(&rig).pull(&producer, "clip").await.unwrap();
        assert_eq!(video.mime_type, "video/mp4");
    }

    #[tokio::test]
    async fn second_pull_is_served_from_cache() {
        let rig = rig().await;
        let producer = SimProducer::new(Arc::clone(&rig.cache), rig.status.clone())
            .with_recording("rec-1", b"once only", RecordingFormat::Webm);
        let puller = puller(&rig);

        puller.pull(&producer, "rec-1").await.unwrap();
        let again = puller.pull(&producer, "rec-1").await.unwrap();
        assert_eq!(again.data, b"once only");
        assert_eq!(producer.deliveries(), 1);
    }

    #[tokio::test]
    async fn unreachable_producer_fails_fast() {
        let rig = rig().await;
        let mut producer = SimProducer::new(Arc::clone(&rig.cache), rig.status.clone());
        producer.reachable = false;

        let err = puller(&rig).pull(&producer, "rec-1").await.unwrap_err();
        assert!(matches!(
            err,
            PullError::Transport(TransportError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn unknown_recording_is_rejected() {
        let rig = rig().await;
        let producer = SimProducer::new(Arc::clone(&rig.cache), rig.status.clone());

        let err = puller(&rig).pull(&producer, "nope").await.unwrap_err();
        assert!(matches!(
            err,
            PullError::Transport(TransportError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn missing_chunk_error_reaches_the_puller() {
        let rig = rig().await;
        let mut producer = SimProducer::new(Arc::clone(&rig.cache), rig.status.clone())
            .with_recording("rec-1", b"0123456789abcdef", RecordingFormat::Webm);
        producer.drop_chunk = Some(1);

        let err = puller(&rig).pull(&producer, "rec-1").await.unwrap_err();
        match err {
            PullError::Transfer(message) => {
                assert_eq!(message, "Missing chunk at index 1");
            }
            other => panic!("expected Transfer error, got {other:?}"),
        }
        assert!(rig.cache.get("rec-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn silent_producer_times_out() {
        let rig = rig().await;
        let mut producer = SimProducer::new(Arc::clone(&rig.cache), rig.status.clone())
            .with_recording("rec-1", b"never sent", RecordingFormat::Webm);
        producer.silent = true;

        let puller = Puller::with_config(
            Arc::clone(&rig.cache),
            rig.status.clone(),
            PullConfig {
                poll_interval: Duration::from_millis(25),
                timeout: Duration::from_millis(150),
                pull_payload: None,
            },
        );

        let err = puller.pull(&producer, "rec-1").await.unwrap_err();
        assert!(matches!(err, PullError::Timeout));
        assert_eq!(producer.deliveries(), 1);
    }

    #[tokio::test]
    async fn zero_chunk_recording_yields_empty_entry() {
        let rig = rig().await;
        let producer = SimProducer::new(Arc::clone(&rig.cache), rig.status.clone())
            .with_recording("empty", b"", RecordingFormat::Webm);

        let video = puller(&rig).pull(&producer, "empty").await.unwrap();
        assert!(video.data.is_empty());
        assert_eq!(video.mime_type, "video/webm");
    }

    #[tokio::test]
    async fn pull_payload_recording_id_routes_the_entry() {
        let rig = rig().await;
        let producer = SimProducer::new(Arc::clone(&rig.cache), rig.status.clone())
            .with_recording("rec-1", b"routed by payload", RecordingFormat::Webm);

        let puller = Puller::with_config(
            Arc::clone(&rig.cache),
            rig.status.clone(),
            PullConfig {
                poll_interval: Duration::from_millis(25),
                timeout: Duration::from_secs(2),
                pull_payload: Some(serde_json::json!({ "recordingId": "rec-1" })),
            },
        );

        let video = puller.pull(&producer, "rec-1").await.unwrap();
        assert_eq!(video.data, b"routed by payload");
    }

    #[tokio::test]
    async fn ping_and_catalogue_listing() {
        let rig = rig().await;
        let producer = SimProducer::new(Arc::clone(&rig.cache), rig.status.clone())
            .with_recording("a", b"aaaaa", RecordingFormat::Webm)
            .with_recording("b", b"bbbbb", RecordingFormat::Mp4);
        let puller = puller(&rig);

        puller.ping(&producer).await.unwrap();
        let listing = puller.list_recordings(&producer, 10).await.unwrap();
        assert_eq!(listing.len(), 2);
        let limited = puller.list_recordings(&producer, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_pulls_of_distinct_recordings() {
        let rig = rig().await;
        let producer = Arc::new(
            SimProducer::new(Arc::clone(&rig.cache), rig.status.clone())
                .with_recording("rec-a", b"payload a", RecordingFormat::Webm)
                .with_recording("rec-b", b"payload b", RecordingFormat::Webm),
        );
        let puller = Arc::new(puller(&rig));

        let a = {
            let puller = Arc::clone(&puller);
            let producer = Arc::clone(&producer);
            tokio::spawn(async move { puller.pull(producer.as_ref(), "rec-a").await })
        };
        let b = {
            let puller = Arc::clone(&puller);
            let producer = Arc::clone(&producer);
            tokio::spawn(async move { puller.pull(producer.as_ref(), "rec-b").await })
        };

        assert_eq!(a.await.unwrap().unwrap().data, b"payload a");
        assert_eq!(b.await.unwrap().unwrap().data, b"payload b");
        assert_eq!(producer.deliveries(), 2);
    }
}
