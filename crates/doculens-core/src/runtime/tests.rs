#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use serde_json::{Value, json};
    use tracing_test::traced_test;
    use uuid::Uuid;

    use crate::analysis::{AnalysisClient, AnalysisError};
    use crate::config::{CoreConfig, GateConfig, RetryPolicy, TimeLimits};
    use crate::runtime::dispatcher::Dispatcher;
    use crate::runtime::store::ResultStore;
    use crate::runtime::types::{CoreError, TaskId, TaskOutcome, TaskStatusView};

    // ── Mock analysis clients ─────────────────────────────────────────────────

    /// Always succeeds with a fixed payload; counts invocations.
    struct StaticClient {
        payload: Value,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl AnalysisClient for StaticClient {
        async fn analyze(&self, _image: &[u8]) -> Result<Value, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    enum FailKind {
        Transport,
        Malformed,
    }

    /// Always fails with the configured class; counts invocations.
    struct FailingClient {
        kind: FailKind,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl AnalysisClient for FailingClient {
        async fn analyze(&self, _image: &[u8]) -> Result<Value, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(match self.kind {
                FailKind::Transport => AnalysisError::Transport("connection refused".into()),
                FailKind::Malformed => AnalysisError::Malformed("prose instead of JSON".into()),
            })
        }
    }

    /// Sleeps far longer than any test time limit before answering.
    struct SlowClient;

    #[async_trait]
    impl AnalysisClient for SlowClient {
        async fn analyze(&self, _image: &[u8]) -> Result<Value, AnalysisError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!({}))
        }
    }

    // ── Fixtures ──────────────────────────────────────────────────────────────

    fn encode_jpeg(img: &RgbImage) -> Vec<u8> {
        let mut out = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 95);
        encoder.encode_image(img).expect("test image encodes");
        out
    }

    /// Sharp, well-lit test frame.
    fn good_image() -> Vec<u8> {
        let img = RgbImage::from_fn(128, 128, |x, y| {
            let v = if (x / 4 + y / 4) % 2 == 0 { 60 } else { 180 };
            Rgb([v, v, v])
        });
        encode_jpeg(&img)
    }

    fn black_image() -> Vec<u8> {
        encode_jpeg(&RgbImage::from_pixel(128, 128, Rgb([0, 0, 0])))
    }

    /// Write bytes to a unique spool path, as the submit endpoint would.
    fn spool(bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("doculens-test-{}.jpg", Uuid::new_v4()));
        std::fs::write(&path, bytes).expect("spool write");
        path
    }

    /// Config with millisecond-scale delays so retry tests finish quickly.
    /// The sharpness check is waived: mock clients never look at the pixels.
    fn fast_config() -> CoreConfig {
        CoreConfig {
            gate: GateConfig {
                blur_threshold: 0.0,
                ..GateConfig::default()
            },
            retry: RetryPolicy {
                max_attempts: 3,
                retry_delay: Duration::from_millis(10),
            },
            limits: TimeLimits {
                soft: Duration::from_millis(500),
                hard: Duration::from_secs(2),
            },
            worker_count: 2,
            queue_capacity: 8,
            ..CoreConfig::default()
        }
    }

    /// Poll the facade until the task leaves `Pending`.
    async fn poll_terminal(dispatcher: &Dispatcher, task_id: TaskId) -> TaskStatusView {
        let facade = dispatcher.status_facade();
        tokio::time::timeout(Duration::from_secs(20), async {
            loop {
                match facade.status(task_id).await {
                    TaskStatusView::Pending => {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    terminal => return terminal,
                }
            }
        })
        .await
        .expect("task should reach a terminal state")
    }

    // ── End-to-end pipeline ───────────────────────────────────────────────────

    #[tokio::test]
    async fn submitted_task_succeeds_and_spool_is_removed() {
        let store = ResultStore::new();
        let client = Arc::new(StaticClient {
            payload: json!({"doc_type": "ID"}),
            calls: Arc::new(AtomicU32::new(0)),
        });
        let dispatcher = Dispatcher::start(&fast_config(), client, store.clone());

        let path = spool(&good_image());
        let task_id = dispatcher.submit(path.clone()).await.expect("submit");

        let view = poll_terminal(&dispatcher, task_id).await;
        assert_eq!(view, TaskStatusView::Succeeded(json!({"doc_type": "ID"})));
        assert!(!path.exists(), "spool file must be deleted");
        assert_eq!(dispatcher.inflight_count().await, 0);
    }

    #[tokio::test]
    async fn polling_after_terminal_state_is_idempotent() {
        let store = ResultStore::new();
        let client = Arc::new(StaticClient {
            payload: json!({"n": 1}),
            calls: Arc::new(AtomicU32::new(0)),
        });
        let dispatcher = Dispatcher::start(&fast_config(), client, store);

        let task_id = dispatcher.submit(spool(&good_image())).await.expect("submit");
        let first = poll_terminal(&dispatcher, task_id).await;

        let facade = dispatcher.status_facade();
        for _ in 0..3 {
            assert_eq!(facade.status(task_id).await, first);
        }
    }

    #[tokio::test]
    async fn gate_rejection_is_terminal_without_any_analysis_call() {
        let store = ResultStore::new();
        let calls = Arc::new(AtomicU32::new(0));
        let client = Arc::new(StaticClient {
            payload: json!({}),
            calls: Arc::clone(&calls),
        });
        let dispatcher = Dispatcher::start(&fast_config(), client, store.clone());

        let path = spool(&black_image());
        let task_id = dispatcher.submit(path.clone()).await.expect("submit");

        match poll_terminal(&dispatcher, task_id).await {
            TaskStatusView::Failed(failure) => {
                assert_eq!(failure.message, "dark");
                assert_eq!(failure.status_code, 422);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0, "rejected input must not be analyzed");
        assert!(!path.exists(), "spool file must be deleted");

        let outcome = store.get(task_id).await.expect("outcome stored");
        assert_eq!(outcome.attempts, 1, "a rejection must not trigger retries");
    }

    #[tokio::test]
    async fn transport_failures_retry_to_the_attempt_cap() {
        let store = ResultStore::new();
        let calls = Arc::new(AtomicU32::new(0));
        let client = Arc::new(FailingClient {
            kind: FailKind::Transport,
            calls: Arc::clone(&calls),
        });
        let dispatcher = Dispatcher::start(&fast_config(), client, store.clone());

        let path = spool(&good_image());
        let task_id = dispatcher.submit(path.clone()).await.expect("submit");

        match poll_terminal(&dispatcher, task_id).await {
            TaskStatusView::Failed(failure) => {
                assert_eq!(failure.status_code, 500);
                assert!(
                    failure.message.contains("3 attempts"),
                    "message should state the attempt count: {}",
                    failure.message
                );
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3, "exactly three attempts");
        assert_eq!(store.get(task_id).await.expect("stored").attempts, 3);
        assert!(!path.exists(), "spool file must be deleted");
    }

    #[tokio::test]
    async fn malformed_responses_share_the_same_retry_budget() {
        let store = ResultStore::new();
        let calls = Arc::new(AtomicU32::new(0));
        let client = Arc::new(FailingClient {
            kind: FailKind::Malformed,
            calls: Arc::clone(&calls),
        });
        let dispatcher = Dispatcher::start(&fast_config(), client, store);

        let task_id = dispatcher.submit(spool(&good_image())).await.expect("submit");

        match poll_terminal(&dispatcher, task_id).await {
            TaskStatusView::Failed(failure) => assert_eq!(failure.status_code, 500),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn soft_time_limit_fails_the_attempt_gracefully() {
        let store = ResultStore::new();
        let mut config = fast_config();
        config.retry.max_attempts = 2;
        config.limits = TimeLimits {
            soft: Duration::from_millis(50),
            hard: Duration::from_secs(10),
        };
        let dispatcher = Dispatcher::start(&config, Arc::new(SlowClient), store);

        let path = spool(&good_image());
        let task_id = dispatcher.submit(path.clone()).await.expect("submit");

        match poll_terminal(&dispatcher, task_id).await {
            TaskStatusView::Failed(failure) => assert_eq!(failure.status_code, 500),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!path.exists(), "spool file must be deleted after a soft timeout");
    }

    #[tokio::test]
    async fn hard_time_limit_kills_the_attempt_and_still_cleans_up() {
        let store = ResultStore::new();
        let mut config = fast_config();
        config.retry.max_attempts = 2;
        // Soft limit deliberately above hard so the forced-kill path is the
        // one that fires.
        config.limits = TimeLimits {
            soft: Duration::from_secs(10),
            hard: Duration::from_millis(50),
        };
        let dispatcher = Dispatcher::start(&config, Arc::new(SlowClient), store.clone());

        let path = spool(&good_image());
        let task_id = dispatcher.submit(path.clone()).await.expect("submit");

        match poll_terminal(&dispatcher, task_id).await {
            TaskStatusView::Failed(failure) => assert_eq!(failure.status_code, 500),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(store.get(task_id).await.expect("stored").attempts, 2);
        assert!(!path.exists(), "spool file must be deleted after a forced kill");
    }

    #[tokio::test]
    async fn unreadable_upload_fails_fast_with_invalid_input_class() {
        let store = ResultStore::new();
        let calls = Arc::new(AtomicU32::new(0));
        let client = Arc::new(StaticClient {
            payload: json!({}),
            calls: Arc::clone(&calls),
        });
        let dispatcher = Dispatcher::start(&fast_config(), client, store.clone());

        let path = spool(b"definitely not an image");
        let task_id = dispatcher.submit(path.clone()).await.expect("submit");

        match poll_terminal(&dispatcher, task_id).await {
            TaskStatusView::Failed(failure) => assert_eq!(failure.status_code, 422),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.get(task_id).await.expect("stored").attempts, 1);
        assert!(!path.exists());
    }

    // ── Status facade ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn unknown_task_id_reads_not_found_not_pending() {
        let store = ResultStore::new();
        let client = Arc::new(StaticClient {
            payload: json!({}),
            calls: Arc::new(AtomicU32::new(0)),
        });
        let dispatcher = Dispatcher::start(&fast_config(), client, store);

        let facade = dispatcher.status_facade();
        assert_eq!(facade.status(Uuid::new_v4()).await, TaskStatusView::NotFound);
    }

    #[tokio::test]
    async fn accepted_but_unprocessed_task_reads_pending() {
        // No workers: tasks queue but never execute.
        let mut config = fast_config();
        config.worker_count = 0;
        config.queue_capacity = 1;
        let store = ResultStore::new();
        let client = Arc::new(StaticClient {
            payload: json!({}),
            calls: Arc::new(AtomicU32::new(0)),
        });
        let dispatcher = Dispatcher::start(&config, client, store);

        let first = spool(&good_image());
        let second = spool(&good_image());
        let task_id = dispatcher.submit(first.clone()).await.expect("submit");
        assert_eq!(
            dispatcher.status_facade().status(task_id).await,
            TaskStatusView::Pending
        );

        // Queue is full: the second submission is refused without blocking.
        let err = dispatcher.submit(second.clone()).await.unwrap_err();
        assert!(matches!(err, CoreError::QueueFull { capacity: 1 }));

        for path in [first, second] {
            let _ = std::fs::remove_file(path);
        }
    }

    // ── Result store ──────────────────────────────────────────────────────────

    #[traced_test]
    #[tokio::test]
    async fn terminal_write_is_first_write_wins() {
        let store = ResultStore::new();
        let task_id = Uuid::new_v4();
        let ttl = Duration::from_secs(60);

        let first = TaskOutcome::succeeded(task_id, json!({"v": 1}), 1, ttl);
        let duplicate =
            TaskOutcome::failed(task_id, &CoreError::RetriesExhausted { attempts: 3 }, 3, ttl);

        assert!(store.put(first).await);
        assert!(!store.put(duplicate).await, "duplicate write must be ignored");
        assert!(logs_contain("duplicate terminal write ignored"));

        let stored = store.get(task_id).await.expect("present");
        assert_eq!(stored.payload, Some(json!({"v": 1})));
        assert!(stored.failure.is_none());
    }

    #[tokio::test]
    async fn expired_result_reads_not_found_and_is_reaped() {
        let store = ResultStore::new();
        let task_id = Uuid::new_v4();
        let outcome =
            TaskOutcome::succeeded(task_id, json!({"v": 1}), 1, Duration::from_millis(40));
        store.put(outcome).await;

        assert!(store.get(task_id).await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.get(task_id).await.is_none(), "expired entry must be gone");
        assert_eq!(store.len().await, 0, "lazy expiry should reap the entry");
    }

    #[tokio::test]
    async fn sweep_reaps_expired_entries_without_reads() {
        let store = ResultStore::new();
        let live = Uuid::new_v4();
        store
            .put(TaskOutcome::succeeded(live, json!({}), 1, Duration::from_secs(60)))
            .await;
        store
            .put(TaskOutcome::succeeded(
                Uuid::new_v4(),
                json!({}),
                1,
                Duration::from_millis(10),
            ))
            .await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get(live).await.is_some());
    }
}
