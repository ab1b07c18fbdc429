//! Task submission, queuing, and the worker pool.
//!
//! [`Dispatcher::start`] wires the bounded submission channel to a pool of
//! worker loops. Submission is fire-and-forget: it allocates an id, registers
//! it in the in-flight registry, and `try_send`s the message — it never
//! blocks on task execution. Workers pull messages as they become free
//! (best-effort FIFO, no cross-task ordering guarantee), drive the executor,
//! and publish the terminal outcome to the result store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::AnalysisClient;
use crate::config::CoreConfig;
use crate::quality::QualityGate;
use crate::runtime::executor::TaskExecutor;
use crate::runtime::status::StatusFacade;
use crate::runtime::store::ResultStore;
use crate::runtime::types::{CoreError, TaskId, TaskMessage, TaskState};

/// Registry of tasks the dispatcher has accepted but not yet finished.
/// Shared with the [`StatusFacade`] so polling can tell "still working"
/// apart from "never heard of it".
pub(crate) type InflightRegistry = Arc<RwLock<HashMap<TaskId, TaskState>>>;

/// Handle for submitting tasks; cheap to clone.
///
/// Dropping every clone closes the channel and drains the worker pool.
#[derive(Clone)]
pub struct Dispatcher {
    tx: flume::Sender<TaskMessage>,
    inflight: InflightRegistry,
    store: ResultStore,
    capacity: usize,
}

impl Dispatcher {
    /// Spawn the worker pool and return the submission handle.
    pub fn start(
        config: &CoreConfig,
        client: Arc<dyn AnalysisClient>,
        store: ResultStore,
    ) -> Self {
        let (tx, rx) = flume::bounded::<TaskMessage>(config.queue_capacity);
        let inflight: InflightRegistry = Arc::new(RwLock::new(HashMap::new()));
        let executor = Arc::new(TaskExecutor::new(
            QualityGate::new(config.gate.clone()),
            client,
            config.retry.clone(),
            config.limits.clone(),
            config.result_ttl,
        ));

        for worker in 0..config.worker_count {
            let rx = rx.clone();
            let executor = Arc::clone(&executor);
            let store = store.clone();
            let inflight = Arc::clone(&inflight);
            tokio::spawn(async move {
                Self::worker_loop(worker, rx, executor, store, inflight).await;
            });
        }

        Self {
            tx,
            inflight,
            store,
            capacity: config.queue_capacity,
        }
    }

    async fn worker_loop(
        worker: usize,
        rx: flume::Receiver<TaskMessage>,
        executor: Arc<TaskExecutor>,
        store: ResultStore,
        inflight: InflightRegistry,
    ) {
        while let Ok(msg) = rx.recv_async().await {
            let task_id = msg.task_id;
            inflight.write().await.insert(task_id, TaskState::Running);
            debug!(worker, %task_id, "task picked up");

            let outcome = executor.execute(msg).await;
            let state = if outcome.is_failure() {
                TaskState::Failed
            } else {
                TaskState::Succeeded
            };

            // Write-once: a duplicate delivery of the same task id must not
            // disturb the recorded outcome.
            store.put(outcome).await;
            inflight.write().await.remove(&task_id);
            info!(worker, %task_id, %state, "task reached terminal state");
        }
        debug!(worker, "submission channel closed; worker exiting");
    }

    /// Assign an id, enqueue the task, and return immediately.
    ///
    /// Ownership of the `input_ref` spool file transfers to the pipeline on
    /// success; on error the caller still owns (and should remove) it.
    pub async fn submit(&self, input_ref: PathBuf) -> Result<TaskId, CoreError> {
        let task_id = Uuid::new_v4();
        let msg = TaskMessage {
            task_id,
            input_ref,
            submitted_at: Utc::now(),
        };

        self.inflight.write().await.insert(task_id, TaskState::Queued);
        if let Err(e) = self.tx.try_send(msg) {
            self.inflight.write().await.remove(&task_id);
            return Err(match e {
                flume::TrySendError::Full(_) => CoreError::QueueFull {
                    capacity: self.capacity,
                },
                flume::TrySendError::Disconnected(_) => CoreError::Shutdown,
            });
        }

        info!(%task_id, "task queued");
        Ok(task_id)
    }

    /// Facade over dispatcher state + result store for the polling side.
    pub fn status_facade(&self) -> StatusFacade {
        StatusFacade::new(Arc::clone(&self.inflight), self.store.clone())
    }

    /// Number of accepted, not-yet-terminal tasks.
    pub async fn inflight_count(&self) -> usize {
        self.inflight.read().await.len()
    }
}
