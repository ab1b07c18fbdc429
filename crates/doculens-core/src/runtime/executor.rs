//! Per-task execution pipeline.
//!
//! One executor run drives a single task to its terminal outcome:
//! quality gate, then the external analysis call, inside a retry envelope.
//! Each attempt maps to `Success`, `Retryable`, or `Fatal`; retryable
//! failures loop up to the attempt cap with a fixed delay, fatal ones
//! terminate immediately. The spool file named by `input_ref` is deleted
//! exactly once on every exit path, including a hard-limit abort.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::analysis::{AnalysisClient, AnalysisError};
use crate::config::{RetryPolicy, TimeLimits};
use crate::quality::{GateError, QualityGate};
use crate::runtime::types::{CoreError, TaskMessage, TaskOutcome};

/// Outcome of a single attempt, as seen by the retry envelope.
enum AttemptOutcome {
    Success(serde_json::Value),
    Retryable(CoreError),
    Fatal(CoreError),
}

/// Deletes the task's spool file when dropped.
///
/// Living on the executor's stack, the guard fires on every exit path: the
/// happy path, gate rejections, exhausted retries, and cancellation of the
/// enclosing future at an await point.
struct SpoolGuard {
    path: PathBuf,
}

impl Drop for SpoolGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove spool file");
            }
        }
    }
}

/// Drives one task per call; shared by all pool workers.
pub struct TaskExecutor {
    gate: QualityGate,
    client: Arc<dyn AnalysisClient>,
    retry: RetryPolicy,
    limits: TimeLimits,
    result_ttl: Duration,
}

impl TaskExecutor {
    pub fn new(
        gate: QualityGate,
        client: Arc<dyn AnalysisClient>,
        retry: RetryPolicy,
        limits: TimeLimits,
        result_ttl: Duration,
    ) -> Self {
        Self {
            gate,
            client,
            retry,
            limits,
            result_ttl,
        }
    }

    /// Run the task to a terminal outcome. Infallible by design: every
    /// failure mode folds into the returned [`TaskOutcome`].
    pub async fn execute(&self, msg: TaskMessage) -> TaskOutcome {
        let task_id = msg.task_id;
        let _spool = SpoolGuard {
            path: msg.input_ref.clone(),
        };

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            debug!(%task_id, attempt = attempts, "starting attempt");

            match self.run_attempt(&msg).await {
                AttemptOutcome::Success(payload) => {
                    info!(%task_id, attempts, "task succeeded");
                    return TaskOutcome::succeeded(task_id, payload, attempts, self.result_ttl);
                }
                AttemptOutcome::Fatal(error) => {
                    info!(%task_id, attempts, %error, "task failed terminally");
                    return TaskOutcome::failed(task_id, &error, attempts, self.result_ttl);
                }
                AttemptOutcome::Retryable(error) => {
                    if attempts >= self.retry.max_attempts {
                        let exhausted = CoreError::RetriesExhausted { attempts };
                        warn!(%task_id, attempts, last_error = %error, "retry budget exhausted");
                        return TaskOutcome::failed(task_id, &exhausted, attempts, self.result_ttl);
                    }
                    warn!(%task_id, attempt = attempts, %error, "attempt failed; retrying");
                    tokio::time::sleep(self.retry.retry_delay).await;
                }
            }
        }
    }

    /// One attempt under the hard wall-clock limit. A hard expiry aborts the
    /// attempt future outright and counts against the retry budget like any
    /// other timeout.
    async fn run_attempt(&self, msg: &TaskMessage) -> AttemptOutcome {
        match tokio::time::timeout(self.limits.hard, self.attempt_inner(msg)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(task_id = %msg.task_id, "attempt hit the hard time limit; killed");
                AttemptOutcome::Retryable(CoreError::AttemptTimeout)
            }
        }
    }

    async fn attempt_inner(&self, msg: &TaskMessage) -> AttemptOutcome {
        let raw = match tokio::fs::read(&msg.input_ref).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return AttemptOutcome::Fatal(CoreError::UnreadableImage(format!(
                    "spool read failed: {e}"
                )));
            }
        };

        // The gate is CPU-bound; run it on the blocking pool so a large image
        // never stalls the worker's reactor.
        let gate = self.gate.clone();
        let corrected = match tokio::task::spawn_blocking(move || gate.gate(&raw)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(GateError::Rejected(reason))) => {
                return AttemptOutcome::Fatal(CoreError::InputRejected(reason));
            }
            Ok(Err(GateError::Unreadable(message))) => {
                return AttemptOutcome::Fatal(CoreError::UnreadableImage(message));
            }
            Err(join_error) => {
                return AttemptOutcome::Fatal(CoreError::Internal(format!(
                    "quality gate panicked: {join_error}"
                )));
            }
        };

        // Soft limit: give the attempt a chance to fail gracefully before the
        // hard limit kills it.
        match tokio::time::timeout(self.limits.soft, self.client.analyze(&corrected)).await {
            Ok(Ok(payload)) => AttemptOutcome::Success(payload),
            Ok(Err(AnalysisError::Transport(message))) => {
                warn!(task_id = %msg.task_id, %message, "analysis transport failure");
                AttemptOutcome::Retryable(CoreError::Transport(message))
            }
            Ok(Err(AnalysisError::Malformed(message))) => {
                // Logged apart from transport noise: a malformed reply points
                // at the prompt or the model, not the network.
                warn!(task_id = %msg.task_id, %message, "analysis returned malformed content");
                AttemptOutcome::Retryable(CoreError::Malformed(message))
            }
            Err(_) => {
                warn!(task_id = %msg.task_id, "analysis call hit the soft time limit");
                AttemptOutcome::Retryable(CoreError::AttemptTimeout)
            }
        }
    }
}
