use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a submitted task.
///
/// Generated at submission time (v4) and never reused; the sole handle shared
/// between submitter and worker.
pub type TaskId = Uuid;

/// Lifecycle state of a task.
///
/// `Queued` and `Running` are transient and live only in the dispatcher's
/// in-flight registry; the terminal states are persisted as a [`TaskOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted and enqueued, not yet picked up by a worker.
    Queued,
    /// A pool worker is executing the task.
    Running,
    /// Terminal: analysis payload available.
    Succeeded,
    /// Terminal: structured failure available.
    Failed,
}

impl TaskState {
    /// Returns `true` once no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Why the quality gate refused an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    /// Laplacian variance below the sharpness threshold.
    Blur,
    /// Too many near-saturated pixels.
    Glare,
    /// Mean luminance below the darkness threshold.
    Dark,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blur => "blur",
            Self::Glare => "glare",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit queued between submission and a pool worker.
#[derive(Debug, Clone)]
pub struct TaskMessage {
    pub task_id: TaskId,
    /// Spool file holding the uploaded image. Owned exclusively by the
    /// executing attempt and deleted exactly once when the executor returns.
    pub input_ref: PathBuf,
    pub submitted_at: DateTime<Utc>,
}

/// Structured failure persisted for a failed task.
///
/// `status_code` encodes the failure class for the facade: 422 for
/// invalid-input rejections, 500 for unrecoverable execution failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub message: String,
    pub status_code: u16,
}

/// Immutable terminal record of a task, held by the result store until
/// `expires_at`.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    /// Structured extraction on success; `None` when `failure` is set.
    pub payload: Option<serde_json::Value>,
    pub failure: Option<TaskFailure>,
    /// Attempts consumed before reaching the terminal state.
    pub attempts: u32,
    pub expires_at: DateTime<Utc>,
}

impl TaskOutcome {
    pub fn succeeded(
        task_id: TaskId,
        payload: serde_json::Value,
        attempts: u32,
        ttl: Duration,
    ) -> Self {
        Self {
            task_id,
            payload: Some(payload),
            failure: None,
            attempts,
            expires_at: expiry(ttl),
        }
    }

    pub fn failed(task_id: TaskId, error: &CoreError, attempts: u32, ttl: Duration) -> Self {
        Self {
            task_id,
            payload: None,
            failure: Some(TaskFailure {
                message: error.to_string(),
                status_code: error.status_code(),
            }),
            attempts,
            expires_at: expiry(ttl),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

fn expiry(ttl: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
}

/// What the polling side sees for a task id.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatusView {
    /// Known to the dispatcher, not yet terminal.
    Pending,
    Succeeded(serde_json::Value),
    Failed(TaskFailure),
    /// Never issued, or terminal result already expired.
    NotFound,
}

/// Errors produced by the task pipeline.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// The quality gate refused the image; a property of the input, never
    /// retried.
    #[error("{0}")]
    InputRejected(RejectReason),

    /// The uploaded bytes are not a decodable image. Deterministic, so fatal
    /// on the first attempt.
    #[error("unreadable image: {0}")]
    UnreadableImage(String),

    /// Network-level failure talking to the analysis service.
    #[error("analysis transport failure: {0}")]
    Transport(String),

    /// The analysis service answered, but not with parseable JSON.
    #[error("malformed analysis response: {0}")]
    Malformed(String),

    /// An attempt exceeded its wall-clock limit.
    #[error("analysis attempt timed out")]
    AttemptTimeout,

    /// The retry budget is spent.
    #[error("image analysis failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The referenced task was never issued or has expired.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The bounded submission queue is at capacity.
    #[error("submission queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The worker pool has shut down.
    #[error("dispatcher shut down")]
    Shutdown,

    /// Unexpected executor-side failure (e.g. a panicked gate computation).
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the retry envelope may re-run the attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Malformed(_) | Self::AttemptTimeout
        )
    }

    /// HTTP-equivalent class of the failure, persisted with the outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InputRejected(_) | Self::UnreadableImage(_) => 422,
            Self::TaskNotFound(_) => 404,
            _ => 500,
        }
    }
}
