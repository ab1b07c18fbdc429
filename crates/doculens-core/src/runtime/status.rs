use serde_json::Value;

use crate::runtime::dispatcher::InflightRegistry;
use crate::runtime::store::ResultStore;
use crate::runtime::types::{TaskId, TaskStatusView};

/// Read-only merge of dispatcher state and result store.
///
/// Callers never consult the two systems directly; the facade owns the merge
/// order. The in-flight registry is checked first, which also settles the
/// ambiguous corner where a terminal result expired while the registry still
/// knows the id: that task reads as `Pending` until the dispatcher confirms
/// completion.
#[derive(Clone)]
pub struct StatusFacade {
    inflight: InflightRegistry,
    store: ResultStore,
}

impl StatusFacade {
    pub(crate) fn new(inflight: InflightRegistry, store: ResultStore) -> Self {
        Self { inflight, store }
    }

    /// Resolve a task id to what the polling side may see.
    ///
    /// Idempotent and repeatable: after a terminal outcome is written the
    /// same view is returned on every poll until TTL expiry, after which the
    /// id reads as `NotFound`.
    pub async fn status(&self, task_id: TaskId) -> TaskStatusView {
        if self.inflight.read().await.contains_key(&task_id) {
            return TaskStatusView::Pending;
        }

        match self.store.get(task_id).await {
            Some(outcome) => match outcome.failure {
                Some(failure) => TaskStatusView::Failed(failure),
                None => TaskStatusView::Succeeded(outcome.payload.unwrap_or(Value::Null)),
            },
            None => TaskStatusView::NotFound,
        }
    }
}
