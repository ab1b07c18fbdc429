use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::runtime::types::{TaskId, TaskOutcome};

/// TTL-bounded store for terminal task outcomes.
///
/// Uses a `tokio::sync::RwLock<HashMap>` so many pollers can read status
/// concurrently while pool workers write terminal results. Writes are
/// first-write-wins: the broker delivers at-least-once, so a duplicate
/// execution of the same task id must not overwrite the recorded outcome.
#[derive(Debug, Clone)]
pub struct ResultStore {
    inner: Arc<RwLock<HashMap<TaskId, TaskOutcome>>>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a terminal outcome. Returns `false` (and keeps the original)
    /// if one already exists for this task id.
    pub async fn put(&self, outcome: TaskOutcome) -> bool {
        let mut guard = self.inner.write().await;
        match guard.entry(outcome.task_id) {
            std::collections::hash_map::Entry::Occupied(_) => {
                warn!(task_id = %outcome.task_id, "duplicate terminal write ignored");
                false
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(outcome);
                true
            }
        }
    }

    /// Look up the terminal outcome for a task.
    ///
    /// Entries past their `expires_at` are removed on the way out, so an
    /// expired result is indistinguishable from one that never existed.
    pub async fn get(&self, task_id: TaskId) -> Option<TaskOutcome> {
        let now = Utc::now();
        {
            let guard = self.inner.read().await;
            match guard.get(&task_id) {
                Some(outcome) if !outcome.is_expired(now) => return Some(outcome.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: upgrade to a write lock and reap it.
        self.inner.write().await.remove(&task_id);
        None
    }

    /// Remove all expired entries; returns how many were reaped.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, outcome| !outcome.is_expired(now));
        before - guard.len()
    }

    /// Spawn the background expiry sweep loop.
    ///
    /// Lazy expiry on [`get`](Self::get) already hides stale entries from
    /// readers; the sweeper exists so unpolled results do not accumulate.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let reaped = store.sweep().await;
                if reaped > 0 {
                    debug!(reaped, "swept expired results");
                }
            }
        })
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
