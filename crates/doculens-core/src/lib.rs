//! doculens-core – asynchronous document-analysis pipeline.
//!
//! Decouples a slow, failure-prone vision-analysis call from the
//! request/response path by routing work through a durable in-process task
//! queue:
//!
//! 1. A caller submits raw image bytes; the [`Dispatcher`] assigns a
//!    [`TaskId`], enqueues the task, and returns immediately.
//! 2. A pool worker pulls the task and drives the two-stage executor:
//!    deterministic [`quality`] gate, then the external [`analysis`] call,
//!    wrapped in a retry envelope with soft/hard time limits.
//! 3. The terminal outcome lands in the TTL-bounded [`ResultStore`]; callers
//!    poll the [`StatusFacade`] until a terminal state appears.
//!
//! All tunables live in [`CoreConfig`], constructed once at startup and
//! injected into each component.

pub mod analysis;
pub mod config;
pub mod quality;
pub mod runtime;

pub use config::{CoreConfig, GateConfig, RetryPolicy, TimeLimits};
pub use runtime::dispatcher::Dispatcher;
pub use runtime::status::StatusFacade;
pub use runtime::store::ResultStore;
pub use runtime::types::{
    CoreError, RejectReason, TaskFailure, TaskId, TaskOutcome, TaskState, TaskStatusView,
};
