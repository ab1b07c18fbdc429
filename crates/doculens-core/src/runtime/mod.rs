//! Task runtime: dispatcher, worker pool, per-task executor, result store,
//! and the status facade the polling side reads.

pub mod dispatcher;
pub mod executor;
pub mod status;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
