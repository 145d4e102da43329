//! Worker contract

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::JobError;

/// A unit of work
///
/// A worker is built from one mapped input by a [`WorkerFactory`], runs
/// once, and is dropped. It owns its input, so `process` takes no
/// arguments.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use jobd_daemon::{JobError, Worker};
/// use serde_json::{json, Value};
///
/// struct Doubler {
///     number: i64,
/// }
///
/// #[async_trait]
/// impl Worker for Doubler {
///     type Output = i64;
///
///     async fn process(&mut self) -> Result<i64, JobError> {
///         Ok(self.number * 2)
///     }
///
///     fn extra_error_data(&self) -> Option<Value> {
///         Some(json!(self.number))
///     }
/// }
/// ```
#[async_trait]
pub trait Worker: Send + 'static {
    /// Result handed to `Mapper::map_output`
    type Output: Send + 'static;

    /// Run the job
    ///
    /// Runs on a task of its own, so timeouts and `stop` release the
    /// context at once. Work that blocks without awaiting still holds a
    /// runtime thread until it returns; prefer `spawn_blocking` for it.
    async fn process(&mut self) -> Result<Self::Output, JobError> {
        Err(JobError::NotImplemented)
    }

    /// Diagnostic context passed to the error hook when this worker fails
    fn extra_error_data(&self) -> Option<Value> {
        None
    }
}

/// Builds a worker from a mapped input
pub type WorkerFactory<I, W> = Arc<dyn Fn(I) -> W + Send + Sync>;
