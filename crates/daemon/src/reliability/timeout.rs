//! Per-job timeout enforcement
//!
//! A deadline only aborts the future it wraps; the execution context that
//! awaits it is released at the deadline and keeps running. The daemon wraps
//! each worker's task handle, so a worker stuck in synchronous code is
//! abandoned on time as well.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;

/// A job ran past its deadline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job execution timed out (ran for {elapsed:?}, limit {limit:?})")]
pub struct TimeoutError {
    pub limit: Duration,
    pub elapsed: Duration,
}

impl TimeoutError {
    pub fn new(limit: Duration, elapsed: Duration) -> Self {
        Self { limit, elapsed }
    }
}

/// Await `future`, giving up after `limit`
///
/// `None` means unbounded. When the deadline passes the future is dropped
/// at its current await point; work it was doing synchronously is not
/// interrupted.
pub async fn with_timeout<F>(limit: Option<Duration>, future: F) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    let Some(limit) = limit else {
        return Ok(future.await);
    };

    let started = Instant::now();
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| TimeoutError::new(limit, started.elapsed()))
}
