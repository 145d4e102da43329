//! # Job Daemon Engine
//!
//! A long-running daemon that pulls messages from a job source and runs each
//! one through a mapper and a worker, across a fixed set of concurrent
//! execution contexts.
//!
//! ## Features
//!
//! - **Pipeline**: receive -> map input -> work -> map output -> complete
//! - **Bounded concurrency**: exactly `threads` contexts, or the caller's own task when 0
//! - **Per-job timeouts**: a stuck worker releases its context at the deadline
//! - **Retry and error policy**: retries with backoff, then a caller-defined error hook
//! - **Hard stop**: `stop` (or SIGINT/SIGTERM) abandons in-flight jobs immediately
//! - **Thread pool**: a standalone fixed-size FIFO pool for scheduled closures
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         JobSource                            │
//! │  (channel, polling or interval adapter; your queue client)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ receive
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Daemon                              │
//! │  (N contexts: Mapper -> Worker -> Mapper -> complete hook)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ failures
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                RetryPolicy, then error hook                  │
//! │  (Ok = keep receiving, Err = terminate the context)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use jobd_daemon::prelude::*;
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//!
//! struct NumberMapper;
//!
//! impl Mapper for NumberMapper {
//!     type Message = Value;
//!     type Input = i64;
//!     type Result = i64;
//!     type Output = Value;
//!
//!     fn map_input(&self, message: &Value) -> Result<i64, WrappedError> {
//!         message["number"]
//!             .as_i64()
//!             .ok_or_else(|| WrappedError::new("number missing"))
//!     }
//!
//!     fn map_output(&self, result: i64) -> Result<Value, WrappedError> {
//!         Ok(json!({"new_number": result}))
//!     }
//! }
//!
//! struct Doubler(i64);
//!
//! #[async_trait]
//! impl Worker for Doubler {
//!     type Output = i64;
//!
//!     async fn process(&mut self) -> Result<i64, JobError> {
//!         Ok(self.0 * 2)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DaemonError> {
//!     let (tx, source) = ChannelSource::channel(64);
//!     tx.send(json!({"number": 10})).await.ok();
//!
//!     let daemon = Daemon::builder()
//!         .config(DaemonConfig::from_env().with_signal_handling(true))
//!         .source(source)
//!         .mapper(|_| Ok(NumberMapper))
//!         .worker(Doubler)
//!         .on_complete(|message, output, timing| {
//!             println!("{message} -> {output} ({} ms)", timing.elapsed_ms());
//!         })
//!         .on_error(|error, extra| {
//!             eprintln!("job failed: {error} {extra:?}");
//!             Ok(())
//!         })
//!         .build()?;
//!
//!     daemon.start().await
//! }
//! ```

pub mod config;
pub mod daemon;
pub mod error;
pub mod job;
pub mod pool;
pub mod reliability;
pub mod source;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{Configurable, DaemonConfig, Options};
    pub use crate::daemon::{Daemon, DaemonBuilder, DaemonHooks, DaemonStatus, JobFailure};
    pub use crate::error::{ConfigurationError, DaemonError, JobError, WrappedError};
    pub use crate::job::{IdentityMapper, Mapper, Timing, Worker};
    pub use crate::reliability::RetryPolicy;
    pub use crate::source::{ChannelSource, IntervalSource, JobSource, PollingSource};
}

// Re-export key types at crate root
pub use config::{Arguments, Configurable, DaemonConfig, Options};
pub use daemon::{Daemon, DaemonBuilder, DaemonHooks, DaemonStatus, JobFailure};
pub use error::{BoxError, ConfigurationError, DaemonError, JobError, JobErrorKind, WrappedError};
pub use job::{IdentityMapper, Mapper, MapperFactory, Timing, Worker, WorkerFactory};
pub use pool::{SchedulingError, ThreadPool};
pub use reliability::{RetryPolicy, TimeoutError};
pub use source::{ChannelSource, IntervalSource, JobSource, PollerConfig, PollingSource};
