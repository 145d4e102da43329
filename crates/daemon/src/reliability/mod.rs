//! Reliability patterns for job execution
//!
//! This module provides:
//! - [`RetryPolicy`] - Configurable retry with exponential backoff
//! - [`with_timeout`] - Per-job deadline enforcement

mod retry;
mod timeout;

pub use retry::RetryPolicy;
pub use timeout::{with_timeout, TimeoutError};
