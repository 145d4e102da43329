//! Job sources
//!
//! A job source hands messages to the daemon's execution contexts. Every
//! context calls [`JobSource::receive`] in its own loop, so one source is
//! shared by all of them and must tolerate concurrent calls.
//!
//! Concrete queue or HTTP clients live outside this crate; the adapters here
//! cover the common shapes:
//!
//! - [`ChannelSource`] - messages pushed through a tokio channel
//! - [`PollingSource`] - an async fetch function polled with backoff
//! - [`IntervalSource`] - a message produced on a fixed schedule

mod channel;
mod interval;
mod poller;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WrappedError;

pub use channel::ChannelSource;
pub use interval::IntervalSource;
pub use poller::{PollerConfig, PollingSource};

/// Supplier of messages for the daemon
///
/// `receive` waits until a message is available. `Ok(None)` means the source
/// is exhausted: the calling context exits normally. Errors are routed to the
/// daemon's error hook.
#[async_trait]
pub trait JobSource: Send + Sync + 'static {
    type Message: Send + Sync + 'static;

    async fn receive(&self) -> Result<Option<Self::Message>, WrappedError>;
}

#[async_trait]
impl<S: JobSource> JobSource for Arc<S> {
    type Message = S::Message;

    async fn receive(&self) -> Result<Option<Self::Message>, WrappedError> {
        (**self).receive().await
    }
}
