//! Channel-backed job source

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::JobSource;
use crate::error::WrappedError;

/// Job source fed through a tokio mpsc channel
///
/// Contexts take turns on the receiver. The source is exhausted once every
/// sender is dropped and the buffer is empty.
///
/// # Example
///
/// ```
/// use jobd_daemon::source::{ChannelSource, JobSource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (tx, source) = ChannelSource::channel(8);
/// tx.send("job-1").await.unwrap();
/// drop(tx);
///
/// assert_eq!(source.receive().await.unwrap(), Some("job-1"));
/// assert_eq!(source.receive().await.unwrap(), None);
/// # }
/// ```
pub struct ChannelSource<T> {
    receiver: Mutex<mpsc::Receiver<T>>,
}

impl<T> ChannelSource<T> {
    pub fn new(receiver: mpsc::Receiver<T>) -> Self {
        Self {
            receiver: Mutex::new(receiver),
        }
    }

    /// Create a bounded channel and the source reading from it
    pub fn channel(buffer: usize) -> (mpsc::Sender<T>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> JobSource for ChannelSource<T> {
    type Message = T;

    async fn receive(&self) -> Result<Option<T>, WrappedError> {
        Ok(self.receiver.lock().await.recv().await)
    }
}
