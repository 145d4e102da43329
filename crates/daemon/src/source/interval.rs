//! Scheduled job source

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::JobSource;
use crate::error::WrappedError;

/// Job source that produces a message every `period`
///
/// The first message is available immediately. Contexts sharing the source
/// reserve consecutive slots, so the whole daemon sees one message per
/// period rather than one per context. Slots missed while every context was
/// busy are skipped, not replayed.
pub struct IntervalSource<T> {
    period: Duration,
    produce: Arc<dyn Fn() -> T + Send + Sync>,
    next_slot: Mutex<Option<Instant>>,
    limit: Option<usize>,
    produced: AtomicUsize,
}

impl<T> IntervalSource<T> {
    pub fn new<F>(period: Duration, produce: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            period,
            produce: Arc::new(produce),
            next_slot: Mutex::new(None),
            limit: None,
            produced: AtomicUsize::new(0),
        }
    }

    /// Stop after `limit` messages
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn reserve_slot(&self) -> Instant {
        let mut next = self.next_slot.lock();
        let now = Instant::now();
        let slot = next.map_or(now, |at| at.max(now));
        *next = Some(slot + self.period);
        slot
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> JobSource for IntervalSource<T> {
    type Message = T;

    async fn receive(&self) -> Result<Option<T>, WrappedError> {
        if let Some(limit) = self.limit {
            let claimed = self.produced.fetch_add(1, Ordering::SeqCst);
            if claimed >= limit {
                return Ok(None);
            }
        }

        tokio::time::sleep_until(self.reserve_slot()).await;
        Ok(Some((self.produce)()))
    }
}
