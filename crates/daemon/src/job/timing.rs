//! Timing records

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Wall-clock duration of one job, handed to the `complete` hook
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Timing {
    /// When the worker was constructed
    pub started_at: DateTime<Utc>,

    /// Time from worker construction to the mapped output
    pub elapsed: Duration,
}

impl Timing {
    /// Start measuring
    pub fn start() -> Stopwatch {
        Stopwatch {
            started_at: Utc::now(),
            instant: Instant::now(),
        }
    }

    /// Elapsed seconds as a float
    pub fn real(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

/// A running measurement; [`Stopwatch::stop`] turns it into a [`Timing`]
#[derive(Debug)]
pub struct Stopwatch {
    started_at: DateTime<Utc>,
    instant: Instant,
}

impl Stopwatch {
    pub fn stop(self) -> Timing {
        Timing {
            started_at: self.started_at,
            elapsed: self.instant.elapsed(),
        }
    }
}
