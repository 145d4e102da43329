//! Fixed-size thread pool for scheduled closures
//!
//! ```text
//! schedule(f) ──► ┌──────────────────────────────┐
//!                 │  FIFO queue (Mutex+Condvar)   │
//!                 └──────────────────────────────┘
//!                    │          │           │
//!                    ▼          ▼           ▼
//!               [thread 0] [thread 1] ... [thread N-1]
//! ```
//!
//! Threads take the next closure from the shared queue until they dequeue a
//! terminate sentinel. There is no thread affinity.

mod thread_pool;

pub use thread_pool::{Job, SchedulingError, ThreadPool, DEFAULT_POOL_SIZE};
