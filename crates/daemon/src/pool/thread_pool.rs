//! Thread pool implementation

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

/// Default number of threads
pub const DEFAULT_POOL_SIZE: usize = 10;

/// A scheduled closure
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors from scheduling work
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    /// Nothing to run was given
    #[error("you must specify a job to schedule")]
    EmptyJob,

    /// `start` was called on a running pool
    #[error("thread pool is already running")]
    AlreadyStarted,

    /// The OS refused to spawn a thread
    #[error("failed to spawn pool thread: {0}")]
    Spawn(#[source] std::io::Error),
}

enum Message {
    Run(Job),
    Terminate,
}

struct Queue {
    items: Mutex<VecDeque<Message>>,
    available: Condvar,
}

impl Queue {
    fn push(&self, message: Message) {
        self.items.lock().push_back(message);
        self.available.notify_one();
    }

    fn pop(&self) -> Message {
        let mut items = self.items.lock();
        loop {
            if let Some(message) = items.pop_front() {
                return message;
            }
            self.available.wait(&mut items);
        }
    }
}

/// Fixed-size FIFO thread pool
///
/// A panic inside a scheduled closure kills the thread that ran it; the pool
/// does not replace dead threads.
///
/// # Example
///
/// ```
/// use jobd_daemon::ThreadPool;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let counter = Arc::new(AtomicUsize::new(0));
/// let mut pool = ThreadPool::new(2);
/// pool.start().unwrap();
///
/// for _ in 0..2 {
///     let counter = Arc::clone(&counter);
///     pool.schedule(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     });
/// }
///
/// pool.stop();
/// assert_eq!(counter.load(Ordering::SeqCst), 2);
/// ```
pub struct ThreadPool {
    size: usize,
    queue: Arc<Queue>,
    threads: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Create a stopped pool of `size` threads
    pub fn new(size: usize) -> Self {
        Self {
            size,
            queue: Arc::new(Queue {
                items: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
            }),
            threads: Vec::new(),
        }
    }

    /// Spawn exactly `size` threads
    pub fn start(&mut self) -> Result<(), SchedulingError> {
        if !self.threads.is_empty() {
            return Err(SchedulingError::AlreadyStarted);
        }

        info!(size = self.size, "Starting thread pool");

        for index in 0..self.size {
            match self.spawn_thread(index) {
                Ok(handle) => self.threads.push(handle),
                Err(e) => {
                    self.stop();
                    return Err(SchedulingError::Spawn(e));
                }
            }
        }

        Ok(())
    }

    /// Queue a closure for any free thread
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Message::Run(Box::new(job)));
    }

    /// Queue an optional boxed job, rejecting `None`
    pub fn schedule_job(&self, job: Option<Job>) -> Result<(), SchedulingError> {
        let job = job.ok_or(SchedulingError::EmptyJob)?;
        self.queue.push(Message::Run(job));
        Ok(())
    }

    /// Terminate every thread and drop queued work
    ///
    /// Enqueues one terminate sentinel per thread, so work queued before the
    /// call still runs; blocks until all threads have exited.
    pub fn stop(&mut self) {
        if self.threads.is_empty() {
            return;
        }

        debug!(threads = self.threads.len(), "Stopping thread pool");

        for _ in 0..self.threads.len() {
            self.queue.push(Message::Terminate);
        }

        for (index, handle) in self.threads.drain(..).enumerate() {
            if handle.join().is_err() {
                warn!(thread = index, "Pool thread exited with a panic");
            }
        }

        let dropped = {
            let mut items = self.queue.items.lock();
            let dropped = items
                .iter()
                .filter(|m| matches!(m, Message::Run(_)))
                .count();
            items.clear();
            dropped
        };

        info!(dropped, "Thread pool stopped");
    }

    /// Configured number of threads
    pub fn size(&self) -> usize {
        self.size
    }

    /// Threads that have been spawned and have not exited
    pub fn live_threads(&self) -> usize {
        self.threads.iter().filter(|h| !h.is_finished()).count()
    }

    /// Jobs (and sentinels) waiting in the queue
    pub fn queued(&self) -> usize {
        self.queue.items.lock().len()
    }

    pub fn is_running(&self) -> bool {
        !self.threads.is_empty()
    }

    fn spawn_thread(&self, index: usize) -> std::io::Result<JoinHandle<()>> {
        let queue = Arc::clone(&self.queue);

        thread::Builder::new()
            .name(format!("jobd-pool-{index}"))
            .spawn(move || loop {
                match queue.pop() {
                    Message::Run(job) => job(),
                    Message::Terminate => {
                        debug!(thread = index, "Pool thread terminating");
                        break;
                    }
                }
            })
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_start_and_stop() {
        let mut pool = ThreadPool::new(2);

        pool.start().unwrap();
        assert_eq!(pool.live_threads(), 2);
        assert!(pool.is_running());

        pool.stop();
        assert_eq!(pool.live_threads(), 0);
        assert_eq!(pool.queued(), 0);
        assert!(!pool.is_running());
    }

    #[test]
    fn test_start_twice() {
        let mut pool = ThreadPool::new(1);
        pool.start().unwrap();

        assert!(matches!(pool.start(), Err(SchedulingError::AlreadyStarted)));
        pool.stop();
    }

    #[test]
    fn test_schedule_runs_each_job_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = ThreadPool::new(2);
        pool.start().unwrap();

        for _ in 0..2 {
            let counter = Arc::clone(&counter);
            pool.schedule(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_schedule_empty_job() {
        let mut pool = ThreadPool::new(1);
        pool.start().unwrap();

        assert!(matches!(
            pool.schedule_job(None),
            Err(SchedulingError::EmptyJob)
        ));
        assert!(pool.schedule_job(Some(Box::new(|| {}))).is_ok());

        pool.stop();
    }

    #[test]
    fn test_fifo_on_single_thread() {
        let (tx, rx) = mpsc::channel();
        let mut pool = ThreadPool::new(1);
        pool.start().unwrap();

        for i in 0..5 {
            let tx = tx.clone();
            pool.schedule(move || tx.send(i).unwrap());
        }

        pool.stop();
        let order: Vec<_> = rx.try_iter().collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_stop_drops_work_queued_behind_sentinels() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut pool = ThreadPool::new(1);
        pool.start().unwrap();

        pool.schedule(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().ok();
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // Queued after the sentinel: must never run
        let queue = Arc::clone(&pool.queue);
        queue.push(Message::Terminate);
        let late = Arc::clone(&counter);
        pool.schedule(move || {
            late.fetch_add(1, Ordering::SeqCst);
        });

        release_tx.send(()).unwrap();
        pool.stop();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn test_panicking_job_kills_only_its_thread() {
        let mut pool = ThreadPool::new(2);
        pool.start().unwrap();

        pool.schedule(|| panic!("job failed"));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while pool.live_threads() == 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.live_threads(), 1);

        let counter = Arc::new(AtomicUsize::new(0));
        let done = Arc::clone(&counter);
        pool.schedule(move || {
            done.fetch_add(1, Ordering::SeqCst);
        });

        pool.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_stops_pool() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut pool = ThreadPool::new(2);
            pool.start().unwrap();
            let counter = Arc::clone(&counter);
            pool.schedule(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
