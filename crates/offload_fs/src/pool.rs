// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Instant;

use tracing::{Level, event};

/// A unit of blocking work submitted to a [`WorkerPool`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A set of threads that executes blocking jobs on behalf of async code.
///
/// This is the seam between the facades and the thread model. The crate ships
/// [`ThreadPool`]; any other backend can be plugged into a
/// [`Dispatcher`](crate::Dispatcher) by implementing this trait.
///
/// Implementations must run every submitted job exactly once, on a thread
/// other than the one driving the async scheduler. Jobs have no affinity:
/// any idle thread may run any job.
pub trait WorkerPool: Send + Sync + 'static {
    /// Queues `job` for execution.
    fn submit(&self, job: Job);

    /// Blocks the calling thread until no submitted job is pending, or until
    /// `timeout` elapses.
    ///
    /// Returns `true` if the pool was drained. Call this from synchronous
    /// shutdown code, never from inside an async task.
    fn drain(&self, timeout: Duration) -> bool;
}

/// Tunables for a [`ThreadPool`].
#[derive(Clone, Debug)]
pub struct ThreadPoolConfig {
    max_threads: usize,
    idle_timeout: Duration,
    thread_name: String,
}

impl ThreadPoolConfig {
    /// Default time an idle worker waits for work before it retires.
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration with default values.
    ///
    /// The thread limit defaults to the number of available processors plus
    /// four, capped at 32.
    #[must_use]
    pub fn new() -> Self {
        let cpus = std::thread::available_parallelism().map_or(1, core::num::NonZero::get);
        Self {
            max_threads: (cpus + 4).min(32),
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            thread_name: "offload-worker".to_owned(),
        }
    }

    /// Sets the maximum number of worker threads. Values below one are
    /// treated as one.
    #[must_use]
    pub const fn max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = if max_threads == 0 { 1 } else { max_threads };
        self
    }

    /// Sets how long an idle worker waits before retiring.
    #[must_use]
    pub const fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Sets the name given to worker threads.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct PoolInner {
    sender: flume::Sender<Job>,
    receiver: flume::Receiver<Job>,
    thread_count: AtomicUsize,
    pending_count: AtomicUsize,
    idle: Mutex<()>,
    idle_signal: Condvar,
    config: ThreadPoolConfig,
}

/// The default [`WorkerPool`]: a self-scaling set of OS threads.
///
/// Starts without threads and spawns one whenever the pending-job count
/// reaches the current thread count, up to
/// [`max_threads`](ThreadPoolConfig::max_threads). Idle workers retire after
/// [`idle_timeout`](ThreadPoolConfig::idle_timeout), but the last one keeps
/// running.
#[derive(Clone)]
pub struct ThreadPool {
    inner: Arc<PoolInner>,
}

impl ThreadPool {
    /// Creates a pool with the given configuration. No thread is started until
    /// the first job arrives.
    #[must_use]
    pub fn new(config: ThreadPoolConfig) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            inner: Arc::new(PoolInner {
                sender,
                receiver,
                thread_count: AtomicUsize::new(0),
                pending_count: AtomicUsize::new(0),
                idle: Mutex::new(()),
                idle_signal: Condvar::new(),
                config,
            }),
        }
    }

    /// Returns the number of live worker threads.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.inner.thread_count.load(Ordering::Acquire)
    }

    /// Returns the number of jobs submitted but not yet finished.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count.load(Ordering::Acquire)
    }

    /// Spawns a worker thread, assuming the caller already incremented the count.
    fn spawn_worker_already_counted(inner: &Arc<PoolInner>) {
        let worker_inner = Arc::clone(inner);
        let spawned = std::thread::Builder::new()
            .name(inner.config.thread_name.clone())
            .spawn(move || Self::worker_loop(&worker_inner));

        match spawned {
            Ok(_) => event!(Level::DEBUG, message = "worker started", threads = inner.thread_count.load(Ordering::Relaxed)),
            Err(error) => {
                // Queued jobs stay queued; the next submission retries the spawn.
                let _ = inner.thread_count.fetch_sub(1, Ordering::AcqRel);
                event!(Level::ERROR, message = "failed to spawn worker thread", %error);
            }
        }
    }

    fn worker_loop(inner: &PoolInner) {
        loop {
            match inner.receiver.recv_timeout(inner.config.idle_timeout) {
                Ok(job) => {
                    job();
                    if inner.pending_count.fetch_sub(1, Ordering::AcqRel) == 1 {
                        let _guard = inner.idle.lock().unwrap_or_else(PoisonError::into_inner);
                        inner.idle_signal.notify_all();
                    }
                }
                Err(flume::RecvTimeoutError::Timeout) => {
                    // Scale down: CAS ensures at least one worker remains.
                    let mut count = inner.thread_count.load(Ordering::Relaxed);
                    while count > 1 {
                        match inner
                            .thread_count
                            .compare_exchange_weak(count, count - 1, Ordering::AcqRel, Ordering::Relaxed)
                        {
                            Ok(_) => {
                                event!(Level::DEBUG, message = "idle worker retired", threads = count - 1);
                                return;
                            }
                            Err(actual) => count = actual,
                        }
                    }
                }
                Err(flume::RecvTimeoutError::Disconnected) => {
                    let _ = inner.thread_count.fetch_sub(1, Ordering::AcqRel);
                    return;
                }
            }
        }
    }
}

impl WorkerPool for ThreadPool {
    fn submit(&self, job: Job) {
        let prev_pending = self.inner.pending_count.fetch_add(1, Ordering::AcqRel);
        let threads = self.inner.thread_count.load(Ordering::Acquire);

        // Scale up if the queue is backing up and we haven't hit the limit.
        if prev_pending >= threads
            && threads < self.inner.config.max_threads
            && self
                .inner
                .thread_count
                .compare_exchange(threads, threads + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            Self::spawn_worker_already_counted(&self.inner);
        }

        // The pool owns the receiver, so the channel cannot be disconnected here.
        let _ = self.inner.sender.send(job);
    }

    fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.idle.lock().unwrap_or_else(PoisonError::into_inner);
        while self.inner.pending_count.load(Ordering::Acquire) > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            guard = self
                .inner
                .idle_signal
                .wait_timeout(guard, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("threads", &self.inner.thread_count.load(Ordering::Relaxed))
            .field("pending", &self.inner.pending_count.load(Ordering::Relaxed))
            .field("max_threads", &self.inner.config.max_threads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn runs_submitted_jobs() {
        let pool = ThreadPool::new(ThreadPoolConfig::new().max_threads(2));
        let (tx, rx) = mpsc::channel();
        for i in 0..8 {
            let tx = tx.clone();
            pool.submit(Box::new(move || tx.send(i).unwrap()));
        }
        let mut seen: Vec<i32> = (0..8).map(|_| rx.recv().unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn never_exceeds_thread_limit() {
        let pool = ThreadPool::new(ThreadPoolConfig::new().max_threads(3));
        let (release_tx, release_rx) = flume::unbounded::<()>();
        for _ in 0..10 {
            let release_rx = release_rx.clone();
            pool.submit(Box::new(move || {
                let _ = release_rx.recv();
            }));
        }
        assert!(pool.thread_count() <= 3);
        for _ in 0..10 {
            release_tx.send(()).unwrap();
        }
        assert!(pool.drain(Duration::from_secs(5)));
    }

    #[test]
    fn drain_waits_for_pending_jobs() {
        let pool = ThreadPool::new(ThreadPoolConfig::new());
        let (tx, rx) = mpsc::channel();
        pool.submit(Box::new(move || {
            std::thread::sleep(Duration::from_millis(50));
            tx.send(()).unwrap();
        }));
        assert!(pool.drain(Duration::from_secs(5)));
        assert_eq!(pool.pending_count(), 0);
        rx.try_recv().unwrap();
    }

    #[test]
    fn drain_times_out_on_stuck_job() {
        let pool = ThreadPool::new(ThreadPoolConfig::new());
        let (release_tx, release_rx) = mpsc::channel::<()>();
        pool.submit(Box::new(move || {
            let _ = release_rx.recv();
        }));
        assert!(!pool.drain(Duration::from_millis(20)));
        release_tx.send(()).unwrap();
        assert!(pool.drain(Duration::from_secs(5)));
    }

    #[test]
    fn idle_workers_retire_down_to_one() {
        let pool = ThreadPool::new(ThreadPoolConfig::new().max_threads(4).idle_timeout(Duration::from_millis(10)));
        let (release_tx, release_rx) = flume::unbounded::<()>();
        for _ in 0..4 {
            let release_rx = release_rx.clone();
            pool.submit(Box::new(move || {
                let _ = release_rx.recv();
            }));
        }
        for _ in 0..4 {
            release_tx.send(()).unwrap();
        }
        assert!(pool.drain(Duration::from_secs(5)));

        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.thread_count() > 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pool.thread_count(), 1);
    }
}
