// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::pool::{ThreadPool, ThreadPoolConfig, WorkerPool};

static GLOBAL: LazyLock<Dispatcher> = LazyLock::new(|| Dispatcher::new(ThreadPool::new(ThreadPoolConfig::default())));

/// Submits blocking operations to a [`WorkerPool`] and hands back futures
/// for their results.
///
/// Cloning a `Dispatcher` is cheap; clones share the same pool. Every free
/// function and constructor in this crate uses [`Dispatcher::global`] unless
/// an explicit dispatcher is supplied.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<dyn WorkerPool>,
}

impl Dispatcher {
    /// Creates a dispatcher backed by `pool`.
    pub fn new(pool: impl WorkerPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Creates a dispatcher backed by an already shared pool.
    #[must_use]
    pub fn from_shared(pool: Arc<dyn WorkerPool>) -> Self {
        Self { pool }
    }

    /// Returns the process-wide dispatcher, backed by a lazily started
    /// [`ThreadPool`] with default configuration.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// Dispatches a blocking operation to a worker thread.
    ///
    /// Returns a future that resolves to the operation's return value. The
    /// operation is queued immediately, not on first poll.
    ///
    /// Dropping the future before a worker picks the operation up cancels it.
    /// Once started, the operation always runs to completion; its result is
    /// then dropped on the worker thread.
    ///
    /// If the closure panics, the panic is forwarded to the caller.
    pub fn dispatch<T: Send + 'static>(&self, f: impl FnOnce() -> T + Send + 'static) -> DispatchFuture<T> {
        let (runnable, task) = async_task::spawn(async move { std::panic::catch_unwind(core::panic::AssertUnwindSafe(f)) }, self.schedule());
        runnable.schedule();
        DispatchFuture { task }
    }

    /// Runs `future` on the pool without anyone awaiting it.
    ///
    /// The future is polled on worker threads, so it may call blocking
    /// primitives directly once its awaited preconditions are met.
    pub(crate) fn spawn_detached(&self, future: impl Future<Output = ()> + Send + 'static) {
        let (runnable, task) = async_task::spawn(future, self.schedule());
        task.detach();
        runnable.schedule();
    }

    /// Blocks the calling thread until the pool has no pending work, or until
    /// `timeout` elapses. Returns `true` if the pool was drained.
    ///
    /// Releases triggered by dropping an open facade run in the background.
    /// Call this before process exit to make sure they have finished.
    #[must_use]
    pub fn drain(&self, timeout: Duration) -> bool {
        self.pool.drain(timeout)
    }

    fn schedule(&self) -> impl Fn(async_task::Runnable) + Send + Sync + 'static {
        let pool = Arc::clone(&self.pool);
        move |runnable: async_task::Runnable| {
            pool.submit(Box::new(move || {
                let _ = runnable.run();
            }));
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

/// A future that resolves to the result of a dispatched operation.
///
/// If the worker thread panics, the original panic is re-raised on the
/// calling task via [`std::panic::resume_unwind`].
#[must_use = "dropping a DispatchFuture cancels the operation if it has not started"]
pub struct DispatchFuture<T> {
    task: async_task::Task<std::thread::Result<T>>,
}

impl<T> DispatchFuture<T> {
    /// Lets the operation run to completion without awaiting its result.
    pub fn detach(self) {
        self.task.detach();
    }
}

impl<T> Future for DispatchFuture<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        match Pin::new(&mut this.task).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            Poll::Ready(Err(payload)) => {
                // Re-raise the original panic from the worker thread.
                std::panic::resume_unwind(payload);
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for DispatchFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchFuture").field("finished", &self.task.is_finished()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    fn block_on<F: Future>(future: F) -> F::Output {
        futures::executor::block_on(future)
    }

    #[test]
    fn returns_closure_value() {
        let dispatcher = Dispatcher::new(ThreadPool::new(ThreadPoolConfig::new()));
        assert_eq!(block_on(dispatcher.dispatch(|| 40 + 2)), 42);
    }

    #[test]
    fn runs_off_the_calling_thread() {
        let dispatcher = Dispatcher::new(ThreadPool::new(ThreadPoolConfig::new().thread_name("dispatch-test")));
        let name = block_on(dispatcher.dispatch(|| std::thread::current().name().map(str::to_owned)));
        assert_eq!(name.as_deref(), Some("dispatch-test"));
    }

    #[test]
    fn io_errors_pass_through_unchanged() {
        let dispatcher = Dispatcher::global();
        let result = block_on(dispatcher.dispatch(|| std::fs::metadata("/definitely/not/here/offload_fs")));
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn panics_are_forwarded() {
        let dispatcher = Dispatcher::global();
        let _: u32 = block_on(dispatcher.dispatch(|| -> u32 { panic!("boom") }));
    }

    #[test]
    fn detached_operations_still_run() {
        let dispatcher = Dispatcher::new(ThreadPool::new(ThreadPoolConfig::new()));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        dispatcher.dispatch(move || flag.store(true, Ordering::SeqCst)).detach();
        assert!(dispatcher.drain(Duration::from_secs(5)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn spawn_detached_polls_on_workers() {
        let dispatcher = Dispatcher::new(ThreadPool::new(ThreadPoolConfig::new().thread_name("detached-test")));
        let (tx, rx) = std::sync::mpsc::channel();
        dispatcher.spawn_detached(async move {
            tx.send(std::thread::current().name().map(str::to_owned)).unwrap();
        });
        assert_eq!(rx.recv().unwrap().as_deref(), Some("detached-test"));
    }
}
