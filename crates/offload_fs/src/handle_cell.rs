// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared implementation for every facade.
//!
//! A [`HandleCell`] owns one blocking handle and is the only path through
//! which a facade touches it. Each operation first acquires an owned guard on
//! the handle slot (asynchronously, on the caller's task) and then moves that
//! guard into the dispatched closure. The guard is released on the worker
//! thread when the closure finishes, so:
//!
//! * at most one operation per handle is executing at any time;
//! * operations execute in the order they acquired the slot, even if a caller
//!   stops awaiting an operation that has already been submitted.

use core::mem;
use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_lock::{Mutex, MutexGuardArc};
use tracing::{Level, event};

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};

const OPEN: u8 = 0;
const CLOSED: u8 = 1;
const DETACHED: u8 = 2;

/// The blocking handle, as seen from a worker thread.
pub(crate) enum Slot<H> {
    Live(H),
    Closed,
    Detached,
}

/// Releases a handle on a worker thread. Runs at most once per handle.
pub(crate) type Release<H> = fn(H) -> Result<()>;

pub(crate) struct HandleCell<H: Send + 'static> {
    slot: Arc<Mutex<Slot<H>>>,
    status: AtomicU8,
    dispatcher: Dispatcher,
    release: Release<H>,
}

impl<H: Send + 'static> HandleCell<H> {
    pub(crate) fn new(handle: H, dispatcher: Dispatcher, release: Release<H>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Live(handle))),
            status: AtomicU8::new(OPEN),
            dispatcher,
            release,
        }
    }

    pub(crate) const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Reports whether the facade was closed. Reading the flag never dispatches.
    pub(crate) fn is_closed(&self) -> bool {
        self.status.load(Ordering::Acquire) == CLOSED
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.status.load(Ordering::Acquire) == DETACHED
    }

    fn ensure_usable(&self, operation: &'static str) -> Result<()> {
        match self.status.load(Ordering::Acquire) {
            OPEN => Ok(()),
            CLOSED => Err(Error::closed(operation)),
            _ => Err(Error::detached(operation)),
        }
    }

    /// Runs `f` against the handle on a worker thread.
    pub(crate) async fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut H) -> Result<T> + Send + 'static,
    {
        self.ensure_usable(operation)?;
        let mut guard = self.slot.lock_arc().await;
        event!(Level::TRACE, message = "dispatch", operation);
        self.dispatcher
            .dispatch(move || match &mut *guard {
                Slot::Live(handle) => f(handle),
                Slot::Closed => Err(Error::closed(operation)),
                Slot::Detached => Err(Error::detached(operation)),
            })
            .await
    }

    /// Takes exclusive access to the handle until the returned lease is
    /// dropped. Every other operation waits for the slot in the meantime.
    pub(crate) async fn lease(&self, operation: &'static str) -> Result<Lease<H>> {
        self.ensure_usable(operation)?;
        let guard = self.slot.lock_arc().await;
        Ok(Lease { guard, operation })
    }

    /// Releases the handle on a worker thread.
    ///
    /// The closed flag flips before anything is dispatched, so operations
    /// issued afterwards are rejected even if this future is abandoned.
    /// Closing an already closed facade is a no-op.
    pub(crate) async fn close(&self) -> Result<()> {
        match self.status.compare_exchange(OPEN, CLOSED, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {}
            Err(CLOSED) => return Ok(()),
            Err(_) => return Err(Error::detached("close")),
        }

        let mut guard = self.slot.lock_arc().await;
        let release = self.release;
        event!(Level::TRACE, message = "dispatch", operation = "close");
        self.dispatcher
            .dispatch(move || match mem::replace(&mut *guard, Slot::Closed) {
                Slot::Live(handle) => release(handle),
                Slot::Closed | Slot::Detached => Ok(()),
            })
            .await
    }

    /// Takes the handle out of the cell, leaving the facade permanently
    /// unusable. `f` runs on a worker thread and converts the handle into
    /// whatever is handed back to the caller.
    pub(crate) async fn detach<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(H) -> Result<T> + Send + 'static,
    {
        match self.status.compare_exchange(OPEN, DETACHED, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {}
            Err(CLOSED) => return Err(Error::closed(operation)),
            Err(_) => return Err(Error::detached(operation)),
        }

        let mut guard = self.slot.lock_arc().await;
        event!(Level::TRACE, message = "dispatch", operation);
        self.dispatcher
            .dispatch(move || match mem::replace(&mut *guard, Slot::Detached) {
                Slot::Live(handle) => f(handle),
                Slot::Closed => Err(Error::closed(operation)),
                Slot::Detached => Err(Error::detached(operation)),
            })
            .await
    }
}

/// Exclusive access to a handle that spans several blocking calls.
pub(crate) struct Lease<H> {
    guard: MutexGuardArc<Slot<H>>,
    operation: &'static str,
}

impl<H> Lease<H> {
    pub(crate) fn get_mut(&mut self) -> Result<&mut H> {
        match &mut *self.guard {
            Slot::Live(handle) => Ok(handle),
            Slot::Closed => Err(Error::closed(self.operation)),
            Slot::Detached => Err(Error::detached(self.operation)),
        }
    }
}

impl<H: Send + 'static> Drop for HandleCell<H> {
    fn drop(&mut self) {
        if let Some(guard) = self.slot.try_lock_arc()
            && !matches!(*guard, Slot::Live(_))
        {
            return;
        }

        // Either the handle is still live, or an abandoned operation holds the
        // slot. Release on the pool once the slot is free.
        let slot = Arc::clone(&self.slot);
        let release = self.release;
        event!(Level::DEBUG, message = "facade dropped while open, releasing in background");
        self.dispatcher.spawn_detached(async move {
            let mut guard = slot.lock_arc().await;
            if let Slot::Live(handle) = mem::replace(&mut *guard, Slot::Closed)
                && let Err(error) = release(handle)
            {
                event!(Level::WARN, message = "background release failed", %error);
            }
        });
    }
}

impl<H: Send + 'static> core::fmt::Debug for HandleCell<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let status = match self.status.load(Ordering::Relaxed) {
            OPEN => "open",
            CLOSED => "closed",
            _ => "detached",
        };
        f.debug_struct("HandleCell")
            .field("status", &status)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::pool::{ThreadPool, ThreadPoolConfig};

    fn block_on<F: Future>(future: F) -> F::Output {
        futures::executor::block_on(future)
    }

    fn release_counter(counter: Arc<AtomicUsize>) -> Result<()> {
        let _ = counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(ThreadPool::new(ThreadPoolConfig::new().max_threads(4)))
    }

    #[test]
    fn call_sees_the_handle() {
        let cell = HandleCell::new(vec![1, 2, 3], dispatcher(), |_| Ok(()));
        let len = block_on(cell.call("len", |v: &mut Vec<i32>| Ok(v.len()))).unwrap();
        assert_eq!(len, 3);
    }

    #[test]
    fn close_runs_release_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cell = HandleCell::new(Arc::clone(&counter), dispatcher(), release_counter);
        block_on(cell.close()).unwrap();
        block_on(cell.close()).unwrap();
        assert!(cell.is_closed());
        drop(cell);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn calls_after_close_are_state_errors() {
        let cell = HandleCell::new(0_u8, dispatcher(), |_| Ok(()));
        block_on(cell.close()).unwrap();
        let error = block_on(cell.call("read", |_| Ok(()))).unwrap_err();
        assert!(matches!(error, Error::Closed { operation: "read" }));
    }

    #[test]
    fn detach_hands_back_the_handle() {
        let cell = HandleCell::new(String::from("raw"), dispatcher(), |_| Ok(()));
        let raw = block_on(cell.detach("detach", Ok)).unwrap();
        assert_eq!(raw, "raw");
        assert!(cell.is_detached());
        let error = block_on(cell.call("read", |_| Ok(()))).unwrap_err();
        assert!(matches!(error, Error::Detached { .. }));
        assert!(matches!(block_on(cell.close()), Err(Error::Detached { .. })));
    }

    #[test]
    fn lease_holds_the_slot_until_dropped() {
        let cell = HandleCell::new(vec![1_u8], dispatcher(), |_| Ok(()));
        let mut lease = block_on(cell.lease("append")).unwrap();
        lease.get_mut().unwrap().push(2);

        let mut pending = core::pin::pin!(cell.call("len", |v: &mut Vec<u8>| Ok(v.len())));
        assert!(block_on(futures::future::poll_immediate(pending.as_mut())).is_none());
        drop(lease);
        assert_eq!(block_on(pending).unwrap(), 2);
    }

    #[test]
    fn dropping_an_open_cell_releases_in_background() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher();
        let cell = HandleCell::new(Arc::clone(&counter), dispatcher.clone(), release_counter);
        drop(cell);
        assert!(dispatcher.drain(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn operations_never_overlap() {
        let cell = Arc::new(HandleCell::new(AtomicUsize::new(0), dispatcher(), |_| Ok(())));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let futures = (0..16).map(|_| {
            let overlaps = Arc::clone(&overlaps);
            let cell = Arc::clone(&cell);
            async move {
                cell.call("count", move |active: &mut AtomicUsize| {
                    if active.fetch_add(1, Ordering::SeqCst) != 0 {
                        let _ = overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    std::thread::sleep(Duration::from_millis(2));
                    let _ = active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }
        });
        for result in block_on(futures::future::join_all(futures)) {
            result.unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}
