// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use std::future::IntoFuture;

use futures::future::BoxFuture;
use tracing::{Level, event};

use crate::error::{Error, Result};

/// An asynchronous handle that owns a blocking resource.
///
/// Every facade in this crate implements this trait. [`ScopedContext`] uses
/// it to release the resource when a scope ends.
pub trait Facade: Send + Sync + 'static {
    /// Releases the underlying resource on a worker thread.
    ///
    /// Calling this more than once is allowed; only the first call does any
    /// work.
    fn release(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Where a [`ScopedContext`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing has happened yet; the open operation has not been submitted.
    Unopened,
    /// The open operation is in flight.
    Opening,
    /// The facade is available.
    Open,
    /// The scope ended and the facade was released.
    Closed,
    /// The open operation failed; there is nothing to release.
    Failed,
}

/// A pending facade that can either be awaited directly or used as a scope.
///
/// Every constructor in this crate (`open`, the temp adapters, archives,
/// directory scans) returns a `ScopedContext`. It offers two separate
/// capabilities:
///
/// * **Resolve**: `.await` it to get the facade. The caller is then
///   responsible for closing it.
/// * **Scope**: [`scope`](Self::scope) (or [`enter`](Self::enter) followed by
///   [`exit`](Self::exit)) opens the facade, lends it out, and releases it
///   exactly once when the scope ends, even when the body fails.
///
/// Nothing is submitted to the worker pool until the context is first
/// awaited or entered.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), offload_fs::Error> {
/// let content = offload_fs::open("notes.txt", "r")
///     .scope(async |file| -> offload_fs::Result<String> { file.as_text()?.read(None).await })
///     .await?;
/// # let _ = content;
/// # Ok(())
/// # }
/// ```
#[must_use = "a ScopedContext does nothing until it is awaited or entered"]
pub struct ScopedContext<F> {
    phase: Phase,
    opening: Option<BoxFuture<'static, Result<F>>>,
    facade: Option<F>,
}

impl<F: Facade> ScopedContext<F> {
    /// Creates a context around a future that opens the facade.
    pub fn new(open: impl Future<Output = Result<F>> + Send + 'static) -> Self {
        Self {
            phase: Phase::Unopened,
            opening: Some(Box::pin(open)),
            facade: None,
        }
    }

    /// Returns the current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the facade once it is open. After [`exit`](Self::exit), the
    /// closed facade stays available here for inspection.
    #[must_use]
    pub const fn get(&self) -> Option<&F> {
        self.facade.as_ref()
    }

    /// Opens the facade and returns it.
    ///
    /// Entering an already open context returns the same facade. If this
    /// future is dropped while the open is in flight, a later `enter`
    /// resumes it.
    ///
    /// # Errors
    ///
    /// Returns the open failure unchanged. Once the context failed or was
    /// exited, returns [`Error::Closed`].
    pub async fn enter(&mut self) -> Result<&mut F> {
        match self.phase {
            Phase::Open => return self.facade.as_mut().ok_or(Error::closed("enter")),
            Phase::Closed | Phase::Failed => return Err(Error::closed("enter")),
            Phase::Unopened | Phase::Opening => {}
        }

        let Some(opening) = self.opening.as_mut() else {
            return Err(Error::closed("enter"));
        };
        self.phase = Phase::Opening;
        let opened = opening.await;
        self.opening = None;

        match opened {
            Ok(facade) => {
                self.phase = Phase::Open;
                event!(Level::DEBUG, message = "scope entered");
                Ok(self.facade.insert(facade))
            }
            Err(error) => {
                self.phase = Phase::Failed;
                event!(Level::DEBUG, message = "scope open failed", %error);
                Err(error)
            }
        }
    }

    /// Ends the scope, releasing the facade if it was opened.
    ///
    /// The release happens at most once; later calls are no-ops. A context
    /// that was never opened simply abandons its pending open.
    ///
    /// # Errors
    ///
    /// Returns the release failure, if any.
    pub async fn exit(&mut self) -> Result<()> {
        match self.phase {
            Phase::Open => {}
            Phase::Unopened | Phase::Opening => {
                self.opening = None;
                self.phase = Phase::Closed;
                return Ok(());
            }
            Phase::Closed | Phase::Failed => return Ok(()),
        }

        self.phase = Phase::Closed;
        event!(Level::DEBUG, message = "scope exited");
        match &self.facade {
            Some(facade) => facade.release().await,
            None => Ok(()),
        }
    }

    /// Runs `body` with the open facade and releases the facade afterwards.
    ///
    /// The release happens whether `body` succeeds or fails. If both fail,
    /// the body's error is returned.
    ///
    /// # Errors
    ///
    /// Returns the open failure, the body's error, or the release failure,
    /// in that order of precedence.
    pub async fn scope<R, E>(mut self, body: impl AsyncFnOnce(&mut F) -> core::result::Result<R, E>) -> core::result::Result<R, E>
    where
        E: From<Error>,
    {
        let facade = self.enter().await?;
        let outcome = body(facade).await;
        let released = self.exit().await;
        let value = outcome?;
        released?;
        Ok(value)
    }

    /// Converts the eventual facade with `f`.
    pub fn map<G, M>(self, f: M) -> ScopedContext<G>
    where
        G: Facade,
        M: FnOnce(F) -> Result<G> + Send + 'static,
    {
        ScopedContext::new(async move { f(self.await?) })
    }
}

impl<F: Facade> IntoFuture for ScopedContext<F> {
    type Output = Result<F>;
    type IntoFuture = BoxFuture<'static, Result<F>>;

    fn into_future(mut self) -> Self::IntoFuture {
        Box::pin(async move {
            let _ = self.enter().await?;
            self.facade.take().ok_or(Error::closed("await"))
        })
    }
}

impl<F: fmt::Debug> fmt::Debug for ScopedContext<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedContext")
            .field("phase", &self.phase)
            .field("facade", &self.facade)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::executor::block_on;

    use super::*;

    #[derive(Debug)]
    struct Counted {
        releases: Arc<AtomicUsize>,
    }

    impl Facade for Counted {
        async fn release(&self) -> Result<()> {
            let _ = self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counted_context(releases: &Arc<AtomicUsize>) -> ScopedContext<Counted> {
        let releases = Arc::clone(releases);
        ScopedContext::new(async move { Ok(Counted { releases }) })
    }

    #[test]
    fn scope_releases_once_on_success() {
        let releases = Arc::new(AtomicUsize::new(0));
        let value = block_on(counted_context(&releases).scope(async |_| Ok::<_, Error>(7))).unwrap();
        assert_eq!(value, 7);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scope_releases_once_on_failure() {
        let releases = Arc::new(AtomicUsize::new(0));
        let error = block_on(counted_context(&releases).scope(async |_| Err::<(), _>(Error::detached("body")))).unwrap_err();
        assert!(matches!(error, Error::Detached { operation: "body" }));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn enter_twice_returns_the_same_facade_and_exit_is_idempotent() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut context = counted_context(&releases);
        block_on(async {
            let first: *const Counted = context.enter().await.unwrap();
            let second: *const Counted = context.enter().await.unwrap();
            assert_eq!(first, second);
            context.exit().await.unwrap();
            context.exit().await.unwrap();
        });
        assert_eq!(context.phase(), Phase::Closed);
        assert!(context.get().is_some());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(matches!(block_on(context.enter()), Err(Error::Closed { .. })));
    }

    #[test]
    fn failed_open_is_never_released() {
        let mut context: ScopedContext<Counted> = ScopedContext::new(async { Err(Error::from(std::io::Error::other("nope"))) });
        let _ = block_on(context.enter()).unwrap_err();
        assert_eq!(context.phase(), Phase::Failed);
        block_on(context.exit()).unwrap();
        assert!(context.get().is_none());
    }

    #[test]
    fn awaiting_resolves_without_releasing() {
        let releases = Arc::new(AtomicUsize::new(0));
        let counted = block_on(counted_context(&releases).into_future()).unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        drop(counted);
    }

    #[test]
    fn nothing_runs_until_awaited() {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let releases = Arc::new(AtomicUsize::new(0));
        let context = ScopedContext::new(async move {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Counted { releases })
        });
        assert_eq!(context.phase(), Phase::Unopened);
        drop(context);
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }
}
