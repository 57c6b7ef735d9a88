//! # Deferred Work
//!
//! [`Deferred<T>`] is a boxed, `'static` unit of work producing
//! `Result<T, LoadError>`. Like every Rust future it is lazy: creating one never
//! runs it, and its side effects become observable only once it is driven,
//! either with `.await` or with the blocking [`Deferred::wait`].
//!
//! [`all`] aggregates a batch of deferreds. Members are polled concurrently,
//! per-item events fire in completion order, and the resolved vector is always
//! in input order.
//!
//! ## Failure policy
//!
//! `all` waits for every member to settle before reporting. When one or more
//! members fail, the first failure *in completion order* is returned after the
//! post-run-all event fired. A failing listener is different: it aborts the
//! batch immediately.

use crate::error::LoadError;
use crate::event::{EventDispatcher, LoadEvent};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use once_cell::sync::Lazy;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tracing::{debug, warn};

/// Drives blocking waits made outside any tokio runtime.
static BLOCKING_RUNTIME: Lazy<Result<Runtime, String>> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("model-loader-blocking")
        .enable_all()
        .build()
        .map_err(|e| e.to_string())
});

/// Blocks the current thread on `work` with a tokio context available, so
/// transports may use tokio timers and IO.
///
/// Inside a multi-thread runtime the worker is handed over with
/// `block_in_place`; elsewhere a shared background runtime drives the work.
/// Calling this from a current-thread runtime's task panics.
pub(crate) fn block_on<T, F>(work: F) -> Result<T, LoadError>
where
    F: Future<Output = Result<T, LoadError>>,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(work))
        }
        _ => match BLOCKING_RUNTIME.as_ref() {
            Ok(runtime) => runtime.block_on(work),
            Err(reason) => Err(LoadError::setup("blocking runtime", reason.clone())),
        },
    }
}

/// A pending, not-yet-driven computation.
#[must_use = "a Deferred does nothing until it is awaited or waited on"]
pub struct Deferred<T> {
    work: BoxFuture<'static, Result<T, LoadError>>,
}

impl<T: Send + 'static> Deferred<T> {
    pub fn new<F>(work: F) -> Self
    where
        F: Future<Output = Result<T, LoadError>> + Send + 'static,
    {
        Self { work: work.boxed() }
    }

    /// An already-fulfilled deferred.
    pub fn ready(value: T) -> Self {
        Self::new(futures::future::ready(Ok(value)))
    }

    /// An already-rejected deferred.
    pub fn failed(error: LoadError) -> Self {
        Self::new(futures::future::ready(Err(error)))
    }

    /// Blocks the current thread until the work resolves.
    ///
    /// Do not call this from inside an async task; `.await` the deferred instead.
    pub fn wait(self) -> Result<T, LoadError> {
        block_on(self.work)
    }

    /// Registers a failure handler. It receives the rejection reason and may
    /// return a substitute value or a (possibly different) error. It does not
    /// run when the work fulfills.
    pub fn otherwise<H>(self, handler: H) -> Self
    where
        H: FnOnce(LoadError) -> Result<T, LoadError> + Send + 'static,
    {
        let work = self.work;
        Self::new(async move {
            match work.await {
                Ok(value) => Ok(value),
                Err(reason) => handler(reason),
            }
        })
    }

    /// Transforms the fulfilled value.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, LoadError> + Send + 'static,
    {
        let work = self.work;
        Deferred::new(async move { work.await.and_then(f) })
    }
}

impl<T> IntoFuture for Deferred<T> {
    type Output = Result<T, LoadError>;
    type IntoFuture = BoxFuture<'static, Result<T, LoadError>>;

    fn into_future(self) -> Self::IntoFuture {
        self.work
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred { .. }")
    }
}

/// Schedules `work` for deferred execution. The closure is not called until the
/// returned [`Deferred`] is driven.
pub fn defer<T, F, Fut>(work: F) -> Deferred<T>
where
    T: Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, LoadError>> + Send + 'static,
{
    Deferred::new(async move { work().await })
}

/// Aggregates `futures` into one deferred resolving to their values in input order.
///
/// Dispatches [`LoadEvent::PreRunAll`] before polling any member,
/// [`LoadEvent::RunAllItem`] as each member fulfills, and
/// [`LoadEvent::PostRunAll`] after every member settled.
pub fn all<T>(
    futures: Vec<Deferred<T>>,
    context: impl Into<String>,
    dispatcher: Arc<EventDispatcher>,
) -> Deferred<Vec<T>>
where
    T: Send + Sync + 'static,
{
    let context = context.into();
    Deferred::new(async move {
        let size = futures.len();
        dispatcher.dispatch(&LoadEvent::PreRunAll {
            size,
            context: &context,
        })?;

        let mut pending: FuturesUnordered<_> = futures
            .into_iter()
            .enumerate()
            .map(|(index, deferred)| deferred.into_future().map(move |result| (index, result)))
            .collect();

        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(size).collect();
        let mut first_failure = None;

        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(value) => {
                    debug!(context = %context, index, size, "Batch member fulfilled");
                    dispatcher.dispatch(&LoadEvent::RunAllItem {
                        index,
                        value: &value,
                        size,
                        context: &context,
                    })?;
                    slots[index] = Some(value);
                }
                Err(error) => {
                    warn!(context = %context, index, error = %error, "Batch member rejected");
                    first_failure.get_or_insert(error);
                }
            }
        }

        dispatcher.dispatch(&LoadEvent::PostRunAll { context: &context })?;

        match first_failure {
            Some(error) => Err(error),
            None => Ok(slots.into_iter().flatten().collect()),
        }
    })
}
