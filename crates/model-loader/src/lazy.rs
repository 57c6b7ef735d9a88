//! # Lazy Slots
//!
//! A [`LazySlot`] holds the data of one model or collection. The fetch that
//! fills it is stored as a [`Deferred`] and driven only when an accessor first
//! asks for the data. Concurrent accessors all wait on the same
//! initialization, so the fetch runs at most once and every accessor observes
//! the same outcome.
//!
//! The work is kept as a shared future. An accessor that is dropped mid-fetch
//! (timeout, `select!`, aborted task) leaves the fetch in flight, and the next
//! accessor picks up the same future instead of issuing the command again.
//! [`LoadError::Cancelled`] is reserved for an explicit [`LazySlot::cancel`].
//!
//! ```text
//!   Waiting ──(first access resolves Ok)──▶ Loaded
//!   LoadedWithData                           (terminal, never fetches)
//! ```

use crate::data::{describe_args, Args};
use crate::deferred::{self, Deferred};
use crate::error::LoadError;
use crate::load_state::LoadState;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type SharedWork<T> = Shared<BoxFuture<'static, Result<T, LoadError>>>;

pub(crate) struct LazySlot<T> {
    model_type: &'static str,
    args: Args,
    clear_cache: bool,
    state: Mutex<LoadState>,
    pending: Mutex<Option<SharedWork<T>>>,
    started: AtomicBool,
    cancelled: Mutex<Option<String>>,
    outcome: OnceCell<Result<T, LoadError>>,
}

impl<T: Clone + Send + Sync + 'static> LazySlot<T> {
    /// A slot whose data comes from `work` on first access.
    pub(crate) fn waiting(
        model_type: &'static str,
        args: Args,
        clear_cache: bool,
        work: Deferred<T>,
    ) -> Self {
        Self {
            model_type,
            args,
            clear_cache,
            state: Mutex::new(LoadState::Waiting),
            pending: Mutex::new(Some(work.into_future().shared())),
            started: AtomicBool::new(false),
            cancelled: Mutex::new(None),
            outcome: OnceCell::new(),
        }
    }

    /// A slot filled from the start.
    pub(crate) fn with_data(model_type: &'static str, value: T) -> Self {
        Self {
            model_type,
            args: Args::new(),
            clear_cache: false,
            state: Mutex::new(LoadState::LoadedWithData),
            pending: Mutex::new(None),
            started: AtomicBool::new(false),
            cancelled: Mutex::new(None),
            outcome: OnceCell::new_with(Some(Ok(value))),
        }
    }

    pub(crate) fn state(&self) -> LoadState {
        *lock(&self.state)
    }

    /// Resolves the slot, driving the pending work on first access.
    pub(crate) async fn get(&self) -> Result<T, LoadError> {
        self.outcome
            .get_or_init(|| self.resolve())
            .await
            .clone()
    }

    /// Blocking form of [`LazySlot::get`]. Must not be called from inside an async task.
    pub(crate) fn get_blocking(&self) -> Result<T, LoadError> {
        deferred::block_on(self.get())
    }

    /// Abandons the pending work. Only possible while nothing started it.
    pub(crate) fn cancel(&self, reason: &str) -> bool {
        let mut pending = lock(&self.pending);
        if self.state() != LoadState::Waiting
            || pending.is_none()
            || self.started.load(Ordering::SeqCst)
        {
            return false;
        }
        pending.take();
        *lock(&self.cancelled) = Some(reason.to_string());
        debug!(model_type = self.model_type, reason, "Load cancelled");
        true
    }

    async fn resolve(&self) -> Result<T, LoadError> {
        let work = lock(&self.pending).as_ref().map(|work| {
            self.started.store(true, Ordering::SeqCst);
            work.clone()
        });
        let Some(work) = work else {
            let reason = lock(&self.cancelled)
                .clone()
                .unwrap_or_else(|| "no pending load".to_string());
            return Err(LoadError::Cancelled {
                model_type: self.model_type.to_string(),
                args: describe_args(&self.args),
                clear_cache: self.clear_cache,
                reason,
            });
        };

        let result = work.await;
        if result.is_ok() {
            let mut state = lock(&self.state);
            if *state == LoadState::Waiting {
                *state = LoadState::Loaded;
                debug!(model_type = self.model_type, "Model loaded");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    fn counted(runs: Arc<AtomicUsize>, value: u32) -> Deferred<u32> {
        Deferred::new(async move {
            runs.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(value)
        })
    }

    #[tokio::test]
    async fn test_concurrent_access_runs_work_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(LazySlot::waiting("Issue", Args::new(), false, counted(runs.clone(), 9)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slot = slot.clone();
                tokio::spawn(async move { slot.get().await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 9);
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(slot.state(), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_failure_is_observed_by_every_accessor() {
        let slot = LazySlot::<u32>::waiting(
            "Issue",
            Args::new(),
            false,
            Deferred::failed(LoadError::Unregistered("Issue".into())),
        );
        assert!(slot.get().await.is_err());
        assert!(slot.get().await.is_err());
        assert_eq!(slot.state(), LoadState::Waiting);
    }

    #[tokio::test]
    async fn test_cancel_before_access() {
        let runs = Arc::new(AtomicUsize::new(0));
        let slot = LazySlot::waiting("Issue", Args::new(), true, counted(runs.clone(), 1));

        assert!(slot.cancel("navigated away"));
        assert!(!slot.cancel("again"));

        let err = slot.get().await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Cancelled { clear_cache: true, ref reason, .. } if reason == "navigated away"
        ));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_accessor_leaves_fetch_to_the_next_one() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let slot = LazySlot::waiting(
            "Issue",
            Args::new(),
            false,
            Deferred::new(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(11u32)
            }),
        );

        let first = tokio::time::timeout(Duration::from_millis(5), slot.get()).await;
        assert!(first.is_err());
        assert!(!slot.cancel("too late"), "a started fetch cannot be cancelled");

        assert_eq!(slot.get().await.unwrap(), 11);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(slot.state(), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_with_data_is_terminal() {
        let slot = LazySlot::with_data("Issue", 3u32);
        assert_eq!(slot.state(), LoadState::LoadedWithData);
        assert!(!slot.cancel("too late"));
        assert_eq!(slot.get().await.unwrap(), 3);
    }
}
