//! Shared, memoized fetch adapter used by deferred loaders and translations.

use crate::lifecycle::loader::LoadFailureError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) type FetchFuture<T> = BoxFuture<'static, Result<T, LoadFailureError>>;
pub(crate) type FetchFactory<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

/// Memo slot holding at most one shared fetch.
///
/// The slot is claimed under its lock when empty; every caller after that
/// clones the same `Shared` future, so a pending fetch is driven once and its
/// outcome (value or failure) is observed by all of them. The factory itself
/// runs on first poll, after the lock is released, so it may query this memo.
pub(crate) struct SharedFetch<T>
where
    T: Clone + Send + Sync + 'static,
{
    factory: FetchFactory<T>,
    slot: Mutex<Option<Shared<FetchFuture<T>>>>,
    fetches: AtomicUsize,
}

impl<T> SharedFetch<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(factory: FetchFactory<T>) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Returns the memoized shared fetch, starting it on first use.
    pub(crate) fn fetch(&self) -> Shared<FetchFuture<T>> {
        let mut slot = self.lock_slot();
        if let Some(shared) = slot.as_ref() {
            return shared.clone();
        }

        self.fetches.fetch_add(1, Ordering::SeqCst);
        let factory = Arc::clone(&self.factory);
        let shared = async move { factory().await }.boxed().shared();
        *slot = Some(shared.clone());
        shared
    }

    /// Returns the settled outcome without driving the fetch.
    pub(crate) fn peek(&self) -> Option<Result<T, LoadFailureError>> {
        self.lock_slot()
            .as_ref()
            .and_then(|shared| shared.peek().cloned())
    }

    /// Clears a memoized failure so the next `fetch` starts over.
    ///
    /// Pending and successful fetches are left in place. Returns `true` when a
    /// failure was cleared.
    pub(crate) fn reset_failed(&self) -> bool {
        let mut slot = self.lock_slot();
        let failed = matches!(
            slot.as_ref().and_then(|shared| shared.peek()),
            Some(Err(_))
        );
        if failed {
            *slot = None;
        }
        failed
    }

    /// Number of underlying fetches started so far.
    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<Shared<FetchFuture<T>>>> {
        // The guarded value is a plain Option; a poisoned lock still holds a
        // coherent state.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
