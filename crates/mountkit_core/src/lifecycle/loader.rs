//! Load handles attached to extension descriptors and pages.
//!
//! # Responsibility
//! - Provide the eager (synchronous) and deferred (asynchronous) handle
//!   variants and their constructors.
//! - Tag every load failure with the owning feature/module provenance.
//!
//! # Invariants
//! - An eager factory runs at most once per handle; clones share the result.
//! - A deferred factory is invoked at most once until a failure is explicitly
//!   reset by the caller.
//! - Cloning a handle never duplicates its memo state.

use crate::extension::capability::LoadCapability;
use crate::lifecycle::memo::{FetchFuture, SharedFetch};
use futures::FutureExt;
use log::{debug, warn};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::sync::Arc;

/// Value produced by a load handle.
///
/// Renderers downcast to the concrete component type they expect.
pub type LoadedModule = Arc<dyn Any + Send + Sync>;

/// Provenance tags attached to load failures and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    /// Human-facing feature label, e.g. `pnc-extension`.
    pub feature_name: String,
    /// Owning package/module name, e.g. `@ugandaemr/esm-ugandaemr-app`.
    pub module_name: String,
}

impl Provenance {
    pub fn new(feature_name: impl Into<String>, module_name: impl Into<String>) -> Self {
        Self {
            feature_name: feature_name.into(),
            module_name: module_name.into(),
        }
    }
}

impl Display for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.feature_name, self.module_name)
    }
}

/// Failure of one deferred fetch, scoped to the descriptor that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailureError {
    pub feature_name: String,
    pub module_name: String,
    /// Rendered message of the underlying fetch error.
    pub message: String,
}

impl LoadFailureError {
    pub fn new(provenance: &Provenance, message: impl Into<String>) -> Self {
        Self {
            feature_name: provenance.feature_name.clone(),
            module_name: provenance.module_name.clone(),
            message: message.into(),
        }
    }
}

impl Display for LoadFailureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to load feature `{}` from module `{}`: {}",
            self.feature_name, self.module_name, self.message
        )
    }
}

impl Error for LoadFailureError {}

/// Synchronous, memoized handle for lightweight renderers.
#[derive(Clone)]
pub struct EagerLoader {
    provenance: Provenance,
    factory: Arc<dyn Fn() -> LoadedModule + Send + Sync>,
    cell: Arc<OnceCell<LoadedModule>>,
}

impl EagerLoader {
    /// Returns the memoized value, running the factory on first call only.
    pub fn get(&self) -> LoadedModule {
        self.cell.get_or_init(|| (self.factory)()).clone()
    }

    /// Returns whether the factory has already run.
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }
}

impl Debug for EagerLoader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EagerLoader")
            .field("provenance", &self.provenance)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Asynchronous, memoized handle for heavyweight feature code.
#[derive(Clone)]
pub struct DeferredLoader {
    provenance: Provenance,
    memo: Arc<SharedFetch<LoadedModule>>,
}

impl DeferredLoader {
    /// Loads the module, sharing any in-flight or settled fetch.
    ///
    /// A failed fetch stays failed for every caller until [`Self::retry`] or
    /// [`Self::reset_failed`] is called.
    pub async fn load(&self) -> Result<LoadedModule, LoadFailureError> {
        self.memo.fetch().await
    }

    /// Clears a memoized failure and loads again.
    pub async fn retry(&self) -> Result<LoadedModule, LoadFailureError> {
        if self.memo.reset_failed() {
            debug!(
                "event=load_retry module=lifecycle status=start feature={} owner={}",
                self.provenance.feature_name, self.provenance.module_name
            );
        }
        self.load().await
    }

    /// Clears a memoized failure without starting a new fetch.
    pub fn reset_failed(&self) -> bool {
        self.memo.reset_failed()
    }

    /// Returns the settled outcome, if any, without driving the fetch.
    pub fn peek(&self) -> Option<Result<LoadedModule, LoadFailureError>> {
        self.memo.peek()
    }

    /// Number of underlying fetches started by this handle.
    pub fn fetch_count(&self) -> usize {
        self.memo.fetch_count()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }
}

impl Debug for DeferredLoader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredLoader")
            .field("provenance", &self.provenance)
            .field("fetch_count", &self.fetch_count())
            .finish()
    }
}

/// Closed set of load handles a descriptor can carry.
#[derive(Debug, Clone)]
pub enum LoadHandle {
    Eager(EagerLoader),
    Deferred(DeferredLoader),
}

impl LoadHandle {
    pub fn capability(&self) -> LoadCapability {
        match self {
            Self::Eager(_) => LoadCapability::Eager,
            Self::Deferred(_) => LoadCapability::Deferred,
        }
    }

    pub fn provenance(&self) -> &Provenance {
        match self {
            Self::Eager(loader) => loader.provenance(),
            Self::Deferred(loader) => loader.provenance(),
        }
    }

    /// Loads the handle's value. Eager handles resolve without suspending.
    pub async fn load(&self) -> Result<LoadedModule, LoadFailureError> {
        match self {
            Self::Eager(loader) => Ok(loader.get()),
            Self::Deferred(loader) => loader.load().await,
        }
    }

    /// Returns the value synchronously when it is available without waiting.
    ///
    /// Eager handles always resolve; deferred handles resolve only after a
    /// successful fetch has settled.
    pub fn load_now(&self) -> Option<LoadedModule> {
        match self {
            Self::Eager(loader) => Some(loader.get()),
            Self::Deferred(loader) => loader.peek().and_then(Result::ok),
        }
    }

    /// Number of underlying fetches started. Eager handles report 0 or 1.
    pub fn fetch_count(&self) -> usize {
        match self {
            Self::Eager(loader) => usize::from(loader.is_resolved()),
            Self::Deferred(loader) => loader.fetch_count(),
        }
    }
}

/// Wraps a synchronous factory into an eager handle.
pub fn sync_lifecycle<F>(factory: F, provenance: Provenance) -> LoadHandle
where
    F: Fn() -> LoadedModule + Send + Sync + 'static,
{
    LoadHandle::Eager(EagerLoader {
        provenance,
        factory: Arc::new(factory),
        cell: Arc::new(OnceCell::new()),
    })
}

/// Wraps an already-resolved value into an eager handle.
pub fn ready_lifecycle(value: LoadedModule, provenance: Provenance) -> LoadHandle {
    let resolved = value.clone();
    let factory: Arc<dyn Fn() -> LoadedModule + Send + Sync> = Arc::new(move || resolved.clone());
    LoadHandle::Eager(EagerLoader {
        provenance,
        factory,
        cell: Arc::new(OnceCell::with_value(value)),
    })
}

/// Wraps a zero-argument async factory into a deferred, memoized handle.
///
/// Errors returned by the factory are rendered with `Display` and tagged with
/// `provenance`. The factory runs when the first load is polled, outside the
/// handle's memo lock, so it may inspect its own handle.
pub fn async_lifecycle<F, Fut, E>(factory: F, provenance: Provenance) -> LoadHandle
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<LoadedModule, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let tags = provenance.clone();
    let fetch = move || -> FetchFuture<LoadedModule> {
        let tags = tags.clone();
        debug!(
            "event=deferred_load module=lifecycle status=start feature={} owner={}",
            tags.feature_name, tags.module_name
        );
        factory()
            .map(move |outcome| match outcome {
                Ok(module) => {
                    debug!(
                        "event=deferred_load module=lifecycle status=ok feature={} owner={}",
                        tags.feature_name, tags.module_name
                    );
                    Ok(module)
                }
                Err(err) => {
                    let failure = LoadFailureError::new(&tags, err.to_string());
                    warn!(
                        "event=deferred_load module=lifecycle status=error feature={} owner={} error={}",
                        tags.feature_name, tags.module_name, failure.message
                    );
                    Err(failure)
                }
            })
            .boxed()
    };

    LoadHandle::Deferred(DeferredLoader {
        provenance,
        memo: Arc::new(SharedFetch::new(Arc::new(fetch))),
    })
}
