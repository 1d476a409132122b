//! Translation bundle index.

use crate::lifecycle::loader::{LoadFailureError, Provenance};
use crate::lifecycle::memo::{FetchFuture, SharedFetch};
use futures::FutureExt;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key -> translated string table of one locale.
pub type StringTable = BTreeMap<String, String>;

static LOCALE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2,3}(?:[_-][A-Za-z0-9]{2,8})*$").expect("valid locale regex")
});
static BUNDLE_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<locale>[a-z]{2,3}(?:[_-][A-Za-z0-9]{2,8})*)\.json$")
        .expect("valid bundle file regex")
});

/// Errors from translation registration and loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// No bundle is registered for the locale.
    NotFound(String),
    /// Locale id is malformed.
    InvalidLocale(String),
    /// Locale registered twice.
    DuplicateLocale(String),
    /// Bundle directory could not be scanned.
    DirectoryUnreadable { path: PathBuf, message: String },
    /// Registered bundle failed to load.
    LoadFailed(LoadFailureError),
}

impl Display for TranslationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(locale) => write!(f, "no translation bundle for locale `{locale}`"),
            Self::InvalidLocale(locale) => write!(f, "translation locale is invalid: {locale}"),
            Self::DuplicateLocale(locale) => {
                write!(f, "translation locale already registered: {locale}")
            }
            Self::DirectoryUnreadable { path, message } => write!(
                f,
                "translation directory `{}` cannot be read: {message}",
                path.display()
            ),
            Self::LoadFailed(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TranslationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LoadFailed(err) => Some(err),
            _ => None,
        }
    }
}

/// Locale -> deferred string-table loader.
///
/// Clones share each locale's memo, so a bundle fetched through one clone is
/// settled for all of them.
#[derive(Clone)]
pub struct TranslationBundleIndex {
    module_name: String,
    bundles: BTreeMap<String, Arc<SharedFetch<Arc<StringTable>>>>,
}

impl TranslationBundleIndex {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            bundles: BTreeMap::new(),
        }
    }

    /// Registers a deferred loader for `locale`.
    pub fn register<F, Fut, E>(
        &mut self,
        locale: impl Into<String>,
        factory: F,
    ) -> Result<(), TranslationError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StringTable, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let locale = locale.into();
        if !is_valid_locale(&locale) {
            return Err(TranslationError::InvalidLocale(locale));
        }
        if self.bundles.contains_key(&locale) {
            return Err(TranslationError::DuplicateLocale(locale));
        }

        let provenance = Provenance::new(format!("translations:{locale}"), &self.module_name);
        let fetch = move || -> FetchFuture<Arc<StringTable>> {
            let provenance = provenance.clone();
            debug!(
                "event=translation_load module=i18n status=start feature={} owner={}",
                provenance.feature_name, provenance.module_name
            );
            factory()
                .map(move |outcome| match outcome {
                    Ok(table) => Ok(Arc::new(table)),
                    Err(err) => {
                        let failure = LoadFailureError::new(&provenance, err.to_string());
                        warn!(
                            "event=translation_load module=i18n status=error feature={} error={}",
                            provenance.feature_name, failure.message
                        );
                        Err(failure)
                    }
                })
                .boxed()
        };

        self.bundles
            .insert(locale, Arc::new(SharedFetch::new(Arc::new(fetch))));
        Ok(())
    }

    /// Builds an index from the `<locale>.json` files of `dir`.
    ///
    /// Only file names are read here; contents are fetched on first `load`.
    /// Files whose name is not a locale id are skipped.
    pub fn from_dir(
        module_name: impl Into<String>,
        dir: impl AsRef<Path>,
    ) -> Result<Self, TranslationError> {
        let dir = dir.as_ref();
        let unreadable = |err: std::io::Error| TranslationError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            message: err.to_string(),
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(unreadable)? {
            let path = entry.map_err(unreadable)?.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            match BUNDLE_FILE_RE.captures(file_name) {
                Some(captures) => files.push((captures["locale"].to_string(), path.clone())),
                None => debug!(
                    "event=translation_scan module=i18n status=skip file={}",
                    file_name
                ),
            }
        }
        files.sort();

        let mut index = Self::new(module_name);
        for (locale, path) in files {
            index.register(locale, move || read_bundle(path.clone()))?;
        }
        Ok(index)
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Registered locale ids, sorted.
    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }

    pub fn contains(&self, locale: &str) -> bool {
        self.bundles.contains_key(locale)
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Loads the string table for `locale`, memoized per locale.
    pub async fn load(&self, locale: &str) -> Result<Arc<StringTable>, TranslationError> {
        let bundle = self
            .bundles
            .get(locale)
            .ok_or_else(|| TranslationError::NotFound(locale.to_string()))?;
        bundle.fetch().await.map_err(TranslationError::LoadFailed)
    }

    /// Loads `locale`, falling back to `fallback` when it is missing or fails.
    pub async fn load_or_fallback(
        &self,
        locale: &str,
        fallback: &str,
    ) -> Result<Arc<StringTable>, TranslationError> {
        match self.load(locale).await {
            Ok(table) => Ok(table),
            Err(err) if locale != fallback => {
                warn!(
                    "event=translation_fallback module=i18n status=warn locale={} fallback={} error={}",
                    locale, fallback, err
                );
                self.load(fallback).await
            }
            Err(err) => Err(err),
        }
    }

    /// Number of fetches started for `locale`; 0 when unregistered.
    pub fn fetch_count(&self, locale: &str) -> usize {
        self.bundles
            .get(locale)
            .map_or(0, |bundle| bundle.fetch_count())
    }

    /// Clears a memoized failure for `locale` so the next load refetches.
    pub fn reset_failed(&self, locale: &str) -> bool {
        self.bundles
            .get(locale)
            .is_some_and(|bundle| bundle.reset_failed())
    }
}

impl Debug for TranslationBundleIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationBundleIndex")
            .field("module_name", &self.module_name)
            .field("locales", &self.bundles.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Returns whether `locale` is a supported locale id (`en`, `pt_BR`, `zh-Hant`).
pub fn is_valid_locale(locale: &str) -> bool {
    LOCALE_RE.is_match(locale)
}

/// Reads one bundle file; uses `tokio::fs` only when polled inside a Tokio runtime.
async fn read_bundle(path: PathBuf) -> Result<StringTable, String> {
    let raw = if tokio::runtime::Handle::try_current().is_ok() {
        tokio::fs::read_to_string(&path).await
    } else {
        std::fs::read_to_string(&path)
    }
    .map_err(|err| format!("cannot read `{}`: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("cannot parse `{}`: {err}", path.display()))
}
