// ── DataLoader ──
//
// Binds one query key and one fetch function to the cache, adds the
// `enabled` gate, and flattens `QueryState` into the boolean shape screens
// render from.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{ErasedFetcher, QueryCache, QueryState, QueryStatus, RetryPolicy, erase};
use crate::error::CoreError;
use crate::key::QueryKey;
use crate::stream::QueryStream;

/// Per-loader fetch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// When `false`, nothing is fetched and state reports no data.
    pub enabled: bool,
    /// Retry a failing fetch with exponential backoff. `None` tries once.
    pub retry: Option<RetryPolicy>,
    /// Successful data older than this is refetched on the next `load`.
    pub stale_time: Option<Duration>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: None,
            stale_time: None,
        }
    }
}

impl LoaderOptions {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }
}

/// What a screen renders from.
pub struct LoadState<T> {
    pub data: Option<Arc<T>>,
    pub is_loading: bool,
    pub is_success: bool,
    pub is_error: bool,
    pub error: Option<Arc<CoreError>>,
}

impl<T> LoadState<T> {
    fn disabled() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_success: false,
            is_error: false,
            error: None,
        }
    }
}

impl<T> From<QueryState<T>> for LoadState<T> {
    fn from(state: QueryState<T>) -> Self {
        Self {
            is_loading: state.status == QueryStatus::Loading,
            is_success: state.status == QueryStatus::Success,
            is_error: state.status == QueryStatus::Error,
            data: state.data,
            error: state.error,
        }
    }
}

impl<T> Clone for LoadState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            is_loading: self.is_loading,
            is_success: self.is_success,
            is_error: self.is_error,
            error: self.error.clone(),
        }
    }
}

impl<T> fmt::Debug for LoadState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadState")
            .field("has_data", &self.data.is_some())
            .field("is_loading", &self.is_loading)
            .field("is_success", &self.is_success)
            .field("is_error", &self.is_error)
            .field("error", &self.error)
            .finish()
    }
}

/// One key plus one fetch function, bound to a [`QueryCache`].
pub struct DataLoader<T> {
    cache: QueryCache,
    key: QueryKey,
    fetcher: ErasedFetcher,
    options: LoaderOptions,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> DataLoader<T> {
    pub fn new<F, Fut, E>(cache: QueryCache, key: QueryKey, fetch: F, options: LoaderOptions) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<CoreError> + 'static,
    {
        Self::from_erased(cache, key, erase(fetch), options)
    }

    pub(crate) fn from_erased(
        cache: QueryCache,
        key: QueryKey,
        fetcher: ErasedFetcher,
        options: LoaderOptions,
    ) -> Self {
        Self {
            cache,
            key,
            fetcher,
            options,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.options.enabled = enabled;
    }

    /// Current state without fetching.
    pub fn state(&self) -> LoadState<T> {
        if !self.options.enabled {
            return LoadState::disabled();
        }
        self.cache.state::<T>(&self.key).into()
    }

    /// Fetch if the entry has nothing usable, otherwise return cached state.
    ///
    /// An entry in the error state is not retried here; call
    /// [`refetch`](Self::refetch) to recover.
    pub async fn load(&self) -> LoadState<T> {
        if !self.options.enabled {
            return LoadState::disabled();
        }

        let current = self.cache.erased_state(&self.key);
        let needs_fetch = match current.status {
            QueryStatus::Idle | QueryStatus::Loading => true,
            QueryStatus::Success => {
                current.invalidated || current.is_stale(self.options.stale_time)
            }
            QueryStatus::Error => current.invalidated,
        };

        if !needs_fetch {
            debug!(key = %self.key, status = %current.status, "serving cached state");
            return current.downcast(&self.key).into();
        }

        self.cache
            .execute(&self.key, Arc::clone(&self.fetcher), self.options.retry, false)
            .await
            .downcast(&self.key)
            .into()
    }

    /// Re-invoke the fetch function for the current key regardless of
    /// cached state. No-op while disabled.
    pub async fn refetch(&self) -> LoadState<T> {
        if !self.options.enabled {
            return LoadState::disabled();
        }
        self.cache
            .execute(&self.key, Arc::clone(&self.fetcher), self.options.retry, true)
            .await
            .downcast(&self.key)
            .into()
    }

    /// Watch the bound entry. Rebinding the loader does not move an
    /// existing subscription.
    pub fn subscribe(&self) -> QueryStream<T> {
        self.cache.subscribe(&self.key)
    }

    /// Point the loader at a new key and fetch function.
    pub(crate) fn rebind(&mut self, key: QueryKey, fetcher: ErasedFetcher) {
        if key != self.key {
            debug!(from = %self.key, to = %key, "rebinding loader");
        }
        self.key = key;
        self.fetcher = fetcher;
    }
}
