// ── Keyed, deduplicating query cache ──
//
// The cache executor every loader and controller fetches through. Entries
// are type-erased so one cache can hold projects, employees, and
// evaluations side by side; typed views are recovered by downcasting.

mod entry;
mod retry;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::debug;

use self::entry::{CacheEntry, InFlight};
use self::retry::run_with_retry;
use crate::error::CoreError;
use crate::key::QueryKey;
use crate::stream::QueryStream;

pub use retry::RetryPolicy;

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;
pub(crate) type ErasedResult = Result<AnyValue, Arc<CoreError>>;
pub(crate) type ErasedState = QueryState<dyn Any + Send + Sync>;
pub(crate) type ErasedFetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, CoreError>> + Send + Sync>;

// ── QueryStatus / QueryState ────────────────────────────────────────

/// Lifecycle of a single cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Point-in-time view of one cache entry.
pub struct QueryState<T: ?Sized> {
    pub status: QueryStatus,
    /// Last successful value. Survives later errors and in-flight refetches.
    pub data: Option<Arc<T>>,
    pub error: Option<Arc<CoreError>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Set by [`QueryCache::invalidate`]; cleared by the next completed fetch.
    pub invalidated: bool,
}

impl<T: ?Sized> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Whether successful data is older than `stale_time`. Without a stale
    /// time, data never goes stale on its own.
    pub fn is_stale(&self, stale_time: Option<Duration>) -> bool {
        let (Some(updated_at), Some(stale_time)) = (self.updated_at, stale_time) else {
            return false;
        };
        chrono::Duration::from_std(stale_time)
            .is_ok_and(|limit| Utc::now() - updated_at >= limit)
    }
}

impl<T: ?Sized> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
            invalidated: self.invalidated,
        }
    }
}

impl<T: ?Sized> fmt::Debug for QueryState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("updated_at", &self.updated_at)
            .field("invalidated", &self.invalidated)
            .finish()
    }
}

impl ErasedState {
    /// Recover a typed view. A value of the wrong type is reported as an
    /// error state rather than a panic.
    pub(crate) fn downcast<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        let data = match &self.data {
            None => None,
            Some(any) => {
                if let Ok(value) = Arc::clone(any).downcast::<T>() {
                    Some(value)
                } else {
                    return QueryState {
                        status: QueryStatus::Error,
                        data: None,
                        error: Some(Arc::new(CoreError::KeyTypeMismatch {
                            key: key.to_string(),
                        })),
                        updated_at: self.updated_at,
                        invalidated: self.invalidated,
                    };
                }
            }
        };

        QueryState {
            status: self.status,
            data,
            error: self.error.clone(),
            updated_at: self.updated_at,
            invalidated: self.invalidated,
        }
    }
}

// ── QueryCache ──────────────────────────────────────────────────────

/// Shared, cheaply cloneable cache handle.
///
/// Clones observe the same entries: two loaders built on clones of one
/// cache with equal keys read and write the same state.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<DashMap<QueryKey, Arc<CacheEntry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch `key`, joining an identical request already in flight.
    pub async fn fetch<T, F, Fut, E>(
        &self,
        key: &QueryKey,
        fetch: F,
        retry: Option<RetryPolicy>,
    ) -> QueryState<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<CoreError> + 'static,
    {
        self.execute(key, erase(fetch), retry, false)
            .await
            .downcast(key)
    }

    /// Start a new request for `key` even if one is in flight or data is
    /// cached. An older request finishing afterwards is discarded.
    pub async fn refetch<T, F, Fut, E>(
        &self,
        key: &QueryKey,
        fetch: F,
        retry: Option<RetryPolicy>,
    ) -> QueryState<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<CoreError> + 'static,
    {
        self.execute(key, erase(fetch), retry, true)
            .await
            .downcast(key)
    }

    pub(crate) async fn execute(
        &self,
        key: &QueryKey,
        fetcher: ErasedFetcher,
        retry: Option<RetryPolicy>,
        force: bool,
    ) -> ErasedState {
        let entry = self.entry(key);

        let (generation, future) = {
            let mut slot = entry.inflight().lock().await;
            match slot.as_ref() {
                Some(flight) if !force => {
                    debug!(key = %key, generation = flight.generation, "joining in-flight fetch");
                    (flight.generation, flight.future.clone())
                }
                _ => {
                    let generation = entry.next_generation();
                    debug!(key = %key, generation, force, "starting fetch");
                    let policy = retry.unwrap_or_else(RetryPolicy::none);
                    let future = run_fetch(key.clone(), fetcher, policy).boxed().shared();
                    *slot = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    entry.mark_loading();
                    (generation, future)
                }
            }
        };

        let result = future.await;

        {
            let mut slot = entry.inflight().lock().await;
            if slot.as_ref().is_some_and(|f| f.generation == generation) {
                *slot = None;
                entry.publish(result);
            } else if slot.is_some() {
                debug!(key = %key, generation, "discarding superseded response");
            }
        }

        entry.snapshot()
    }

    /// Current state for `key`; `Idle` if the key was never fetched.
    pub fn state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        self.erased_state(key).downcast(key)
    }

    pub(crate) fn erased_state(&self, key: &QueryKey) -> ErasedState {
        self.entries
            .get(key)
            .map_or_else(ErasedState::idle, |e| e.value().snapshot())
    }

    /// Subscribe to every state change of `key`.
    pub fn subscribe<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryStream<T> {
        QueryStream::new(key.clone(), self.entry(key).subscribe())
    }

    /// Mark every entry whose key starts with `prefix` as stale. Returns the
    /// number of entries touched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut touched = 0;
        for item in self.entries.iter() {
            if item.key().starts_with(prefix) {
                item.value().invalidate();
                touched += 1;
            }
        }
        debug!(prefix = %prefix, touched, "invalidated cache entries");
        touched
    }

    /// Drop an entry. Existing subscribers stop receiving updates.
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn entry(&self, key: &QueryKey) -> Arc<CacheEntry> {
        Arc::clone(
            self.entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(CacheEntry::new()))
                .value(),
        )
    }
}

/// Box a typed fetch function into the cache's erased form.
pub(crate) fn erase<T, F, Fut, E>(fetch: F) -> ErasedFetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<CoreError> + 'static,
{
    Arc::new(move || {
        let fut = fetch();
        async move {
            let result: Result<AnyValue, CoreError> = fut
                .await
                .map(|value| Arc::new(value) as AnyValue)
                .map_err(Into::into);
            result
        }
        .boxed()
    })
}

async fn run_fetch(key: QueryKey, fetcher: ErasedFetcher, policy: RetryPolicy) -> ErasedResult {
    run_with_retry(&key, policy, || fetcher())
        .await
        .map_err(Arc::new)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::sync::Notify;

    use super::*;
    use crate::query_key;

    fn counting_fetch(
        calls: &Arc<AtomicU32>,
    ) -> impl Fn() -> BoxFuture<'static, Result<u32, CoreError>> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n) }.boxed()
        }
    }

    #[tokio::test]
    async fn unknown_key_is_idle() {
        let cache = QueryCache::new();
        let state: QueryState<u32> = cache.state(&query_key!["nothing"]);
        assert!(state.is_idle());
        assert!(state.data.is_none());
    }

    #[tokio::test]
    async fn fetch_publishes_success() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let key = query_key!["projects"];

        let state = cache.fetch(&key, counting_fetch(&calls), None).await;
        assert!(state.is_success());
        assert_eq!(state.data.as_deref(), Some(&1));
        assert!(state.updated_at.is_some());

        let again: QueryState<u32> = cache.state(&key);
        assert_eq!(again.data.as_deref(), Some(&1));
    }

    #[tokio::test]
    async fn identical_keys_in_flight_are_coalesced() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let gate = Arc::new(Notify::new());
        let key = query_key!["employees"];

        let fetch = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let gate = Arc::clone(&gate);
                async move {
                    gate.notified().await;
                    Ok::<_, CoreError>(7_u32)
                }
            }
        };

        let first = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            let fetch = fetch.clone();
            async move { cache.fetch(&key, fetch, None).await }
        });
        let second = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            async move { cache.fetch(&key, fetch, None).await }
        });

        // Let both tasks register before releasing the request.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(cache.state::<u32>(&key).is_loading());
        gate.notify_waiters();

        let a = first.await.unwrap();
        let b = second.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.data.as_deref(), Some(&7));
        assert_eq!(b.data.as_deref(), Some(&7));
    }

    #[tokio::test]
    async fn distinct_keys_are_independent() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .fetch(&query_key!["projects", 1_u32], counting_fetch(&calls), None)
            .await;
        cache
            .fetch(&query_key!["projects", 2_u32], counting_fetch(&calls), None)
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn error_keeps_previous_data() {
        let cache = QueryCache::new();
        let key = query_key!["projects"];

        cache
            .fetch(&key, || async { Ok::<_, CoreError>(5_u32) }, None)
            .await;
        let state: QueryState<u32> = cache
            .refetch(
                &key,
                || async { Err::<u32, _>(CoreError::Internal("down".into())) },
                None,
            )
            .await;

        assert!(state.is_error());
        assert_eq!(state.data.as_deref(), Some(&5));
        assert_eq!(
            state.error.unwrap().to_string(),
            "Internal error: down"
        );
    }

    #[tokio::test]
    async fn superseded_response_is_discarded() {
        let cache = QueryCache::new();
        let key = query_key!["evaluations"];
        let slow_gate = Arc::new(Notify::new());

        // Slow request for "old" data, started first.
        let slow = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            let gate = Arc::clone(&slow_gate);
            async move {
                cache
                    .fetch(
                        &key,
                        move || {
                            let gate = Arc::clone(&gate);
                            async move {
                                gate.notified().await;
                                Ok::<_, CoreError>("old")
                            }
                        },
                        None,
                    )
                    .await
            }
        });
        tokio::task::yield_now().await;

        // A forced refetch supersedes it and completes first.
        let fresh: QueryState<&'static str> = cache
            .refetch(&key, || async { Ok::<_, CoreError>("new") }, None)
            .await;
        assert_eq!(fresh.data.as_deref(), Some(&"new"));

        slow_gate.notify_waiters();
        slow.await.unwrap();

        let state: QueryState<&'static str> = cache.state(&key);
        assert_eq!(state.data.as_deref(), Some(&"new"));
        assert!(state.is_success());
    }

    #[tokio::test]
    async fn wrong_type_reports_mismatch() {
        let cache = QueryCache::new();
        let key = query_key!["projects"];
        cache
            .fetch(&key, || async { Ok::<_, CoreError>(1_u32) }, None)
            .await;

        let state: QueryState<String> = cache.state(&key);
        assert!(state.is_error());
        assert!(matches!(
            state.error.as_deref(),
            Some(CoreError::KeyTypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn invalidate_marks_prefix_matches() {
        let cache = QueryCache::new();
        for key in [
            query_key!["projects", 1_u32],
            query_key!["projects", 2_u32],
            query_key!["employees"],
        ] {
            cache
                .fetch(&key, || async { Ok::<_, CoreError>(0_u32) }, None)
                .await;
        }

        assert_eq!(cache.invalidate(&query_key!["projects"]), 2);
        assert!(cache.state::<u32>(&query_key!["projects", 1_u32]).invalidated);
        assert!(!cache.state::<u32>(&query_key!["employees"]).invalidated);
    }

    #[tokio::test]
    async fn subscribers_see_published_state() {
        let cache = QueryCache::new();
        let key = query_key!["projects"];
        let mut stream = cache.subscribe::<u32>(&key);
        assert!(stream.current().is_idle());

        cache
            .fetch(&key, || async { Ok::<_, CoreError>(9_u32) }, None)
            .await;

        let latest = stream.latest();
        assert_eq!(latest.data.as_deref(), Some(&9));
        let changed = stream.changed().await.unwrap();
        assert!(changed.is_success());
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let cache = QueryCache::new();
        let key = query_key!["projects"];
        cache
            .fetch(&key, || async { Ok::<_, CoreError>(1_u32) }, None)
            .await;
        assert!(cache.contains(&key));
        assert!(cache.remove(&key));
        assert!(!cache.remove(&key));

        cache
            .fetch(&key, || async { Ok::<_, CoreError>(1_u32) }, None)
            .await;
        cache.clear();
        assert!(cache.is_empty());
    }
}
