// ── Reactive query streams ──
//
// Subscription handles for watching one cache entry change over time.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::cache::{ErasedState, QueryState};
use crate::key::QueryKey;

/// A subscription to a single cache entry.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed) or by converting to a `Stream`.
pub struct QueryStream<T: Send + Sync + 'static> {
    key: QueryKey,
    current: QueryState<T>,
    receiver: watch::Receiver<ErasedState>,
}

impl<T: Send + Sync + 'static> QueryStream<T> {
    pub(crate) fn new(key: QueryKey, receiver: watch::Receiver<ErasedState>) -> Self {
        let current = receiver.borrow().downcast(&key);
        Self {
            key,
            current,
            receiver,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// State captured at creation time, or at the last [`changed`](Self::changed).
    pub fn current(&self) -> &QueryState<T> {
        &self.current
    }

    /// Latest state (may have changed since creation).
    pub fn latest(&self) -> QueryState<T> {
        self.receiver.borrow().downcast(&self.key)
    }

    /// Wait for the next change, returning the new state.
    /// Returns `None` once the entry has been removed from the cache.
    pub async fn changed(&mut self) -> Option<QueryState<T>> {
        self.receiver.changed().await.ok()?;
        let state = self.receiver.borrow_and_update().downcast(&self.key);
        self.current = state.clone();
        Some(state)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> QueryWatchStream<T> {
        QueryWatchStream {
            key: self.key,
            inner: WatchStream::new(self.receiver),
            _marker: PhantomData,
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the entry's current state first, then every later change.
pub struct QueryWatchStream<T> {
    key: QueryKey,
    inner: WatchStream<ErasedState>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Stream for QueryWatchStream<T> {
    type Item = QueryState<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner)
            .poll_next(cx)
            .map(|next| next.map(|state| state.downcast(&this.key)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;

    use crate::cache::QueryCache;
    use crate::error::CoreError;
    use crate::query_key;

    #[tokio::test]
    async fn stream_yields_initial_then_updates() {
        let cache = QueryCache::new();
        let key = query_key!["qualifications"];
        let mut stream = cache.subscribe::<u32>(&key).into_stream();

        let first = stream.next().await.unwrap();
        assert!(first.is_idle());

        cache
            .fetch(&key, || async { Ok::<_, CoreError>(3_u32) }, None)
            .await;

        let next = stream.next().await.unwrap();
        assert_eq!(next.data.as_deref(), Some(&3));
    }

    #[tokio::test]
    async fn changed_ends_when_entry_removed() {
        let cache = QueryCache::new();
        let key = query_key!["qualifications"];
        let mut sub = cache.subscribe::<u32>(&key);
        assert!(cache.remove(&key));
        assert!(sub.changed().await.is_none());
    }
}
