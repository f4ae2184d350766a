// ── Single cache entry ──
//
// One entry per `QueryKey`. State is published through a `watch` channel so
// any number of loaders observing the same key see the same value. The
// in-flight slot holds a `Shared` future that later callers join instead of
// starting a duplicate request.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::{Mutex, watch};

use super::{ErasedResult, ErasedState, QueryStatus};

/// A request currently running for this entry.
pub(super) struct InFlight {
    pub generation: u64,
    pub future: Shared<BoxFuture<'static, ErasedResult>>,
}

pub(crate) struct CacheEntry {
    state: watch::Sender<ErasedState>,
    inflight: Mutex<Option<InFlight>>,
    /// Bumped for every request started; only the newest may publish.
    generation: AtomicU64,
}

impl CacheEntry {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(ErasedState::idle());
        Self {
            state,
            inflight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> ErasedState {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ErasedState> {
        self.state.subscribe()
    }

    pub(super) fn inflight(&self) -> &Mutex<Option<InFlight>> {
        &self.inflight
    }

    pub(super) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Mark a request as started. Previous data stays visible.
    pub(super) fn mark_loading(&self) {
        self.state.send_modify(|s| s.status = QueryStatus::Loading);
    }

    /// Mark cached data as stale so the next load refetches it.
    pub(crate) fn invalidate(&self) {
        self.state.send_modify(|s| s.invalidated = true);
    }

    /// Publish the outcome of a finished request.
    ///
    /// Errors keep the last successful data around; success replaces it.
    pub(super) fn publish(&self, result: ErasedResult) {
        // `send_modify` updates unconditionally, even with zero receivers.
        self.state.send_modify(|s| {
            s.invalidated = false;
            match result {
                Ok(value) => {
                    s.status = QueryStatus::Success;
                    s.data = Some(value);
                    s.error = None;
                    s.updated_at = Some(Utc::now());
                }
                Err(error) => {
                    s.status = QueryStatus::Error;
                    s.error = Some(error);
                }
            }
        });
    }
}
