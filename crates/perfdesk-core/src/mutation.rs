// ── Single-flight mutation executor ──
//
// Wraps a submit function so that at most one invocation is in flight per
// instance. A second `mutate` while one is pending is rejected without
// touching state; it is never queued.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::CoreError;

type SubmitFn<I, R> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<R, CoreError>> + Send + Sync>;
type SuccessFn<I, R> = Arc<dyn Fn(&R, &I) + Send + Sync>;
type ErrorFn<I> = Arc<dyn Fn(&CoreError, &I) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

/// Observable outcome of the most recent invocation.
pub struct MutationState<R> {
    pub status: MutationStatus,
    pub data: Option<Arc<R>>,
    pub error: Option<Arc<CoreError>>,
}

impl<R> MutationState<R> {
    fn idle() -> Self {
        Self {
            status: MutationStatus::Idle,
            data: None,
            error: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == MutationStatus::Error
    }
}

impl<R> Clone for MutationState<R> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

impl<R> fmt::Debug for MutationState<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationState")
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// Optional hooks run once per completed invocation.
pub struct MutationCallbacks<I, R> {
    on_success: Option<SuccessFn<I, R>>,
    on_error: Option<ErrorFn<I>>,
}

impl<I, R> Default for MutationCallbacks<I, R> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<I, R> MutationCallbacks<I, R> {
    pub fn on_success(mut self, f: impl Fn(&R, &I) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&CoreError, &I) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

struct Inner<I, R> {
    submit: SubmitFn<I, R>,
    state: watch::Sender<MutationState<R>>,
    in_flight: AtomicBool,
    callbacks: MutationCallbacks<I, R>,
}

/// Cloneable handle; clones share the same in-flight guard and state.
pub struct Mutation<I, R> {
    inner: Arc<Inner<I, R>>,
}

impl<I, R> Clone for Mutation<I, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, R> Mutation<I, R>
where
    I: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    pub fn new<F, Fut, E>(submit: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<CoreError> + 'static,
    {
        Self::with_callbacks(submit, MutationCallbacks::default())
    }

    pub fn with_callbacks<F, Fut, E>(submit: F, callbacks: MutationCallbacks<I, R>) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<CoreError> + 'static,
    {
        let submit: SubmitFn<I, R> = Arc::new(move |input: I| {
            let fut = submit(input);
            async move { fut.await.map_err(Into::<CoreError>::into) }.boxed()
        });
        let (state, _) = watch::channel(MutationState::idle());
        Self {
            inner: Arc::new(Inner {
                submit,
                state,
                in_flight: AtomicBool::new(false),
                callbacks,
            }),
        }
    }

    /// Run the submit function once.
    ///
    /// Returns [`CoreError::MutationInFlight`] without side effects if another
    /// invocation on this instance has not finished yet.
    pub async fn mutate(&self, input: I) -> Result<Arc<R>, Arc<CoreError>> {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("mutation rejected: already in flight");
            return Err(Arc::new(CoreError::MutationInFlight));
        }
        let mut guard = FlightGuard {
            inner: &self.inner,
            completed: false,
        };

        self.inner.state.send_modify(|s| {
            s.status = MutationStatus::Pending;
            s.error = None;
        });
        debug!("mutation started");

        let outcome = (self.inner.submit)(input.clone()).await;
        guard.completed = true;

        match outcome {
            Ok(data) => {
                let data = Arc::new(data);
                self.inner.state.send_replace(MutationState {
                    status: MutationStatus::Success,
                    data: Some(Arc::clone(&data)),
                    error: None,
                });
                drop(guard);
                debug!("mutation succeeded");
                if let Some(cb) = &self.inner.callbacks.on_success {
                    cb(&data, &input);
                }
                Ok(data)
            }
            Err(e) => {
                let error = Arc::new(e);
                self.inner.state.send_modify(|s| {
                    s.status = MutationStatus::Error;
                    s.error = Some(Arc::clone(&error));
                });
                drop(guard);
                warn!(error = %error, "mutation failed");
                if let Some(cb) = &self.inner.callbacks.on_error {
                    cb(&error, &input);
                }
                Err(error)
            }
        }
    }

    pub fn state(&self) -> MutationState<R> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MutationState<R>> {
        self.inner.state.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Return to idle. Ignored while an invocation is pending.
    pub fn reset(&self) {
        if self.is_pending() {
            debug!("mutation reset ignored while pending");
            return;
        }
        self.inner.state.send_replace(MutationState::idle());
    }
}

/// Releases the in-flight flag when `mutate` finishes or is dropped midway.
struct FlightGuard<'a, I, R> {
    inner: &'a Inner<I, R>,
    completed: bool,
}

impl<I, R> Drop for FlightGuard<'_, I, R> {
    fn drop(&mut self) {
        if !self.completed {
            // Cancelled before the submit function resolved.
            self.inner.state.send_modify(|s| s.status = MutationStatus::Idle);
        }
        self.inner.in_flight.store(false, Ordering::Release);
    }
}
