//! Data-access and interaction-state layer for perfdesk screens.
//!
//! Every list, table, and form in perfdesk composes the same handful of
//! building blocks instead of hand-rolling fetch, pagination, validation,
//! and selection logic:
//!
//! - **[`QueryCache`]**: Keyed, deduplicating async-fetch executor. Entries
//!   live in a `DashMap` and publish their [`QueryState`] through
//!   `tokio::sync::watch` channels. Identical keys in flight are coalesced;
//!   stale responses are dropped by a per-entry request generation.
//!
//! - **[`Mutation`]**: Single-flight submission executor with observable
//!   pending/success/error state.
//!
//! - **[`DataLoader`]**: Binds one [`QueryKey`] and one fetch function to the
//!   cache, adding an `enabled` gate and optional retry with backoff.
//!
//! - **[`PaginatedDataController`]**: Page/size/filter/keyword/sort state on
//!   top of a `DataLoader`; every parameter is folded into the query key.
//!
//! - **[`FormController`]**: Field values, errors, and touched flags, with
//!   submission delegated to a `Mutation`.
//!
//! - **[`SelectionController`]**: Selected row keys reconciled against the
//!   latest data array.
//!
//! - **[`SessionContext`]**: Current user, loaded once per process and
//!   handed to consumers explicitly.
//!
//! Handlers are synchronous state transitions; only fetches and submissions
//! are `async`, and they run on the caller's runtime. Nothing here spawns
//! background tasks.

pub mod cache;
pub mod config;
pub mod error;
pub mod form;
pub mod key;
pub mod loader;
pub mod mutation;
pub mod paginate;
pub mod selection;
pub mod session;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{QueryCache, QueryState, QueryStatus, RetryPolicy};
pub use config::LoaderDefaults;
pub use error::CoreError;
pub use form::{FieldErrors, FieldValues, FormController, FormOptions, SubmitOutcome, field_values};
pub use key::{Filters, KeyPart, QueryKey};
pub use loader::{DataLoader, LoadState, LoaderOptions};
pub use mutation::{Mutation, MutationCallbacks, MutationState, MutationStatus};
pub use paginate::{
    Page, PageParams, PageView, PaginatedDataController, Pagination, PaginationOptions, Sort,
    SortDirection,
};
pub use selection::{RowKey, SelectionController, SelectionOptions, StaleKeys};
pub use session::{CurrentUser, SessionContext};
pub use stream::{QueryStream, QueryWatchStream};
