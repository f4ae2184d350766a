// ── Runtime loader defaults ──
//
// Process-wide tuning for loaders and list controllers. Never touches
// disk: the config crate builds a `LoaderDefaults` and hands it in.

use std::time::Duration;

use crate::cache::RetryPolicy;
use crate::loader::LoaderOptions;
use crate::paginate::PaginationOptions;

/// Defaults applied to every loader a consumer builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderDefaults {
    /// Initial page size for list controllers.
    pub page_size: u32,
    /// Retry policy for fetches. `None` tries once.
    pub retry: Option<RetryPolicy>,
    /// How long successful data stays fresh. `None` = until invalidated.
    pub stale_time: Option<Duration>,
}

impl Default for LoaderDefaults {
    fn default() -> Self {
        Self {
            page_size: 10,
            retry: None,
            stale_time: None,
        }
    }
}

impl LoaderDefaults {
    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            enabled: true,
            retry: self.retry,
            stale_time: self.stale_time,
        }
    }

    /// Pagination options starting at page 1 with the configured page size.
    pub fn pagination_options(&self) -> PaginationOptions {
        PaginationOptions {
            page_size: self.page_size.max(1),
            loader: self.loader_options(),
            ..PaginationOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_options_carry_page_size_and_retry() {
        let defaults = LoaderDefaults {
            page_size: 25,
            retry: Some(RetryPolicy::default()),
            stale_time: None,
        };
        let opts = defaults.pagination_options();
        assert_eq!(opts.page, 1);
        assert_eq!(opts.page_size, 25);
        assert_eq!(opts.loader.retry, Some(RetryPolicy::default()));
    }

    #[test]
    fn zero_page_size_is_raised_to_one() {
        let defaults = LoaderDefaults {
            page_size: 0,
            ..LoaderDefaults::default()
        };
        assert_eq!(defaults.pagination_options().page_size, 1);
    }
}
