//! Paged list plumbing shared by every `list` command.
//!
//! Each list command drives a `PaginatedDataController`; `--all` keeps
//! advancing the page until the server reports no more.

use std::future::Future;

use perfdesk_core::{
    Page, PageParams, PageView, PaginatedDataController, PaginationOptions, QueryCache, QueryKey,
};

use crate::cli::{ListArgs, OutputFormat};
use crate::error::CliError;

use super::Context;
use super::util;

/// Rows gathered from one or more pages.
#[derive(Debug)]
pub struct Listing<T> {
    pub rows: Vec<T>,
    /// Last page fetched.
    pub page: u32,
    pub pages: u32,
    pub total: u64,
    pub all: bool,
}

/// Cache key prefix shared by every page of `resource`.
pub fn resource_key(resource: &str) -> QueryKey {
    QueryKey::new().with(resource)
}

/// Mark every cached page of `resource` stale after a successful write.
pub fn invalidate(cache: &QueryCache, resource: &str) {
    let touched = cache.invalidate(&resource_key(resource));
    tracing::debug!(resource, touched, "list cache invalidated");
}

/// Translate list flags into controller options on top of config defaults.
pub fn pagination_options(ctx: &Context, args: &ListArgs) -> Result<PaginationOptions, CliError> {
    let mut options = ctx.defaults.pagination_options();
    options.page = args.page;
    if let Some(size) = args.page_size {
        options = options.page_size(size);
    }
    for raw in &args.filters {
        let (name, value) = util::parse_key_value("filter", raw)?;
        options = options.filter(name, util::filter_value(value));
    }
    if let Some(keyword) = &args.keyword {
        options = options.keyword(keyword.clone());
    }
    if let Some(raw) = &args.sort {
        let (field, direction) = util::parse_sort(raw)?;
        options = options.order_by(field, direction);
    }
    Ok(options)
}

/// Walks pages of one resource through a `PaginatedDataController`.
pub struct PageWalker<T> {
    controller: PaginatedDataController<T>,
    profile: String,
    all: bool,
    started: bool,
    last_pages: u32,
}

impl<T: Send + Sync + 'static> PageWalker<T> {
    pub fn new<F, Fut>(
        ctx: &Context,
        resource: &'static str,
        options: PaginationOptions,
        all: bool,
        fetch: F,
    ) -> Self
    where
        F: Fn(PageParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>, perfdesk_api::Error>> + Send + 'static,
    {
        Self {
            controller: PaginatedDataController::new(
                ctx.cache.clone(),
                resource_key(resource),
                fetch,
                options,
            ),
            profile: ctx.profile.clone(),
            all,
            started: false,
            last_pages: 0,
        }
    }

    /// The next page, or `None` once done. A failed fetch ends the walk
    /// with the error.
    pub async fn next_page(&mut self) -> Result<Option<PageView<T>>, CliError> {
        if self.started {
            let current = self.controller.pagination();
            if !self.all || current.page >= self.last_pages {
                return Ok(None);
            }
            self.controller
                .handle_page_change(current.page + 1, current.page_size);
        }
        self.started = true;

        let view = self.controller.load().await;
        if view.is_error {
            if let Some(err) = view.error.as_deref() {
                return Err(CliError::from_core(err, &self.profile));
            }
        }
        tracing::debug!(
            page = view.pagination.page,
            pages = view.pages(),
            rows = view.data().len(),
            "page loaded"
        );
        self.last_pages = view.pages();
        Ok(Some(view))
    }
}

/// Fetch one page, or every page with `--all`.
pub async fn collect<T, F, Fut>(
    ctx: &Context,
    resource: &'static str,
    args: &ListArgs,
    fetch: F,
) -> Result<Listing<T>, CliError>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(PageParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page<T>, perfdesk_api::Error>> + Send + 'static,
{
    let options = pagination_options(ctx, args)?;
    let mut walker = PageWalker::new(ctx, resource, options, args.all, fetch);

    let mut listing = Listing {
        rows: Vec::new(),
        page: args.page.max(1),
        pages: 0,
        total: 0,
        all: args.all,
    };
    while let Some(view) = walker.next_page().await? {
        listing.rows.extend_from_slice(view.data());
        listing.page = view.pagination.page;
        listing.pages = view.pages();
        listing.total = view.total();
    }
    Ok(listing)
}

/// `page 2/6 (57 total)` on stderr, for table output of a single page.
pub fn print_footer<T>(ctx: &Context, listing: &Listing<T>) {
    if ctx.quiet || listing.all || ctx.output != OutputFormat::Table {
        return;
    }
    eprintln!(
        "page {}/{} ({} total)",
        listing.page, listing.pages, listing.total
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use perfdesk_core::CoreError;

    use super::*;

    #[tokio::test]
    async fn invalidate_marks_only_that_resource() {
        let cache = QueryCache::new();
        let projects = resource_key("projects").with(1_u32);
        let employees = resource_key("employees").with(1_u32);
        for key in [&projects, &employees] {
            cache
                .fetch(key, || async { Ok::<_, CoreError>(0_u32) }, None)
                .await;
        }

        invalidate(&cache, "projects");

        assert!(cache.state::<u32>(&projects).invalidated);
        assert!(!cache.state::<u32>(&employees).invalidated);
    }
}
