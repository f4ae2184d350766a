// ── Paginated list controller ──
//
// Page/size/filter/keyword/sort state on top of a `DataLoader`. Every
// parameter is folded into the query key, so changing any of them selects a
// different cache entry and the next `load` fetches it.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{ErasedFetcher, QueryCache, erase};
use crate::error::CoreError;
use crate::key::{Filters, KeyPart, QueryKey};
use crate::loader::{DataLoader, LoadState, LoaderOptions};
use crate::stream::QueryStream;

// ── Value types ─────────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    pub field: Option<String>,
    pub direction: SortDirection,
}

/// Parameters handed to the fetch function for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page: u32,
    pub page_size: u32,
    pub filters: Filters,
    /// `None` when the keyword is empty.
    pub keyword: Option<String>,
    pub order_by: Option<String>,
    pub order_direction: SortDirection,
}

impl PageParams {
    /// Structural key component covering every parameter.
    pub fn to_key_part(&self) -> KeyPart {
        let mut map = BTreeMap::new();
        map.insert("page".to_owned(), KeyPart::from(self.page));
        map.insert("pageSize".to_owned(), KeyPart::from(self.page_size));
        map.insert("filters".to_owned(), KeyPart::Map(self.filters.clone()));
        map.insert("keyword".to_owned(), KeyPart::from(self.keyword.clone()));
        map.insert("orderBy".to_owned(), KeyPart::from(self.order_by.clone()));
        map.insert(
            "orderDirection".to_owned(),
            KeyPart::from(self.order_direction.to_string()),
        );
        KeyPart::Map(map)
    }

    /// Flatten into query-string pairs: paging and sort first, then one pair
    /// per non-null filter.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_owned(), self.page.to_string()),
            ("pageSize".to_owned(), self.page_size.to_string()),
        ];
        if let Some(keyword) = &self.keyword {
            pairs.push(("keyword".to_owned(), keyword.clone()));
        }
        if let Some(order_by) = &self.order_by {
            pairs.push(("orderBy".to_owned(), order_by.clone()));
            pairs.push(("orderDirection".to_owned(), self.order_direction.to_string()));
        }
        pairs.extend(
            self.filters
                .iter()
                .filter_map(|(name, value)| value.to_param_string().map(|v| (name.clone(), v))),
        );
        pairs
    }
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default)]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u32,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            pages: 0,
        }
    }
}

/// Construction-time defaults. `filters` and `keyword` are what
/// [`PaginatedDataController::reset_filters`] restores.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationOptions {
    pub page: u32,
    pub page_size: u32,
    pub filters: Filters,
    pub keyword: String,
    pub order_by: Option<String>,
    pub order_direction: SortDirection,
    pub loader: LoaderOptions,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            filters: Filters::new(),
            keyword: String::new(),
            order_by: None,
            order_direction: SortDirection::Desc,
            loader: LoaderOptions::default(),
        }
    }
}

impl PaginationOptions {
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<KeyPart>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some(field.into());
        self.order_direction = direction;
        self
    }

    pub fn loader(mut self, loader: LoaderOptions) -> Self {
        self.loader = loader;
        self
    }
}

/// Everything a list screen renders. `data()`, `total()` and `pages()`
/// fall back to empty/zero before the first successful response.
#[derive(Debug)]
pub struct PageView<T> {
    pub page: Option<Arc<Page<T>>>,
    pub pagination: Pagination,
    pub filters: Filters,
    pub keyword: String,
    pub order_by: Option<String>,
    pub order_direction: SortDirection,
    pub is_loading: bool,
    pub is_success: bool,
    pub is_error: bool,
    pub error: Option<Arc<CoreError>>,
}

impl<T> PageView<T> {
    pub fn data(&self) -> &[T] {
        self.page
            .as_ref()
            .map(|p| p.data.as_slice())
            .unwrap_or_default()
    }

    pub fn total(&self) -> u64 {
        self.page.as_ref().map_or(0, |p| p.total)
    }

    pub fn pages(&self) -> u32 {
        self.page.as_ref().map_or(0, |p| p.pages)
    }

    pub fn has_next_page(&self) -> bool {
        self.pagination.page < self.pages()
    }
}

// ── Controller ──────────────────────────────────────────────────────

type PageFetcher<T> =
    Arc<dyn Fn(PageParams) -> BoxFuture<'static, Result<Page<T>, CoreError>> + Send + Sync>;

pub struct PaginatedDataController<T> {
    loader: DataLoader<Page<T>>,
    base_key: QueryKey,
    fetch: PageFetcher<T>,
    pagination: Pagination,
    filters: Filters,
    keyword: String,
    sort: Sort,
    default_filters: Filters,
    default_keyword: String,
}

impl<T: Send + Sync + 'static> PaginatedDataController<T> {
    pub fn new<F, Fut, E>(
        cache: QueryCache,
        base_key: QueryKey,
        fetch: F,
        options: PaginationOptions,
    ) -> Self
    where
        F: Fn(PageParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>, E>> + Send + 'static,
        E: Into<CoreError> + 'static,
    {
        let fetch: PageFetcher<T> = Arc::new(move |params: PageParams| {
            let fut = fetch(params);
            async move { fut.await.map_err(Into::<CoreError>::into) }.boxed()
        });

        let pagination = clamp(options.page, options.page_size);
        let sort = Sort {
            field: options.order_by,
            direction: options.order_direction,
        };
        let params = build_params(pagination, &options.filters, &options.keyword, &sort);
        let (key, fetcher) = bind(&base_key, &fetch, params);

        Self {
            loader: DataLoader::from_erased(cache, key, fetcher, options.loader),
            base_key,
            fetch,
            pagination,
            default_filters: options.filters.clone(),
            default_keyword: options.keyword.clone(),
            filters: options.filters,
            keyword: options.keyword,
            sort,
        }
    }

    // ── Handlers ─────────────────────────────────────────────────────

    /// Move to `page` with `page_size`. Filters and sort are kept.
    pub fn handle_page_change(&mut self, page: u32, page_size: u32) {
        self.pagination = clamp(page, page_size);
        self.rebind();
    }

    /// Replace the filter set wholesale and go back to page 1.
    pub fn handle_filter_change(&mut self, filters: Filters) {
        self.filters = filters;
        self.pagination.page = 1;
        self.rebind();
    }

    /// Replace the keyword and go back to page 1.
    pub fn set_keyword(&mut self, keyword: impl Into<String>) {
        self.keyword = keyword.into();
        self.pagination.page = 1;
        self.rebind();
    }

    pub fn handle_sort_change(&mut self, field: Option<String>, direction: SortDirection) {
        self.sort = Sort { field, direction };
        self.rebind();
    }

    /// Restore the construction-time filters and keyword, back to page 1.
    pub fn reset_filters(&mut self) {
        self.filters = self.default_filters.clone();
        self.keyword = self.default_keyword.clone();
        self.pagination.page = 1;
        self.rebind();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.loader.set_enabled(enabled);
    }

    // ── Fetching ─────────────────────────────────────────────────────

    pub async fn load(&self) -> PageView<T> {
        let state = self.loader.load().await;
        self.view(state)
    }

    pub async fn refetch(&self) -> PageView<T> {
        let state = self.loader.refetch().await;
        self.view(state)
    }

    pub fn snapshot(&self) -> PageView<T> {
        self.view(self.loader.state())
    }

    pub fn subscribe(&self) -> QueryStream<Page<T>> {
        self.loader.subscribe()
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn params(&self) -> PageParams {
        build_params(self.pagination, &self.filters, &self.keyword, &self.sort)
    }

    pub fn query_key(&self) -> &QueryKey {
        self.loader.key()
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebind(&mut self) {
        let (key, fetcher) = bind(&self.base_key, &self.fetch, self.params());
        self.loader.rebind(key, fetcher);
    }

    fn view(&self, state: LoadState<Page<T>>) -> PageView<T> {
        PageView {
            page: state.data,
            pagination: self.pagination,
            filters: self.filters.clone(),
            keyword: self.keyword.clone(),
            order_by: self.sort.field.clone(),
            order_direction: self.sort.direction,
            is_loading: state.is_loading,
            is_success: state.is_success,
            is_error: state.is_error,
            error: state.error,
        }
    }
}

fn clamp(page: u32, page_size: u32) -> Pagination {
    if page == 0 || page_size == 0 {
        warn!(page, page_size, "page and page size must be at least 1, clamping");
    }
    Pagination {
        page: page.max(1),
        page_size: page_size.max(1),
    }
}

fn build_params(pagination: Pagination, filters: &Filters, keyword: &str, sort: &Sort) -> PageParams {
    PageParams {
        page: pagination.page,
        page_size: pagination.page_size,
        filters: filters.clone(),
        keyword: (!keyword.is_empty()).then(|| keyword.to_owned()),
        order_by: sort.field.clone(),
        order_direction: sort.direction,
    }
}

fn bind<T: Send + Sync + 'static>(
    base_key: &QueryKey,
    fetch: &PageFetcher<T>,
    params: PageParams,
) -> (QueryKey, ErasedFetcher) {
    let key = base_key.clone().with(params.to_key_part());
    debug!(key = %key, "bound page query");
    let fetch = Arc::clone(fetch);
    let fetcher = erase(move || fetch(params.clone()));
    (key, fetcher)
}
