//! Cache-backed paginated search.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use searchlight_core::config::SearchConfig;
use searchlight_core::{QueryCache, ServeError};
use tracing::{debug, info, warn};

use crate::locator::Locator;
use crate::types::{PaginationRequest, SearchPage, SearchResultRecord};

/// How many paths are stat'ed at once while building a page.
const STAT_CONCURRENCY: usize = 16;

/// Serves search pages from the query cache, asking the locator on a miss.
///
/// Only the requested window is stat'ed; `total_count` always reflects the
/// full cached list even when some of its paths have since disappeared.
pub struct PaginatedSearchService {
    cache: Arc<QueryCache>,
    locator: Arc<dyn Locator>,
    config: SearchConfig,
}

impl PaginatedSearchService {
    /// Creates a service sharing `cache` with the rest of the server.
    pub fn new(cache: Arc<QueryCache>, locator: Arc<dyn Locator>, config: SearchConfig) -> Self {
        Self {
            cache,
            locator,
            config,
        }
    }

    /// The shared query cache.
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Page size limits and backend settings.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Clamps raw query-string values into a request for this service.
    pub fn request(
        &self,
        query: &str,
        page: Option<&str>,
        page_size: Option<&str>,
    ) -> PaginationRequest {
        PaginationRequest::from_raw(query, page, page_size, &self.config)
    }

    /// Resolves one page of results.
    ///
    /// # Errors
    /// - `ServeError::InvalidArgument` - Query is empty
    /// - `ServeError::Upstream` - Cache miss and every backend failed
    pub async fn search(&self, request: &PaginationRequest) -> Result<SearchPage, ServeError> {
        let (paths, from_cache) = self.paths_for(&request.query).await?;

        let total_count = paths.len();
        let total_pages = request.total_pages(total_count);
        let window = request.window(total_count);
        debug!(
            "Page {} of '{}' covers paths {}..{} of {}",
            request.page, request.query, window.start, window.end, total_count
        );

        let records = stat_records(&paths[window]).await;

        info!(
            "Search '{}' page {}/{}: {} records of {} total ({})",
            request.query,
            request.page,
            total_pages,
            records.len(),
            total_count,
            if from_cache { "cached" } else { "fresh" }
        );

        Ok(SearchPage {
            records,
            total_count,
            page: request.page,
            page_size: request.page_size,
            total_pages,
            from_cache,
        })
    }

    /// Resolves every result for `query` without paging.
    ///
    /// # Errors
    /// - `ServeError::InvalidArgument` - Query is empty
    /// - `ServeError::Upstream` - Cache miss and every backend failed
    pub async fn search_all(&self, query: &str) -> Result<Vec<SearchResultRecord>, ServeError> {
        let (paths, _) = self.paths_for(query).await?;
        Ok(stat_records(&paths).await)
    }

    async fn paths_for(&self, query: &str) -> Result<(Arc<[String]>, bool), ServeError> {
        if query.is_empty() {
            return Err(ServeError::InvalidArgument {
                reason: "Query must not be empty".to_string(),
            });
        }

        if let Some(entry) = self.cache.get(query) {
            debug!("Cache hit for '{}' ({} paths)", query, entry.paths().len());
            return Ok((Arc::clone(entry.paths()), true));
        }

        let paths = self.locator.search(query).await?;
        let entry = self.cache.put(query, paths);
        Ok((Arc::clone(entry.paths()), false))
    }
}

/// Stats each path, keeping input order and skipping the ones that fail.
async fn stat_records(paths: &[String]) -> Vec<SearchResultRecord> {
    stream::iter(paths)
        .map(stat_record)
        .buffered(STAT_CONCURRENCY)
        .filter_map(|record| async move { record })
        .collect()
        .await
}

async fn stat_record(path: &String) -> Option<SearchResultRecord> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Some(SearchResultRecord::from_metadata(path, &metadata)),
        Err(e) => {
            warn!("Skipping unreadable result {}: {}", path, e);
            None
        }
    }
}
