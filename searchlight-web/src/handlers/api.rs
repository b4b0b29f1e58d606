//! JSON API handlers for search and cache introspection

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::{DateTime, Local};
use searchlight_core::ServeError;
use searchlight_search::SearchResultRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::errors::ApiError;
use crate::server::AppState;

/// Query string of `/api/search`.
///
/// Page values stay raw strings so malformed numbers fall back to defaults
/// instead of failing extraction.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Query text; required
    pub q: Option<String>,
    /// One-based page number
    pub page: Option<String>,
    /// Records per page
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

/// Body of a successful `/api/search`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultRecord>,
    pub count: usize,
    pub total_count: usize,
    pub query: String,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub from_cache: bool,
}

/// `GET /api/search?q=&page=&pageSize=`
pub async fn api_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.ok_or_else(|| ServeError::InvalidArgument {
        reason: "Missing query parameter 'q'".to_string(),
    })?;

    let request = state
        .search
        .request(&query, params.page.as_deref(), params.page_size.as_deref());
    let page = state.search.search(&request).await?;

    Ok(Json(SearchResponse {
        count: page.records.len(),
        results: page.records,
        total_count: page.total_count,
        query: request.query,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages,
        from_cache: page.from_cache,
    }))
}

/// Query string of the legacy `/search` route.
#[derive(Debug, Deserialize)]
pub struct LegacySearchParams {
    /// Query text
    pub search: Option<String>,
}

/// `GET /search?search=` returns every result at once.
///
/// Without a query the client is sent back to the front page.
pub async fn legacy_search(
    State(state): State<AppState>,
    Query(params): Query<LegacySearchParams>,
) -> Result<Response, ApiError> {
    let Some(query) = params.search.filter(|q| !q.is_empty()) else {
        return Ok(Redirect::to("/").into_response());
    };

    let results = state.search.search_all(&query).await?;
    Ok(Json(json!({
        "count": results.len(),
        "results": results,
        "query": query,
    }))
    .into_response())
}

/// One cached query as reported by `/api/cache-status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryStatus {
    pub query: String,
    pub path_count: usize,
    pub captured_at: DateTime<Local>,
    pub age_seconds: u64,
}

/// Body of `/api/cache-status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatusResponse {
    pub entry_count: usize,
    pub ttl_seconds: u64,
    pub entries: Vec<CacheEntryStatus>,
}

/// `GET /api/cache-status`
pub async fn cache_status(State(state): State<AppState>) -> Json<CacheStatusResponse> {
    let cache = state.search.cache();
    let entries: Vec<CacheEntryStatus> = cache
        .snapshot()
        .into_iter()
        .map(|snapshot| CacheEntryStatus {
            query: snapshot.query,
            path_count: snapshot.path_count,
            captured_at: snapshot.captured_at,
            age_seconds: snapshot.age.as_secs(),
        })
        .collect();

    Json(CacheStatusResponse {
        entry_count: entries.len(),
        ttl_seconds: cache.ttl().as_secs(),
        entries,
    })
}

/// `POST /api/cache-clear`; clearing an empty cache is not an error.
pub async fn cache_clear(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.search.cache().clear_all();
    info!("Cache cleared: {} entries removed", cleared);
    Json(json!({ "success": true, "clearedCount": cleared }))
}

/// `GET /api/transcoder`
pub async fn transcoder_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "available": state.transcoder.is_available(),
        "maxConcurrent": state.transcoder.max_concurrent(),
        "inFlight": state.transcoder.in_flight(),
    }))
}
