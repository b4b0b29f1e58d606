//! Searchlight HTTP server
//!
//! Wires the query cache, search service, range server and transcoding pipe
//! into one axum router, and owns the background sweeper's lifetime.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use searchlight_core::{
    FfmpegTranscoder, QueryCache, RangeContentServer, SearchlightConfig, TranscodingPipe,
    spawn_sweeper,
};
use searchlight_search::{FallbackLocator, PaginatedSearchService};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers::{
    api_search, cache_clear, cache_status, legacy_search, serve_file, stream_file, thumbnail,
    transcode, transcoder_status,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Paginated search over the shared query cache
    pub search: Arc<PaginatedSearchService>,
    /// Byte-range file delivery
    pub range_server: RangeContentServer,
    /// Admission-controlled transcoder launcher
    pub transcoder: Arc<TranscodingPipe>,
}

impl AppState {
    /// Bundles the request-serving components.
    pub fn new(
        search: Arc<PaginatedSearchService>,
        range_server: RangeContentServer,
        transcoder: Arc<TranscodingPipe>,
    ) -> Self {
        Self {
            search,
            range_server,
            transcoder,
        }
    }

    /// The query cache shared with the search service and the sweeper.
    pub fn cache(&self) -> &Arc<QueryCache> {
        self.search.cache()
    }
}

/// Builds the router with every route, CORS and request tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Search
        .route("/api/search", get(api_search))
        .route("/search", get(legacy_search))
        // Media delivery
        .route("/stream/{*path}", get(stream_file))
        .route("/file/{*path}", get(serve_file))
        .route("/thumbnail/{*path}", get(thumbnail))
        .route("/transcode/{*path}", get(transcode))
        // Introspection
        .route("/api/cache-status", get(cache_status))
        .route("/api/cache-clear", post(cache_clear))
        .route("/api/transcoder", get(transcoder_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the server until Ctrl-C, then stops the sweeper and waits for it.
///
/// # Errors
/// Returns an error if the configuration is invalid, the listener cannot be
/// bound, or the server fails while running.
pub async fn run_server(config: SearchlightConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let cache = Arc::new(QueryCache::new(config.cache.ttl));
    let locator = Arc::new(FallbackLocator::from_config(&config.search));
    let search = Arc::new(PaginatedSearchService::new(
        Arc::clone(&cache),
        locator,
        config.search.clone(),
    ));

    // Probed once; the answer holds for the life of the process.
    let transcoder = Arc::new(FfmpegTranscoder::probe(config.transcode.binary.clone()).await);
    let pipe = Arc::new(TranscodingPipe::new(transcoder, &config.transcode));

    let state = AppState::new(search, RangeContentServer::default(), pipe);

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        Arc::clone(&cache),
        config.cache.sweep_interval,
        shutdown.clone(),
    );

    let app = build_router(state);
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        "Searchlight running on http://{} (cache TTL {:?}, sweep every {:?})",
        listener.local_addr()?,
        config.cache.ttl,
        config.cache.sweep_interval
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    sweeper.await?;
    info!("Searchlight stopped");
    Ok(())
}

/// Resolves on Ctrl-C or when `shutdown` is cancelled elsewhere, and cancels
/// `shutdown` either way.
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!("Failed to listen for Ctrl-C, shutting down: {}", e),
        },
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
