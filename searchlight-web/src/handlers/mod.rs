//! HTTP request handlers organized by functionality

pub mod api;
pub mod errors;
pub mod media;

// Re-export handler functions
pub use api::{
    CacheStatusResponse, SearchParams, SearchResponse, api_search, cache_clear, cache_status,
    legacy_search, transcoder_status,
};
pub use errors::{ApiError, status_for};
pub use media::{serve_file, stream_file, thumbnail, transcode};
