//! Integration tests for Searchlight
//!
//! These drive the full router in-process: search through the cache and a
//! locator, byte-range delivery from real files, transcoding through a fake
//! transcoder, and the cache introspection endpoints.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/cache_api.rs"]
mod cache_api;
#[path = "integration/range_delivery.rs"]
mod range_delivery;
#[path = "integration/search_pagination.rs"]
mod search_pagination;
#[path = "integration/transcode.rs"]
mod transcode;
