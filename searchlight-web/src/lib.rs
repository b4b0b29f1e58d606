//! Searchlight Web - JSON API and media delivery server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
//!
//! Search endpoints backed by the query cache, byte-range file delivery,
//! live transcoding, and cache introspection, all behind one axum router.

pub mod handlers;
pub mod server;

// Re-export main types
pub use server::{AppState, build_router, run_server};
