//! Searchlight Search - file location and paginated search results

#![deny(missing_docs)]
#![deny(clippy::missing_errors_doc)]
//!
//! Resolves a text query to ranked absolute paths through an ordered list of
//! locator backends, caches the ranking, and turns one window of it into
//! stat-enriched result records.

pub mod errors;
pub mod locator;
pub mod providers;
pub mod service;
pub mod types;

// Re-export main types
pub use errors::LocatorError;
pub use locator::{FallbackLocator, Locator};
pub use providers::{CommandBackend, FixedBackend, LocatorBackend, WalkBackend};
pub use service::PaginatedSearchService;
pub use types::{PaginationRequest, SearchPage, SearchResultRecord};

/// Convenience type alias for Results with LocatorError.
pub type Result<T> = std::result::Result<T, LocatorError>;
