//! In-memory cache of locator results keyed by exact query string.
//!
//! Entries are immutable snapshots shared through `Arc`; a refresh replaces
//! the entry wholesale. A background sweeper evicts expired entries until its
//! cancellation token fires.

mod store;
mod sweeper;

pub use store::{CacheEntry, CacheSnapshot, QueryCache};
pub use sweeper::spawn_sweeper;
