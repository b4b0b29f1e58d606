//! Backend implementations that turn a query into ranked paths.

use async_trait::async_trait;

use crate::errors::LocatorError;

pub mod command;
pub mod fixed;
pub mod walk;

pub use command::CommandBackend;
pub use fixed::FixedBackend;
pub use walk::WalkBackend;

/// One way of finding files that match a query.
///
/// Implementations return absolute paths in their own ranking order; the
/// list may contain duplicates and entries that no longer exist.
#[async_trait]
pub trait LocatorBackend: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Finds paths matching `query`.
    ///
    /// # Errors
    /// - `LocatorError::BackendFailed` - The backend could not answer
    async fn search(&self, query: &str) -> Result<Vec<String>, LocatorError>;
}
