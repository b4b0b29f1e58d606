//! Ordered composition of locator backends.

use std::sync::Arc;

use async_trait::async_trait;
use searchlight_core::config::SearchConfig;
use tracing::{info, warn};

use crate::errors::LocatorError;
use crate::providers::{CommandBackend, LocatorBackend, WalkBackend};

/// Resolves a query to ranked absolute paths, whatever the backends are.
#[async_trait]
pub trait Locator: Send + Sync {
    /// Finds paths matching `query`.
    ///
    /// # Errors
    /// - `LocatorError::NoBackends` - Nothing to ask
    /// - `LocatorError::AllBackendsFailed` - Every backend failed
    async fn search(&self, query: &str) -> Result<Vec<String>, LocatorError>;
}

/// Tries backends strictly in order; the first success wins.
#[derive(Debug, Clone, Default)]
pub struct FallbackLocator {
    backends: Vec<Arc<dyn LocatorBackend>>,
}

impl FallbackLocator {
    /// Creates a locator over `backends`, tried in the given order.
    pub fn new(backends: Vec<Arc<dyn LocatorBackend>>) -> Self {
        Self { backends }
    }

    /// Builds the command backend (if configured) followed by the walk
    /// backend (if any roots are configured).
    pub fn from_config(config: &SearchConfig) -> Self {
        let mut backends: Vec<Arc<dyn LocatorBackend>> = Vec::new();
        if let Some(command) = &config.command {
            backends.push(Arc::new(CommandBackend::from_config(command)));
        }
        if !config.walk_roots.is_empty() {
            backends.push(Arc::new(WalkBackend::new(
                config.walk_roots.clone(),
                config.walk_max_results,
            )));
        }

        if backends.is_empty() {
            warn!("No search backends configured; every search will fail");
        }
        let locator = Self::new(backends);
        info!("Search backends: [{}]", locator.backend_names().join(", "));
        locator
    }

    /// Backend names in the order they are tried.
    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }
}

#[async_trait]
impl Locator for FallbackLocator {
    async fn search(&self, query: &str) -> Result<Vec<String>, LocatorError> {
        if self.backends.is_empty() {
            return Err(LocatorError::NoBackends);
        }

        let mut failures = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            match backend.search(query).await {
                Ok(paths) => {
                    info!(
                        "Backend '{}' returned {} paths for '{}'",
                        backend.name(),
                        paths.len(),
                        query
                    );
                    return Ok(paths);
                }
                Err(e) => {
                    warn!("Backend '{}' failed, trying next: {}", backend.name(), e);
                    failures.push(e.to_string());
                }
            }
        }

        Err(LocatorError::AllBackendsFailed { failures })
    }
}
