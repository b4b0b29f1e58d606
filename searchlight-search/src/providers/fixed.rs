//! In-memory backend with canned answers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::LocatorBackend;
use crate::errors::LocatorError;

/// Answers from a fixed query table and counts how often it is asked.
///
/// Unknown queries return no paths. A failing backend rejects every query.
#[derive(Debug, Default)]
pub struct FixedBackend {
    name: String,
    results: HashMap<String, Vec<String>>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FixedBackend {
    /// Creates an empty backend.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Creates a backend that fails every query with `reason`.
    pub fn failing(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Adds the answer for `query`.
    pub fn with_results<I, S>(mut self, query: &str, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.results
            .insert(query.to_string(), paths.into_iter().map(Into::into).collect());
        self
    }

    /// Number of searches served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocatorBackend for FixedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, LocatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(LocatorError::backend(&self.name, reason.clone()));
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}
