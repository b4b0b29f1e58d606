//! Directory walk backend for machines without an indexed search tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::LocatorBackend;
use crate::errors::LocatorError;

/// Walks configured roots for names containing every query term.
///
/// Matching is case-insensitive on the file name only. The walk runs on the
/// blocking pool and stops after `max_results` matches.
#[derive(Debug, Clone)]
pub struct WalkBackend {
    roots: Vec<PathBuf>,
    max_results: usize,
}

impl WalkBackend {
    /// Creates a backend over `roots`.
    pub fn new(roots: Vec<PathBuf>, max_results: usize) -> Self {
        Self {
            roots,
            max_results: max_results.max(1),
        }
    }
}

#[async_trait]
impl LocatorBackend for WalkBackend {
    fn name(&self) -> &str {
        "walk"
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, LocatorError> {
        if self.roots.is_empty() {
            return Err(LocatorError::backend(self.name(), "no search roots configured"));
        }

        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let roots = self.roots.clone();
        let max_results = self.max_results;
        let matches = tokio::task::spawn_blocking(move || walk_matches(&roots, &terms, max_results))
            .await
            .map_err(|e| LocatorError::backend("walk", format!("walk task failed: {e}")))?;

        info!(
            "Walk found {} matches for '{}' under {} roots",
            matches.len(),
            query,
            self.roots.len()
        );
        Ok(matches)
    }
}

fn walk_matches(roots: &[PathBuf], terms: &[String], max_results: usize) -> Vec<String> {
    let mut matches = Vec::new();

    'roots: for root in roots {
        let entries = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                    None
                }
            });

        for entry in entries {
            if name_matches(entry.path(), terms) {
                matches.push(entry.path().to_string_lossy().into_owned());
                if matches.len() >= max_results {
                    break 'roots;
                }
            }
        }
    }

    matches.sort();
    matches
}

fn name_matches(path: &Path, terms: &[String]) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_lowercase();
    terms.iter().all(|term| name.contains(term.as_str()))
}
