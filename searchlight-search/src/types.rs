//! Request and response types for paginated search.

use std::path::Path;

use chrono::{DateTime, Local};
use searchlight_core::EntryKind;
use searchlight_core::config::SearchConfig;
use serde::Serialize;

/// Timestamp layout used for `modified` in result records.
pub const MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A validated page request.
///
/// Built from raw query-string values; anything unparsable or out of range
/// falls back to a default instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationRequest {
    /// Exact query text, used verbatim as the cache key
    pub query: String,
    /// One-based page number
    pub page: usize,
    /// Records per page, within `1..=max_page_size`
    pub page_size: usize,
}

impl PaginationRequest {
    /// Clamps raw `page` and `pageSize` values against `config`.
    ///
    /// A page below 1 or unparsable becomes 1. A page size that is
    /// unparsable, zero, or above the maximum becomes the default.
    pub fn from_raw(
        query: &str,
        page: Option<&str>,
        page_size: Option<&str>,
        config: &SearchConfig,
    ) -> Self {
        let page = page
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&p| p >= 1)
            .unwrap_or(1);
        let page_size = page_size
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&size| (1..=config.max_page_size).contains(&size))
            .unwrap_or(config.default_page_size);

        Self {
            query: query.to_string(),
            page,
            page_size,
        }
    }

    /// Half-open index window `[start, end)` into a list of `total` paths.
    ///
    /// Empty when the page lies past the end.
    pub fn window(&self, total: usize) -> std::ops::Range<usize> {
        let start = self
            .page
            .saturating_sub(1)
            .saturating_mul(self.page_size)
            .min(total);
        let end = start.saturating_add(self.page_size).min(total);
        start..end
    }

    /// Number of pages needed for `total` paths; zero when there are none.
    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }
}

/// One search hit, enriched from a filesystem stat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultRecord {
    /// Final path component
    pub name: String,
    /// Absolute path as returned by the locator
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Local modification time, `YYYY-MM-DD HH:MM:SS`
    pub modified: String,
    /// Classification by extension
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Whether the path is a directory
    pub is_dir: bool,
}

impl SearchResultRecord {
    /// Builds a record for `path` from its metadata.
    pub fn from_metadata(path: &str, metadata: &std::fs::Metadata) -> Self {
        let as_path = Path::new(path);
        let is_dir = metadata.is_dir();
        let modified = metadata
            .modified()
            .map(|time| DateTime::<Local>::from(time).format(MODIFIED_FORMAT).to_string())
            .unwrap_or_default();

        Self {
            name: display_name(as_path, path),
            path: path.to_string(),
            size: metadata.len(),
            modified,
            kind: EntryKind::classify(as_path, is_dir),
            is_dir,
        }
    }
}

fn display_name(path: &Path, raw: &str) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| raw.to_string())
}

/// One page of results plus the totals needed to page through the rest.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Records in the requested window that could be stat'ed
    pub records: Vec<SearchResultRecord>,
    /// Length of the full cached path list, stat failures included
    pub total_count: usize,
    /// Page that was served
    pub page: usize,
    /// Page size that was applied
    pub page_size: usize,
    /// `ceil(total_count / page_size)`
    pub total_pages: usize,
    /// Whether the path list came from the cache
    pub from_cache: bool,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn request(page: usize, page_size: usize) -> PaginationRequest {
        PaginationRequest {
            query: "q".to_string(),
            page,
            page_size,
        }
    }

    #[test]
    fn test_raw_values_are_clamped_not_rejected() {
        let config = SearchConfig::default();

        let req = PaginationRequest::from_raw("q", None, None, &config);
        assert_eq!((req.page, req.page_size), (1, 50));

        let req = PaginationRequest::from_raw("q", Some("0"), Some("0"), &config);
        assert_eq!((req.page, req.page_size), (1, 50));

        let req = PaginationRequest::from_raw("q", Some("-3"), Some("201"), &config);
        assert_eq!((req.page, req.page_size), (1, 50));

        let req = PaginationRequest::from_raw("q", Some("abc"), Some("2.5"), &config);
        assert_eq!((req.page, req.page_size), (1, 50));

        let req = PaginationRequest::from_raw("q", Some("4"), Some("200"), &config);
        assert_eq!((req.page, req.page_size), (4, 200));
    }

    #[test]
    fn test_query_is_kept_verbatim() {
        let req = PaginationRequest::from_raw(" Video ", None, None, &SearchConfig::default());
        assert_eq!(req.query, " Video ");
    }

    #[test]
    fn test_window_past_end_is_empty() {
        assert_eq!(request(4, 2).window(5), 5..5);
        assert_eq!(request(usize::MAX, 200).window(5), 5..5);
    }

    #[test]
    fn test_empty_results_have_zero_pages() {
        assert_eq!(request(1, 50).total_pages(0), 0);
        assert_eq!(request(1, 50).window(0), 0..0);
    }

    #[test]
    fn test_record_serializes_with_wire_names() {
        let record = SearchResultRecord {
            name: "clip.mkv".to_string(),
            path: "/m/clip.mkv".to_string(),
            size: 42,
            modified: "2024-05-01 12:00:00".to_string(),
            kind: EntryKind::Video,
            is_dir: false,
        };

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type"], "video");
        assert_eq!(json["isDir"], false);
        assert_eq!(json["size"], 42);
        assert_eq!(json["path"], "/m/clip.mkv");
    }

    #[test]
    fn test_record_from_directory_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Movies.mkv");
        std::fs::create_dir(&path).unwrap();
        let path = path.to_string_lossy().into_owned();

        let record = SearchResultRecord::from_metadata(&path, &std::fs::metadata(&path).unwrap());

        assert_eq!(record.name, "Movies.mkv");
        assert_eq!(record.kind, EntryKind::Directory);
        assert!(record.is_dir);
        assert_eq!(record.modified.len(), "2024-05-01 12:00:00".len());
    }

    proptest! {
        #[test]
        fn prop_pages_cover_every_path(total in 0usize..5_000, page_size in 1usize..=200, page in 1usize..100) {
            let req = request(page, page_size);
            let pages = req.total_pages(total);

            prop_assert_eq!(pages, (total + page_size - 1) / page_size);

            let window = req.window(total);
            let skipped = (page - 1) * page_size;
            let expected = page_size.min(total.saturating_sub(skipped));
            prop_assert_eq!(window.len(), expected);
            if page <= pages {
                prop_assert!(!window.is_empty());
            }
        }
    }
}
