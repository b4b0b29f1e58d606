//! HTTP Range request handling for file delivery
//!
//! Implements the single-range subset of RFC 7233: `bytes=start-end` and
//! `bytes=start-`. Suffix ranges (`bytes=-N`) and multi-range requests are
//! rejected with 416.

use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::ServeError;

/// Size of chunks read from disk per body frame.
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// An inclusive, validated byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parses a Range header value against a file of `file_size` bytes.
    ///
    /// An omitted end means "to the end of the file"; an end past the last
    /// byte is clamped to it.
    ///
    /// # Errors
    /// - `ServeError::InvalidRange` - Wrong unit, missing start, multiple
    ///   ranges, non-numeric bounds, `start > end` or `start >= file_size`
    pub fn parse(header: &str, file_size: u64) -> Result<Self, ServeError> {
        let invalid = || ServeError::InvalidRange {
            header: header.to_string(),
            file_size,
        };

        let ranges = header.strip_prefix("bytes=").ok_or_else(invalid)?;
        if ranges.contains(',') {
            return Err(invalid());
        }

        let (start_str, end_str) = ranges.split_once('-').ok_or_else(invalid)?;
        if start_str.is_empty() || end_str.contains('-') {
            return Err(invalid());
        }

        let start = parse_bound(start_str).ok_or_else(invalid)?;
        let end = if end_str.is_empty() {
            file_size.saturating_sub(1)
        } else {
            parse_bound(end_str).ok_or_else(invalid)?
        };

        if start > end || start >= file_size {
            return Err(invalid());
        }

        Ok(Self {
            start,
            end: end.min(file_size - 1),
        })
    }

    /// Number of bytes covered, both ends inclusive.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header.
    pub fn content_range(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, file_size)
    }
}

fn parse_bound(digits: &str) -> Option<u64> {
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// Builds the empty 416 response for a file of `file_size` bytes.
pub fn range_not_satisfiable(file_size: u64) -> Response {
    let content_range = HeaderValue::from_str(&format!("bytes */{file_size}"))
        .unwrap_or_else(|_| HeaderValue::from_static("bytes */0"));
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [(header::CONTENT_RANGE, content_range)],
    )
        .into_response()
}

/// Serves one file as a full (200) or partial (206) response.
///
/// The body streams from disk; nothing is buffered beyond one chunk.
#[derive(Debug, Clone)]
pub struct RangeContentServer {
    chunk_size: usize,
}

impl Default for RangeContentServer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl RangeContentServer {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Opens `path` and builds the response for the optional Range header.
    ///
    /// The size comes from the opened handle, so a file replaced between
    /// lookup and open is served consistently.
    ///
    /// # Errors
    /// - `ServeError::NotFound` - File vanished before it could be opened
    /// - `ServeError::InvalidArgument` - Path is a directory
    /// - `ServeError::InvalidRange` - Range header malformed or unsatisfiable
    /// - `ServeError::Internal` - Open, stat or seek failed
    pub async fn serve(
        &self,
        path: &Path,
        range_header: Option<&str>,
        content_type: &str,
    ) -> Result<Response, ServeError> {
        let mut file = File::open(path)
            .await
            .map_err(|e| ServeError::from_io(path, "open", e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| ServeError::from_io(path, "stat", e))?;

        if !metadata.is_file() {
            return Err(ServeError::InvalidArgument {
                reason: format!("Not a regular file: {}", path.display()),
            });
        }
        let file_size = metadata.len();

        let Some(range_header) = range_header else {
            info!("Serving full file {} ({} bytes)", path.display(), file_size);
            let body = self.body_from(file, file_size);
            return build_response(StatusCode::OK, content_type, file_size, None, body);
        };

        let range = ByteRange::parse(range_header, file_size)?;
        debug!(
            "Range request for {}: {} (length {})",
            path.display(),
            range.content_range(file_size),
            range.len()
        );

        file.seek(SeekFrom::Start(range.start))
            .await
            .map_err(|e| ServeError::from_io(path, "seek", e))?;

        let body = self.body_from(file, range.len());
        build_response(
            StatusCode::PARTIAL_CONTENT,
            content_type,
            range.len(),
            Some(range.content_range(file_size)),
            body,
        )
    }

    fn body_from(&self, file: File, length: u64) -> Body {
        Body::from_stream(ReaderStream::with_capacity(
            file.take(length),
            self.chunk_size,
        ))
    }
}

fn build_response(
    status: StatusCode,
    content_type: &str,
    content_length: u64,
    content_range: Option<String>,
    body: Body,
) -> Result<Response, ServeError> {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length.to_string())
        .header(header::ACCEPT_RANGES, "bytes");

    if let Some(content_range) = content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    builder.body(body).map_err(|e| ServeError::Internal {
        operation: "build range response".to_string(),
        source: std::io::Error::other(e),
    })
}
