//! File delivery and live transcoding handlers
//!
//! Every route takes the target path from the raw request URI so that it is
//! percent-decoded exactly once.

use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Uri, header};
use axum::response::{IntoResponse, Response};
use searchlight_core::ServeError;
use searchlight_core::media::{content_type, is_image};
use searchlight_core::paths::resolve_request_path;
use tracing::debug;

use super::errors::ApiError;
use crate::server::AppState;

fn path_after(uri: &Uri, prefix: &str) -> Result<PathBuf, ServeError> {
    let raw = uri.path().strip_prefix(prefix).unwrap_or_default();
    resolve_request_path(raw)
}

/// The `Range` value, if any. A blank header counts as absent; a non-ASCII
/// value is passed on lossily so that it is rejected as malformed.
fn range_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::RANGE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `GET /stream/{path}` with optional `Range`.
pub async fn stream_file(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let path = path_after(&uri, "/stream/")?;
    debug!("Stream request for {}", path.display());
    let response = state
        .range_server
        .serve(&path, range_header(&headers).as_deref(), &content_type(&path))
        .await?;
    Ok(response)
}

/// `GET /file/{path}`; any query string turns the response into a download.
pub async fn serve_file(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let path = path_after(&uri, "/file/")?;
    let download = uri.query().is_some_and(|q| !q.is_empty());

    let mime = if download {
        "application/octet-stream".to_string()
    } else {
        content_type(&path)
    };
    let mut response = state
        .range_server
        .serve(&path, range_header(&headers).as_deref(), &mime)
        .await?;

    if download {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, attachment_disposition(&path));
    }
    Ok(response)
}

/// `GET /thumbnail/{path}` serves the original image untouched.
pub async fn thumbnail(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let path = path_after(&uri, "/thumbnail/")?;
    if !is_image(&path) {
        return Err(ServeError::InvalidArgument {
            reason: "Not an image file".to_string(),
        }
        .into());
    }

    let response = state
        .range_server
        .serve(&path, range_header(&headers).as_deref(), &content_type(&path))
        .await?;
    Ok(response)
}

/// `GET /transcode/{path}` streams a browser-playable re-encode.
pub async fn transcode(State(state): State<AppState>, uri: Uri) -> Result<Response, ApiError> {
    let path = path_after(&uri, "/transcode/")?;
    let session = state.transcoder.start(&path).await?;
    Ok(session.into_response())
}

/// `attachment` disposition with an ASCII fallback name and the exact
/// UTF-8 name in `filename*`.
fn attachment_disposition(path: &Path) -> HeaderValue {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    let fallback: String = name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let value = format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(&name)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_after_prefix() {
        let uri: Uri = "/stream/%2Fsrv%2Fclip%20one.mp4".parse().unwrap();
        assert_eq!(
            path_after(&uri, "/stream/").unwrap(),
            PathBuf::from("/srv/clip one.mp4")
        );
    }

    #[test]
    fn test_path_after_ignores_query_string() {
        let uri: Uri = "/file/srv/a.txt?download=1".parse().unwrap();
        assert_eq!(
            path_after(&uri, "/file/").unwrap(),
            PathBuf::from("/srv/a.txt")
        );
    }

    #[test]
    fn test_blank_range_header_is_absent() {
        let mut headers = HeaderMap::new();
        assert_eq!(range_header(&headers), None);

        headers.insert(header::RANGE, HeaderValue::from_static(""));
        assert_eq!(range_header(&headers), None);

        headers.insert(header::RANGE, HeaderValue::from_static("   "));
        assert_eq!(range_header(&headers), None);

        headers.insert(header::RANGE, HeaderValue::from_static(" bytes=0-9"));
        assert_eq!(range_header(&headers).as_deref(), Some("bytes=0-9"));
    }

    #[test]
    fn test_non_ascii_range_header_is_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_bytes(b"bytes=\xff-").unwrap());
        assert!(range_header(&headers).is_some_and(|value| value.starts_with("bytes=")));
    }

    #[test]
    fn test_disposition_escapes_name() {
        let value = attachment_disposition(Path::new("/srv/résumé \"final\".pdf"));
        let value = value.to_str().unwrap();
        assert!(value.starts_with("attachment; filename=\"r_sum_ _final_.pdf\""));
        assert!(value.contains("filename*=UTF-8''r%C3%A9sum%C3%A9%20%22final%22.pdf"));
    }
}
