//! Resolution of file paths carried in request URLs.
//!
//! Media routes embed an absolute path after their prefix, e.g.
//! `/stream/%2Fsrv%2Fmedia%2Fclip.mp4`. The segment is percent-decoded exactly
//! once; a path that still looks encoded afterwards is taken literally, since
//! file names may legitimately contain `%XX` sequences.

use std::path::{Component, Path, PathBuf};

use crate::ServeError;

/// Decodes and validates the path portion that follows a route prefix.
///
/// A decoded path without a root gets a leading `/`, so both
/// `/stream/srv/a.mp4` and `/stream/%2Fsrv%2Fa.mp4` name `/srv/a.mp4`.
///
/// # Errors
/// - `ServeError::InvalidArgument` - Empty, non-UTF-8, NUL-containing, relative
///   or `..`-containing paths
pub fn resolve_request_path(raw: &str) -> Result<PathBuf, ServeError> {
    let decoded = urlencoding::decode(raw).map_err(|_| ServeError::InvalidArgument {
        reason: "Path is not valid UTF-8 after decoding".to_string(),
    })?;

    if decoded.is_empty() {
        return Err(ServeError::InvalidArgument {
            reason: "Path must not be empty".to_string(),
        });
    }
    if decoded.contains('\0') {
        return Err(ServeError::InvalidArgument {
            reason: "Path contains a NUL byte".to_string(),
        });
    }

    let mut path = PathBuf::from(decoded.as_ref());
    if !path.has_root() {
        path = Path::new("/").join(path);
    }
    if !path.is_absolute() {
        return Err(ServeError::InvalidArgument {
            reason: format!("Path is not absolute: {}", path.display()),
        });
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ServeError::InvalidArgument {
            reason: "Path must not contain '..' components".to_string(),
        });
    }

    Ok(path)
}
