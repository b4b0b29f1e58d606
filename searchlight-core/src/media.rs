//! File classification by extension.
//!
//! Search results, thumbnails and media delivery all decide what a path is
//! from its extension alone; nothing here reads file contents.

use std::path::Path;

use serde::Serialize;

/// Extensions reported as `video` in search results.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm"];

/// Extensions reported as `image` and accepted by the thumbnail route.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// What a search result points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Video,
    Image,
}

impl EntryKind {
    /// Classifies a path; directories win over any extension.
    pub fn classify(path: &Path, is_directory: bool) -> Self {
        if is_directory {
            return EntryKind::Directory;
        }
        match lowercase_extension(path) {
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => EntryKind::Video,
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => EntryKind::Image,
            _ => EntryKind::File,
        }
    }
}

/// Returns true when the path has an image extension.
pub fn is_image(path: &Path) -> bool {
    EntryKind::classify(path, false) == EntryKind::Image
}

/// Returns the MIME type for the Content-Type header.
pub fn content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
