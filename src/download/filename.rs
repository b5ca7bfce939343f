//! Directory and file naming for the on-disk wallpaper layout.
//!
//! Layout: `<root>/<username>/<collection label | uploads>/<id>.<ext>`.
//! Every segment that comes from upstream data goes through
//! [`sanitize_segment`] so it can never escape its parent directory.

use std::path::{Component, Path, PathBuf};

use url::Url;

use super::constants::{DEFAULT_EXTENSION, PARTIAL_SUFFIX};

/// Sanitizes a single path segment (username, collection label, wallpaper id).
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |` and control characters) with `_`, trims surrounding
/// whitespace, and neutralizes `.`/`..` segments.
#[must_use]
pub fn sanitize_segment(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Extracts a lowercase image extension (without the dot) from a URL path.
pub(crate) fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let dot_index = last_segment.rfind('.')?;
    let ext = &last_segment[dot_index + 1..];
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Maps an image MIME type to a file extension.
pub(crate) fn extension_from_mime(mime: &str) -> Option<&'static str> {
    let mime = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Picks the extension for a wallpaper: URL first, then MIME type, then `jpg`.
#[must_use]
pub fn wallpaper_extension(source_url: &str, file_type: Option<&str>) -> String {
    extension_from_url(source_url)
        .or_else(|| file_type.and_then(extension_from_mime).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Builds `<id>.<ext>` for a wallpaper.
#[must_use]
pub fn wallpaper_filename(id: &str, extension: &str) -> String {
    format!("{}.{extension}", sanitize_segment(id))
}

/// Temp path a download streams into before the atomic rename.
#[must_use]
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}
