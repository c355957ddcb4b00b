//! Filename derivation, sanitization, and unique path resolution.

use std::path::{Component, Path, PathBuf};

use crate::book::mime;

/// Maximum number of title characters kept in a derived filename.
const TITLE_MAX_CHARS: usize = 60;

/// Builds a filename for a downloaded book.
///
/// Pattern with an author: `Author_Title.ext`; without one: `Title.ext`.
/// Falls back to `book.ext` when the title sanitizes to nothing.
#[must_use]
pub fn book_file_name(title: &str, author: Option<&str>, content_type: &str) -> String {
    let extension = extension_from_content_type(content_type);
    let title: String = sanitize_filename_component(title)
        .chars()
        .take(TITLE_MAX_CHARS)
        .collect();
    let title = title.trim_matches('_');
    let author = author
        .and_then(|a| a.split(',').next())
        .map(sanitize_filename_component)
        .filter(|a| !a.is_empty());

    match (author, title.is_empty()) {
        (Some(author), false) => format!("{author}_{title}{extension}"),
        (None, false) => format!("{title}{extension}"),
        (_, true) => format!("book{extension}"),
    }
}

pub(crate) fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\'' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches('_').to_string()
}

/// Guess file extension from a content type.
pub(crate) fn extension_from_content_type(content_type: &str) -> &'static str {
    let content_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    match mime::normalize_mime_type(&content_type) {
        mime::PDF => ".pdf",
        mime::EPUB => ".epub",
        mime::DJVU => ".djvu",
        "application/x-mobipocket-ebook" => ".mobi",
        "application/x-fictionbook+xml" => ".fb2",
        "text/plain" => ".txt",
        "text/html" => ".html",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "application/zip" => ".zip",
        _ => ".bin",
    }
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
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

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// Resolves a unique file path in `dir`, adding `_2`, `_3`, ... if taken.
#[must_use]
pub fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let filename = {
        let sanitized = sanitize_filename(filename);
        if sanitized.trim_matches('_').is_empty() {
            "book.bin".to_string()
        } else {
            sanitized
        }
    };
    let base_path = dir.join(&filename);

    if !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    for i in 2..1000 {
        let new_path = dir.join(format!("{stem}_{i}{ext}"));
        if !new_path.exists() {
            return new_path;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
