//! Well-known book content types and the archive format-name table.

/// Standard PDF.
pub const PDF: &str = "application/pdf";

/// Internal pseudo-type for the grayscale ("black & white") PDF rendition.
/// Rewritten to [`PDF`] before anything is persisted.
pub const PDF_BW: &str = "application/pdf-bw";

/// EPUB.
pub const EPUB: &str = "application/epub+zip";

/// DjVu image document.
pub const DJVU: &str = "image/vnd.djvu";

/// One row of the archive format-name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveFormat {
    /// Format name as listed by the archive (`DjVu`, `Text PDF`, ...).
    pub name: &'static str,
    pub content_type: &'static str,
    /// File name suffix appended to the item identifier.
    pub suffix: &'static str,
}

const ARCHIVE_FORMATS: &[ArchiveFormat] = &[
    ArchiveFormat {
        name: "DjVu",
        content_type: DJVU,
        suffix: ".djvu",
    },
    ArchiveFormat {
        name: "PDF",
        content_type: PDF,
        suffix: ".pdf",
    },
    ArchiveFormat {
        name: "Text PDF",
        content_type: PDF,
        suffix: ".pdf",
    },
    ArchiveFormat {
        name: "Grayscale PDF",
        content_type: PDF_BW,
        suffix: "_bw.pdf",
    },
    ArchiveFormat {
        name: "Additional Text PDF",
        content_type: PDF_BW,
        suffix: "_bw.pdf",
    },
    ArchiveFormat {
        name: "EPUB",
        content_type: EPUB,
        suffix: ".epub",
    },
];

/// Looks up an archive format by name, ignoring ASCII case.
#[must_use]
pub fn archive_format(name: &str) -> Option<&'static ArchiveFormat> {
    let name = name.trim();
    ARCHIVE_FORMATS
        .iter()
        .find(|format| format.name.eq_ignore_ascii_case(name))
}

/// Rewrites internal pseudo-types to the standard type persisted in records.
#[must_use]
pub fn normalize_mime_type(content_type: &str) -> &str {
    if content_type == PDF_BW {
        PDF
    } else {
        content_type
    }
}

/// Returns true if a `Content-Type` header denotes an HTML page.
#[must_use]
pub fn is_html_content_type(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("text/html"))
}

/// Short human label for a content type, for format pickers.
#[must_use]
pub fn format_label(content_type: &str) -> &str {
    match content_type {
        PDF => "PDF",
        PDF_BW => "B/W PDF",
        EPUB => "EPUB",
        DJVU => "DjVu",
        other => other,
    }
}
