//! In-memory model of an EPUB book: identity, resources, and reading order.

use std::collections::HashMap;

mod builder;

pub use builder::build_book;

/// Identity and location data parsed from the archive's descriptors.
#[derive(Debug, Clone, Default)]
pub struct BookInfo {
    /// Display title.
    pub title: String,
    /// Stable unique identifier; names the extracted output directory.
    pub identifier: String,
    /// Location of the package descriptor inside the archive.
    pub rootfile_path: String,
    /// Directory containing the rootfile; every manifest href resolves
    /// relative to this.
    pub base_path: String,
    /// XML namespace URI of the package descriptor's root element.
    pub namespace: String,
}

/// A single manifest entry.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Manifest id, unique within the book.
    pub id: String,
    /// Path relative to the book's base path, as written in the manifest.
    pub href: String,
    /// Basename of `href`; the key documents use to reference the resource.
    pub filename: String,
    /// MIME string, `type/subtype`.
    pub media_type: String,
    /// Normalized archive path: base path joined with `href`.
    pub archive_path: String,
}

impl Resource {
    /// Top-level media-type category ("image", "text", ...), used as the
    /// extraction subdirectory name.
    pub fn category(&self) -> &str {
        self.media_type.split('/').next().unwrap_or("application")
    }
}

/// An immutable model of one book: built once per archive, read-only after.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub info: BookInfo,
    /// Non-markup manifest entries, keyed by filename. Basename collisions
    /// are rejected at build time rather than silently overwritten.
    pub resources: HashMap<String, Resource>,
    /// Markup documents in reading order: exactly the document order of the
    /// spine's `<itemref>` elements.
    pub spine: Vec<(String, Resource)>,
}

impl Book {
    /// Look up a non-markup resource by the basename documents use.
    pub fn resource_by_filename(&self, filename: &str) -> Option<&Resource> {
        self.resources.get(filename)
    }

    /// Relative directory that extracted resources live under.
    pub fn resource_dir(&self) -> String {
        format!("content/{}", self.info.identifier)
    }
}

/// Join `href` onto `base` and normalize away `.`, `..`, and redundant
/// separators, producing a forward-slash archive path.
pub(crate) fn resolve_path(base: &str, href: &str) -> String {
    let joined = if base.is_empty() {
        href.to_string()
    } else {
        format!("{base}/{href}")
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts.join("/")
}

/// Basename of a forward-slash path.
pub(crate) fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
