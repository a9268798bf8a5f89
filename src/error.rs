//! Error types for unbind operations.

use thiserror::Error;

/// Errors that can occur while converting an EPUB archive.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// An archive entry lookup failed. Callers map this onto the more
    /// specific variants below depending on what the entry was for.
    #[error("archive entry not found: {0}")]
    EntryNotFound(String),

    /// The container or package descriptor is missing or unparsable.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// A spine itemref has no matching manifest item.
    #[error("inconsistent manifest: no item for spine idref {0:?}")]
    InconsistentManifest(String),

    /// Two manifest hrefs share a basename, which would collide in the
    /// extracted output tree.
    #[error("duplicate resource basename: {0:?}")]
    DuplicateResource(String),

    /// A manifest entry is absent at its resolved archive path.
    #[error("resource missing from archive: {0}")]
    ResourceMissing(String),

    /// A document references a filename with no manifest entry.
    #[error("unresolved reference: {0:?}")]
    UnresolvedReference(String),

    /// A spine document failed to parse as markup.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}

pub type Result<T> = std::result::Result<T, Error>;
