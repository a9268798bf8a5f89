//! Resource Materializer: copies non-markup resources out of the archive, or
//! inlines them as base64 data URIs.

use std::fs;
use std::io::{Read, Seek};
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::archive::EpubArchive;
use crate::book::{Book, Resource};
use crate::error::{Error, Result};

/// Extract every resource in the book into
/// `out_root/content/<identifier>/<category>/<filename>`.
///
/// Directory creation is idempotent; re-running over the same archive
/// produces the same tree. Fails with [`Error::ResourceMissing`] when a
/// manifest entry is absent at its resolved archive path.
pub fn extract_resources<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    book: &Book,
    out_root: &Path,
) -> Result<()> {
    let book_dir = out_root.join(book.resource_dir());

    for resource in book.resources.values() {
        let category_dir = book_dir.join(resource.category());
        fs::create_dir_all(&category_dir)?;

        let bytes = read_resource(archive, resource)?;
        fs::write(category_dir.join(&resource.filename), bytes)?;
    }

    Ok(())
}

/// Encode a resource as a `data:<media-type>;base64,<payload>` URI.
///
/// Pure with respect to the filesystem; used when resources must be embedded
/// rather than externalized.
pub fn data_uri<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    resource: &Resource,
) -> Result<String> {
    let bytes = read_resource(archive, resource)?;
    Ok(format!(
        "data:{};base64,{}",
        resource.media_type,
        STANDARD.encode(bytes)
    ))
}

fn read_resource<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    resource: &Resource,
) -> Result<Vec<u8>> {
    archive.read(&resource.archive_path).map_err(|e| match e {
        Error::EntryNotFound(path) => Error::ResourceMissing(path),
        other => other,
    })
}
