//! Reference rewriting: keeps the merged document internally consistent.

use std::io::{Read, Seek};

use crate::archive::EpubArchive;
use crate::book::{Book, basename};
use crate::error::{Error, Result};
use crate::resources::data_uri;

/// Rewrites reference targets as documents are spliced into the merged
/// output. Holds the archive mutably so that single-file mode can pull
/// resource bytes on demand.
pub(crate) struct RefRewriter<'a, R: Read + Seek> {
    pub archive: &'a mut EpubArchive<R>,
    pub book: &'a Book,
    pub inline: bool,
}

impl<R: Read + Seek> RefRewriter<'_, R> {
    /// Rewrite a single reference target. `Ok(None)` means the reference
    /// passes through untouched.
    ///
    /// Rules, in order:
    /// - empty, pure-fragment, and absolute (`://`) targets pass through;
    /// - targets naming another markup document collapse to an
    ///   intra-document anchor: an existing fragment is kept as-is,
    ///   otherwise `#<basename>` is synthesized to match the wrapper-id
    ///   convention used when bodies are merged;
    /// - everything else resolves by basename against the resource map and
    ///   becomes either the externalized path or a data URI.
    pub fn rewrite(&mut self, target: &str) -> Result<Option<String>> {
        if target.is_empty() || target.starts_with('#') || target.contains("://") {
            return Ok(None);
        }

        if target.contains(".html") || target.contains(".xhtml") {
            let anchor = match target.find('#') {
                Some(pos) => target[pos..].to_string(),
                None => format!("#{}", basename(target)),
            };
            return Ok(Some(anchor));
        }

        let filename = basename(target);
        let resource = self
            .book
            .resource_by_filename(filename)
            .ok_or_else(|| Error::UnresolvedReference(filename.to_string()))?;

        if self.inline {
            Ok(Some(data_uri(self.archive, resource)?))
        } else {
            Ok(Some(format!(
                "{}/{}/{}",
                self.book.resource_dir(),
                resource.category(),
                resource.filename
            )))
        }
    }
}
