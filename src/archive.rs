//! Read-only access to the EPUB's ZIP container.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding, strip_bom};

/// A read-only EPUB archive: lists entries and opens them by path.
///
/// Wraps [`zip::ZipArchive`] over any `Read + Seek` source, so archives can
/// come from disk or from in-memory buffers.
pub struct EpubArchive<R: Read + Seek> {
    zip: ZipArchive<R>,
}

impl EpubArchive<File> {
    /// Open an EPUB archive from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(file)
    }
}

impl<R: Read + Seek> EpubArchive<R> {
    /// Open an EPUB archive from any `Read + Seek` source.
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            zip: ZipArchive::new(reader)?,
        })
    }

    /// Iterate over the paths of all entries in the archive.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.zip.file_names()
    }

    /// Read the raw bytes of an entry.
    ///
    /// Returns [`Error::EntryNotFound`] when no entry exists at `path`, even
    /// after retrying with the percent-decoded form (some malformed EPUBs
    /// store encoded paths in the manifest but decoded paths in the ZIP).
    pub fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        match self.zip.by_name(path) {
            Ok(mut file) => {
                let mut contents = Vec::new();
                file.read_to_end(&mut contents)?;
                return Ok(contents);
            }
            Err(zip::result::ZipError::FileNotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let decoded = percent_encoding::percent_decode_str(path)
            .decode_utf8()
            .map_err(|_| Error::EntryNotFound(path.to_string()))?;

        match self.zip.by_name(&decoded) {
            Ok(mut file) => {
                let mut contents = Vec::new();
                file.read_to_end(&mut contents)?;
                Ok(contents)
            }
            Err(zip::result::ZipError::FileNotFound) => Err(Error::EntryNotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Read an entry as text, stripping any BOM and sniffing the encoding
    /// from the XML declaration when the bytes are not valid UTF-8.
    pub fn read_text(&mut self, path: &str) -> Result<String> {
        let bytes = self.read(path)?;
        let bytes = strip_bom(&bytes);
        let hint = extract_xml_encoding(bytes);
        Ok(decode_text(bytes, hint).into_owned())
    }
}
