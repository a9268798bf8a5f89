//! # unbind
//!
//! Convert EPUB ebooks into a single browsable HTML document.
//!
//! An EPUB archive is parsed into an immutable [`Book`] model (title,
//! identifier, ordered spine, resource index), then every spine document is
//! stitched into one HTML document with all cross-document and resource
//! references rewritten. Resources are either extracted into a companion
//! `content/<identifier>/` directory or inlined as base64 data URIs.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use unbind::{ConvertOptions, convert_epub};
//!
//! let options = ConvertOptions::default();
//! let html_path = convert_epub(Path::new("book.epub"), Path::new("."), &options)?;
//! println!("wrote {}", html_path.display());
//! # Ok::<(), unbind::Error>(())
//! ```
//!
//! ## Working with the pieces
//!
//! The pipeline stages are exposed individually for finer control:
//!
//! ```no_run
//! use unbind::{EpubArchive, StitchOptions, build_book, stitch};
//!
//! let mut archive = EpubArchive::open("book.epub")?;
//! let book = build_book(&mut archive)?;
//! let html = stitch(&mut archive, &book, &StitchOptions { inline: true, ..Default::default() })?;
//! # Ok::<(), unbind::Error>(())
//! ```

pub mod archive;
pub mod book;
pub mod convert;
pub mod error;
pub mod resources;
pub mod stitch;
pub(crate) mod util;

pub use archive::EpubArchive;
pub use book::{Book, BookInfo, Resource, build_book};
pub use convert::{ConvertOptions, convert_epub};
pub use error::{Error, Result};
pub use resources::{data_uri, extract_resources};
pub use stitch::{ChapterDoc, MergedDocument, StitchOptions, stitch};
