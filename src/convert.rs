//! One-archive conversion pipeline: build the model, materialize resources,
//! stitch, write the final HTML.

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::EpubArchive;
use crate::book::build_book;
use crate::error::Result;
use crate::resources::extract_resources;
use crate::stitch::{StitchOptions, stitch};

/// Conversion configuration.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Produce one self-contained HTML file with all resources inlined as
    /// data URIs; no resource directory is written.
    pub single_file: bool,
}

/// Convert one EPUB archive.
///
/// In multi-file mode this extracts resources under
/// `out_dir/content/<identifier>/` and writes `<title>.html` with references
/// pointing into that directory; in single-file mode it writes only the
/// HTML, fully inlined. Returns the path of the written HTML file.
///
/// The unit of work is the whole archive: it either completes or fails with
/// no partial HTML output.
pub fn convert_epub(path: &Path, out_dir: &Path, options: &ConvertOptions) -> Result<PathBuf> {
    let mut archive = EpubArchive::open(path)?;
    let book = build_book(&mut archive)?;

    if !options.single_file {
        extract_resources(&mut archive, &book, out_dir)?;
    }

    let stitch_options = StitchOptions {
        inline: options.single_file,
        ..Default::default()
    };
    let html = stitch(&mut archive, &book, &stitch_options)?;

    let out_path = out_dir.join(format!("{}.html", output_stem(&book.info.title, path)));
    fs::write(&out_path, html)?;
    Ok(out_path)
}

/// Name the output after the book title, falling back to the archive's file
/// stem when the title is empty or unusable as a filename.
fn output_stem(title: &str, archive_path: &Path) -> String {
    let title = title.trim();
    if title.is_empty() || title.contains(['/', '\\']) {
        archive_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book".to_string())
    } else {
        title.to_string()
    }
}
