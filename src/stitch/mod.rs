//! Document Stitcher: merges every spine document into one HTML document,
//! rewriting every cross-document and resource reference so the merged
//! output stays internally consistent.

use std::fmt::Write as _;
use std::io::{Read, Seek};

mod rewrite;
mod split;

use crate::archive::EpubArchive;
use crate::book::Book;
use crate::error::{Error, Result};
use rewrite::RefRewriter;
use split::split_chapter;

/// Stitching configuration.
#[derive(Debug, Clone, Default)]
pub struct StitchOptions {
    /// Embed every resource as a base64 data URI instead of pointing into
    /// the extracted resource directory.
    pub inline: bool,
    /// Also merge the first and last spine documents' head content. Off by
    /// default: cover and colophon heads are treated as boilerplate, an
    /// observed-behavior quirk rather than a format guarantee.
    pub merge_edge_heads: bool,
}

/// One spine document, split into mergeable pieces with all references
/// already rewritten.
#[derive(Debug, Clone)]
pub struct ChapterDoc {
    /// Wrapper id for this document's content; equals the spine item's
    /// filename, which is exactly what rewritten document links target.
    pub anchor: String,
    /// Serialized top-level head children.
    pub head_children: Vec<String>,
    /// Serialized body content.
    pub body: String,
}

/// The accumulating output document. Absorbing chapters one at a time keeps
/// each merge step a pure, separately testable reduction.
#[derive(Debug, Default)]
pub struct MergedDocument {
    head: Vec<String>,
    chapters: Vec<Chapter>,
}

#[derive(Debug)]
struct Chapter {
    anchor: String,
    body: String,
}

impl MergedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the next spine document into the accumulated output.
    ///
    /// Head children are collected only when `merge_head` is set, and a
    /// child already present (by equality) is not inserted twice. The body
    /// always becomes the next wrapper element, in absorption order.
    pub fn absorb(&mut self, chapter: ChapterDoc, merge_head: bool) {
        if merge_head {
            for child in chapter.head_children {
                if !self.head.contains(&child) {
                    self.head.push(child);
                }
            }
        }
        self.chapters.push(Chapter {
            anchor: chapter.anchor,
            body: chapter.body,
        });
    }

    /// Number of wrapper elements absorbed so far.
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Serialize the accumulated document.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(
            r#"<html><head><link href="epub.css" rel="stylesheet" type="text/css"/>"#,
        );
        for child in &self.head {
            out.push_str(child);
        }
        out.push_str(r#"</head><body><div class="epub-container">"#);
        for chapter in &self.chapters {
            write!(
                out,
                r#"<div id="{}">{}<br/></div>"#,
                escape_xml(&chapter.anchor),
                chapter.body
            )
            .unwrap();
        }
        out.push_str("</div></body></html>");
        out
    }
}

/// Merge every spine document, in spine order, into one HTML document and
/// return the final markup text.
pub fn stitch<R: Read + Seek>(
    archive: &mut EpubArchive<R>,
    book: &Book,
    options: &StitchOptions,
) -> Result<String> {
    let total = book.spine.len();
    let mut merged = MergedDocument::new();
    let mut rewriter = RefRewriter {
        archive,
        book,
        inline: options.inline,
    };

    for (index, (_, item)) in book.spine.iter().enumerate() {
        let text = rewriter
            .archive
            .read_text(&item.archive_path)
            .map_err(|e| match e {
                Error::EntryNotFound(path) => Error::ResourceMissing(path),
                other => other,
            })?;

        let chapter = split_chapter(&text, &item.filename, &mut rewriter)?;
        let interior = index > 0 && index + 1 < total;
        merged.absorb(chapter, interior || options.merge_edge_heads);
    }

    Ok(normalize_punctuation(&merged.render()))
}

/// Literal smart punctuation that serializers may emit raw and downstream
/// consumers mis-render; replaced with named character references.
const PUNCTUATION_ENTITIES: [(char, &str); 7] = [
    ('\u{201C}', "&ldquo;"),
    ('\u{201D}', "&rdquo;"),
    ('\u{2018}', "&lsquo;"),
    ('\u{2019}', "&rsquo;"),
    ('\u{2013}', "&ndash;"),
    ('\u{2014}', "&mdash;"),
    ('\u{2026}', "&hellip;"),
];

/// Replace smart punctuation with named character references.
pub fn normalize_punctuation(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    'chars: for c in html.chars() {
        for (raw, entity) in PUNCTUATION_ENTITIES {
            if c == raw {
                out.push_str(entity);
                continue 'chars;
            }
        }
        out.push(c);
    }
    out
}

/// Escape special XML/HTML characters.
pub fn escape_xml(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}
