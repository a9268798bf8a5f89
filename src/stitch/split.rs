//! Per-chapter splitter: parses one spine document and captures its head
//! children and body content as serialized fragments, rewriting references
//! on the way through.

use std::io::{Read, Seek};

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};
use crate::util::local_name;

use super::ChapterDoc;
use super::rewrite::RefRewriter;

/// Elements that may carry a reference-bearing attribute. No scripts: their
/// sources are not indexed by the manifest model.
const REF_ELEMENTS: [&[u8]; 4] = [b"link", b"img", b"image", b"a"];

/// Where the event cursor currently sits inside the document.
enum Section {
    /// Before `<head>` (XML declaration, doctype, `<html>`).
    Prologue,
    Head,
    /// After `</head>`, before `<body>`.
    Between,
    Body,
    /// After `</body>`; everything else is ignored.
    Epilogue,
}

/// Split one spine document into its mergeable pieces.
///
/// Head children and body content come back as serialized markup with every
/// reference already rewritten. Fails with [`Error::MalformedDocument`] when
/// the document is not well-formed markup.
pub(crate) fn split_chapter<R: Read + Seek>(
    text: &str,
    anchor: &str,
    rewriter: &mut RefRewriter<'_, R>,
) -> Result<ChapterDoc> {
    let mut reader = Reader::from_str(text);

    let mut section = Section::Prologue;
    let mut depth = 0usize;
    let mut head_children: Vec<String> = Vec::new();
    let mut fragment: Option<Writer<Vec<u8>>> = None;
    let mut body = Writer::new(Vec::new());

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::MalformedDocument(format!("{anchor}: {e}")))?;

        match event {
            Event::Eof => break,
            Event::Start(e) => match section {
                Section::Prologue | Section::Between => {
                    let name = e.name();
                    let local = local_name(name.as_ref());
                    if local == b"head" && matches!(section, Section::Prologue) {
                        section = Section::Head;
                        depth = 0;
                    } else if local == b"body" {
                        section = Section::Body;
                        depth = 0;
                    }
                }
                Section::Head => {
                    if depth == 0 {
                        fragment = Some(Writer::new(Vec::new()));
                    }
                    depth += 1;
                    if let Some(writer) = fragment.as_mut() {
                        write_element(writer, e, false, rewriter)?;
                    }
                }
                Section::Body => {
                    depth += 1;
                    write_element(&mut body, e, false, rewriter)?;
                }
                Section::Epilogue => {}
            },
            Event::Empty(e) => match section {
                Section::Head => {
                    if depth == 0 {
                        let mut writer = Writer::new(Vec::new());
                        write_element(&mut writer, e, true, rewriter)?;
                        head_children.push(finish(writer)?);
                    } else if let Some(writer) = fragment.as_mut() {
                        write_element(writer, e, true, rewriter)?;
                    }
                }
                Section::Body => write_element(&mut body, e, true, rewriter)?,
                _ => {}
            },
            Event::End(e) => match section {
                Section::Head => {
                    if depth == 0 {
                        // </head> itself
                        section = Section::Between;
                    } else {
                        depth -= 1;
                        if let Some(writer) = fragment.as_mut() {
                            writer.write_event(Event::End(e))?;
                        }
                        if depth == 0
                            && let Some(writer) = fragment.take()
                        {
                            head_children.push(finish(writer)?);
                        }
                    }
                }
                Section::Body => {
                    if depth == 0 {
                        section = Section::Epilogue;
                    } else {
                        depth -= 1;
                        body.write_event(Event::End(e))?;
                    }
                }
                _ => {}
            },
            Event::Text(t) => match section {
                // Whitespace between head children is dropped, matching the
                // child-by-child head merge.
                Section::Head if depth > 0 => {
                    if let Some(writer) = fragment.as_mut() {
                        writer.write_event(Event::Text(t))?;
                    }
                }
                Section::Body => body.write_event(Event::Text(t))?,
                _ => {}
            },
            Event::CData(t) => match section {
                Section::Head if depth > 0 => {
                    if let Some(writer) = fragment.as_mut() {
                        writer.write_event(Event::CData(t))?;
                    }
                }
                Section::Body => body.write_event(Event::CData(t))?,
                _ => {}
            },
            Event::GeneralRef(t) => {
                // Entity references survive as literal `&name;` text so the
                // serializer never re-escapes them.
                let name = String::from_utf8_lossy(t.as_ref()).into_owned();
                let literal = BytesText::from_escaped(format!("&{name};"));
                match section {
                    Section::Head if depth > 0 => {
                        if let Some(writer) = fragment.as_mut() {
                            writer.write_event(Event::Text(literal))?;
                        }
                    }
                    Section::Body => body.write_event(Event::Text(literal))?,
                    _ => {}
                }
            }
            Event::Comment(t) => match section {
                Section::Head if depth > 0 => {
                    if let Some(writer) = fragment.as_mut() {
                        writer.write_event(Event::Comment(t))?;
                    }
                }
                Section::Body => body.write_event(Event::Comment(t))?,
                _ => {}
            },
            // XML declaration, doctype, processing instructions: the merged
            // document supplies its own skeleton.
            _ => {}
        }
    }

    Ok(ChapterDoc {
        anchor: anchor.to_string(),
        head_children,
        body: finish(body)?,
    })
}

/// Write a start/empty element, rewriting its reference attribute when it is
/// one of the link-like elements.
fn write_element<W: std::io::Write, R: Read + Seek>(
    writer: &mut Writer<W>,
    e: BytesStart<'_>,
    empty: bool,
    rewriter: &mut RefRewriter<'_, R>,
) -> Result<()> {
    let name = e.name();
    let local = local_name(name.as_ref());
    if REF_ELEMENTS.contains(&local)
        && let Some(rewritten) = rewrite_element(&e, rewriter)?
    {
        if empty {
            writer.write_event(Event::Empty(rewritten))?;
        } else {
            writer.write_event(Event::Start(rewritten))?;
        }
        return Ok(());
    }

    if empty {
        writer.write_event(Event::Empty(e))?;
    } else {
        writer.write_event(Event::Start(e))?;
    }
    Ok(())
}

/// Rebuild a link-like element with its reference attribute rewritten.
/// `Ok(None)` when the element has no reference attribute or the target
/// passes through unchanged.
fn rewrite_element<R: Read + Seek>(
    e: &BytesStart<'_>,
    rewriter: &mut RefRewriter<'_, R>,
) -> Result<Option<BytesStart<'static>>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut href_idx: Option<usize> = None;
    let mut src_idx: Option<usize> = None;

    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        let value = match unescape(&raw) {
            Ok(unescaped) => unescaped.into_owned(),
            // Unknown entities (e.g. HTML-only ones): keep the raw text.
            Err(_) => raw,
        };

        // A name containing "href" takes precedence over one containing
        // "src"; namespaced variants like xlink:href (cover images) count.
        if key.contains("href") {
            href_idx = Some(attrs.len());
        } else if key.contains("src") {
            src_idx = Some(attrs.len());
        }
        attrs.push((key, value));
    }

    let Some(ref_idx) = href_idx.or(src_idx) else {
        return Ok(None);
    };
    let Some(new_value) = rewriter.rewrite(&attrs[ref_idx].1)? else {
        return Ok(None);
    };
    attrs[ref_idx].1 = new_value;

    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for (key, value) in &attrs {
        out.push_attribute((key.as_str(), value.as_str()));
    }
    Ok(Some(out))
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    Ok(String::from_utf8(writer.into_inner())?)
}
