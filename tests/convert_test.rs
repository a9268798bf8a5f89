use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use unbind::{ConvertOptions, Error, convert_epub};

const IDENTIFIER: &str = "unbind-test-id";

/// Write a minimal EPUB 2 archive to disk: container descriptor, package
/// descriptor, the given chapters (filename -> full XHTML), and resources
/// (href -> media type + bytes).
fn write_epub(
    path: &Path,
    title: &str,
    chapters: &[(&str, &str)],
    resources: &[(&str, &str, &[u8])],
    extra_itemrefs: &[&str],
) {
    let file = fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflate =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();

    zip.start_file("META-INF/container.xml", deflate).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
    )
    .unwrap();

    let mut manifest = String::new();
    let mut spine = String::new();
    for (i, (name, _)) in chapters.iter().enumerate() {
        manifest.push_str(&format!(
            "    <item id=\"ch{i}\" href=\"{name}\" media-type=\"application/xhtml+xml\"/>\n"
        ));
        spine.push_str(&format!("    <itemref idref=\"ch{i}\"/>\n"));
    }
    for (i, (href, media_type, _)) in resources.iter().enumerate() {
        manifest.push_str(&format!(
            "    <item id=\"res{i}\" href=\"{href}\" media-type=\"{media_type}\"/>\n"
        ));
    }
    manifest.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    for idref in extra_itemrefs {
        spine.push_str(&format!("    <itemref idref=\"{idref}\"/>\n"));
    }

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>{title}</dc:title>
    <dc:identifier id="BookId">{IDENTIFIER}</dc:identifier>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>"#
    );
    zip.start_file("OEBPS/content.opf", deflate).unwrap();
    zip.write_all(opf.as_bytes()).unwrap();

    zip.start_file("OEBPS/toc.ncx", deflate).unwrap();
    zip.write_all(b"<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\"><navMap/></ncx>")
        .unwrap();

    for (name, content) in chapters {
        zip.start_file(format!("OEBPS/{name}"), deflate).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    for (href, _, bytes) in resources {
        zip.start_file(format!("OEBPS/{href}"), deflate).unwrap();
        zip.write_all(bytes).unwrap();
    }

    zip.finish().unwrap();
}

fn three_chapter_epub(dir: &Path) -> PathBuf {
    let epub_path = dir.join("stitched.epub");
    write_epub(
        &epub_path,
        "Stitched Book",
        &[
            (
                "ch1.xhtml",
                r#"<html><head><title>Cover</title></head>
<body><p>One</p><img src="images/cover.jpg"/>
<a href="ch2.xhtml#section1">jump</a></body></html>"#,
            ),
            (
                "ch2.xhtml",
                r#"<html><head><link rel="stylesheet" href="style/main.css"/>
<style>p { color: red }</style></head>
<body><p id="section1">Two</p><a href="ch3.xhtml">onward</a></body></html>"#,
            ),
            (
                "ch3.xhtml",
                "<html><head><style>em { color: blue }</style></head>\
<body><p>Three \u{2014} the end\u{2026}</p></body></html>",
            ),
        ],
        &[
            ("style/main.css", "text/css", b"p { margin: 0 }"),
            ("images/cover.jpg", "image/jpeg", b"\xFF\xD8fakejpeg"),
        ],
        &[],
    );
    epub_path
}

#[test]
fn test_multi_file_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let epub_path = three_chapter_epub(dir.path());

    let out = convert_epub(&epub_path, dir.path(), &ConvertOptions::default()).unwrap();
    assert_eq!(out, dir.path().join("Stitched Book.html"));

    // Resources land in content/<identifier>/<category>/<filename>.
    let cover = dir.path().join(format!("content/{IDENTIFIER}/image/cover.jpg"));
    let css = dir.path().join(format!("content/{IDENTIFIER}/text/main.css"));
    assert_eq!(fs::read(&cover).unwrap(), b"\xFF\xD8fakejpeg");
    assert_eq!(fs::read(&css).unwrap(), b"p { margin: 0 }");
    // The navigation descriptor is not a resource.
    assert!(!dir.path().join(format!("content/{IDENTIFIER}/application")).exists());

    let html = fs::read_to_string(&out).unwrap();

    // One wrapper per spine document, in spine order, ids = filenames.
    let ch1 = html.find(r#"<div id="ch1.xhtml">"#).unwrap();
    let ch2 = html.find(r#"<div id="ch2.xhtml">"#).unwrap();
    let ch3 = html.find(r#"<div id="ch3.xhtml">"#).unwrap();
    assert!(ch1 < ch2 && ch2 < ch3);
    assert_eq!(html.matches("<div id=").count(), 3);

    // Resource references point into the extracted directory.
    assert!(html.contains(&format!(r#"<img src="content/{IDENTIFIER}/image/cover.jpg"/>"#)));
    assert!(html.contains(&format!(r#"href="content/{IDENTIFIER}/text/main.css""#)));

    // Inter-document links became intra-document anchors, and every anchor
    // synthesized from a document name has a matching wrapper.
    assert!(html.contains(r##"<a href="#section1">jump</a>"##));
    assert!(html.contains(r##"<a href="#ch3.xhtml">onward</a>"##));

    // Smart punctuation becomes named character references.
    assert!(html.contains("Three &mdash; the end&hellip;"));
}

#[test]
fn test_single_file_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let epub_path = three_chapter_epub(dir.path());

    let options = ConvertOptions { single_file: true };
    let out = convert_epub(&epub_path, dir.path(), &options).unwrap();
    let html = fs::read_to_string(&out).unwrap();

    // No directory side effects, no externalized paths.
    assert!(!dir.path().join("content").exists());
    assert!(!html.contains(&format!("content/{IDENTIFIER}")));

    // Every resource reference is a data URI.
    assert!(html.contains("data:image/jpeg;base64,"));
    assert!(html.contains("data:text/css;base64,"));
}

#[test]
fn test_head_merge_skips_first_and_last() {
    let dir = tempfile::tempdir().unwrap();
    let epub_path = three_chapter_epub(dir.path());

    let out = convert_epub(&epub_path, dir.path(), &ConvertOptions::default()).unwrap();
    let html = fs::read_to_string(&out).unwrap();

    // Interior chapter's head content is collected into the merged head.
    assert!(html.contains("<style>p { color: red }</style>"));
    // First and last chapters' heads are boilerplate and stay out.
    assert!(!html.contains("<title>Cover</title>"));
    assert!(!html.contains("<style>em { color: blue }</style>"));

    // The seed skeleton's single stylesheet reference is always present.
    assert!(html.contains(r#"<link href="epub.css" rel="stylesheet" type="text/css"/>"#));
}

#[test]
fn test_conversion_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let epub_path = three_chapter_epub(dir.path());

    let first = convert_epub(&epub_path, dir.path(), &ConvertOptions::default()).unwrap();
    let first_html = fs::read_to_string(&first).unwrap();
    let second = convert_epub(&epub_path, dir.path(), &ConvertOptions::default()).unwrap();
    let second_html = fs::read_to_string(&second).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_html, second_html);

    let cover = dir.path().join(format!("content/{IDENTIFIER}/image/cover.jpg"));
    assert_eq!(fs::read(&cover).unwrap(), b"\xFF\xD8fakejpeg");
}

#[test]
fn test_dangling_spine_idref_fails() {
    let dir = tempfile::tempdir().unwrap();
    let epub_path = dir.path().join("broken.epub");
    write_epub(
        &epub_path,
        "Broken",
        &[("ch1.xhtml", "<html><head/><body><p>x</p></body></html>")],
        &[],
        &["ghost"],
    );

    match convert_epub(&epub_path, dir.path(), &ConvertOptions::default()) {
        Err(Error::InconsistentManifest(id)) => assert_eq!(id, "ghost"),
        other => panic!("expected InconsistentManifest, got {other:?}"),
    }
}

#[test]
fn test_colliding_spine_basenames_fail() {
    // Two spine documents sharing a basename would produce two wrappers
    // with the same id; the build rejects the archive instead.
    let dir = tempfile::tempdir().unwrap();
    let epub_path = dir.path().join("collide.epub");
    write_epub(
        &epub_path,
        "Colliding",
        &[
            ("a/ch1.xhtml", "<html><head/><body><p>a</p></body></html>"),
            ("b/ch1.xhtml", "<html><head/><body><p>b</p></body></html>"),
        ],
        &[],
        &[],
    );

    match convert_epub(&epub_path, dir.path(), &ConvertOptions::default()) {
        Err(Error::DuplicateResource(name)) => assert_eq!(name, "ch1.xhtml"),
        other => panic!("expected DuplicateResource, got {other:?}"),
    }
}

#[test]
fn test_unresolved_reference_fails() {
    let dir = tempfile::tempdir().unwrap();
    let epub_path = dir.path().join("unresolved.epub");
    write_epub(
        &epub_path,
        "Unresolved",
        &[(
            "ch1.xhtml",
            r#"<html><head/><body><img src="images/ghost.png"/></body></html>"#,
        )],
        &[],
        &[],
    );

    match convert_epub(&epub_path, dir.path(), &ConvertOptions::default()) {
        Err(Error::UnresolvedReference(name)) => assert_eq!(name, "ghost.png"),
        other => panic!("expected UnresolvedReference, got {other:?}"),
    }
}

#[test]
fn test_title_fallback_to_file_stem() {
    let dir = tempfile::tempdir().unwrap();
    let epub_path = dir.path().join("untitled.epub");
    write_epub(
        &epub_path,
        "",
        &[("ch1.xhtml", "<html><head/><body><p>x</p></body></html>")],
        &[],
        &[],
    );

    let out = convert_epub(&epub_path, dir.path(), &ConvertOptions::default()).unwrap();
    assert_eq!(out, dir.path().join("untitled.html"));
}
