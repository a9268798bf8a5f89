//! Book Model Builder: resolves the archive's container and package
//! descriptors into an ordered, resolvable [`Book`].

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, QName, ResolveResult};

use crate::archive::EpubArchive;
use crate::book::{Book, BookInfo, Resource, basename, resolve_path};
use crate::error::{Error, Result};
use crate::util::resolve_entity;

/// Fixed location of the container descriptor; the only path the format pins.
const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Build the immutable [`Book`] model for an archive.
///
/// Fails with [`Error::MalformedArchive`] when the container or package
/// descriptor is absent or unparsable, [`Error::InconsistentManifest`] when a
/// spine idref has no manifest item, and [`Error::DuplicateResource`] when
/// two manifest hrefs share a basename.
pub fn build_book<R: Read + Seek>(archive: &mut EpubArchive<R>) -> Result<Book> {
    let container = archive
        .read_text(CONTAINER_PATH)
        .map_err(|e| match e {
            Error::EntryNotFound(_) => {
                Error::MalformedArchive(format!("missing {CONTAINER_PATH}"))
            }
            other => other,
        })?;
    let rootfile_path = parse_container(&container)?;

    // Invariant: base path is the directory component of the rootfile path.
    let base_path = match rootfile_path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    };

    let package = archive
        .read_text(&rootfile_path)
        .map_err(|e| match e {
            Error::EntryNotFound(path) => {
                Error::MalformedArchive(format!("missing package descriptor {path}"))
            }
            other => other,
        })?;
    let package = parse_package(&package)?;

    let spine_set: HashSet<&str> = package.spine_ids.iter().map(String::as_str).collect();

    // Single pass over the manifest: spine items become spine entries, and
    // every non-XML leftover becomes a resource keyed by basename. Auxiliary
    // XML files (navigation/TOC descriptors) belong to neither. Basenames
    // must be unique across the whole book: spine filenames become wrapper
    // ids and anchor targets, resource filenames become output paths, and a
    // collision anywhere makes one of them ambiguous.
    let mut spine_items: HashMap<String, Resource> = HashMap::new();
    let mut resources: HashMap<String, Resource> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();

    for item in package.manifest {
        let filename = basename(&item.href).to_string();
        let resource = Resource {
            archive_path: resolve_path(&base_path, &item.href),
            filename: filename.clone(),
            id: item.id.clone(),
            href: item.href,
            media_type: item.media_type,
        };

        if spine_set.contains(item.id.as_str()) {
            if !seen.insert(filename.clone()) {
                return Err(Error::DuplicateResource(filename));
            }
            spine_items.insert(item.id, resource);
        } else if !resource.media_type.contains("xml") {
            if !seen.insert(filename.clone()) {
                return Err(Error::DuplicateResource(filename));
            }
            resources.insert(filename, resource);
        }
    }

    // Reading order is exactly the itemref document order.
    let mut spine = Vec::with_capacity(package.spine_ids.len());
    for id in package.spine_ids {
        match spine_items.remove(&id) {
            Some(resource) => spine.push((id, resource)),
            None => return Err(Error::InconsistentManifest(id)),
        }
    }

    Ok(Book {
        info: BookInfo {
            title: package.title,
            identifier: package.identifier,
            rootfile_path,
            base_path,
            namespace: package.namespace,
        },
        resources,
        spine,
    })
}

/// Namespace scope bound once to the URI discovered on a descriptor's root
/// element. Every element lookup inside that descriptor goes through it,
/// because namespace-unaware lookups will not match.
struct NsScope {
    uri: Vec<u8>,
}

impl NsScope {
    fn of(resolve: &ResolveResult) -> Self {
        match resolve {
            ResolveResult::Bound(Namespace(uri)) => Self { uri: uri.to_vec() },
            _ => Self { uri: Vec::new() },
        }
    }

    fn uri(&self) -> String {
        String::from_utf8_lossy(&self.uri).into_owned()
    }

    /// True when the element has local name `tag` in this scope's namespace.
    fn is(&self, resolve: &ResolveResult, name: QName, tag: &[u8]) -> bool {
        if name.local_name().as_ref() != tag {
            return false;
        }
        match resolve {
            ResolveResult::Bound(Namespace(uri)) => *uri == self.uri.as_slice(),
            _ => self.uri.is_empty(),
        }
    }
}

/// Locate the package descriptor via the container's `rootfile` element.
///
/// The rootfile location is not fixed by the format, only the container
/// descriptor's location is; this indirection resolves it.
fn parse_container(xml: &str) -> Result<String> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut scope: Option<NsScope> = None;

    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Start(e))) | Ok((ns, Event::Empty(e))) => {
                let scope = scope.get_or_insert_with(|| NsScope::of(&ns));
                if scope.is(&ns, e.name(), b"rootfile")
                    && let Some(path) = attr_value(&e, b"full-path")?
                {
                    return Ok(path);
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => {
                return Err(Error::MalformedArchive(format!("container descriptor: {e}")));
            }
            _ => {}
        }
    }

    Err(Error::MalformedArchive(
        "no rootfile in container descriptor".into(),
    ))
}

/// Parsed package descriptor, still in document terms.
struct PackageDoc {
    namespace: String,
    title: String,
    identifier: String,
    /// Manifest items in document order.
    manifest: Vec<ManifestItem>,
    /// Spine idrefs in document order.
    spine_ids: Vec<String>,
}

struct ManifestItem {
    id: String,
    href: String,
    media_type: String,
}

/// Which metadata element is currently accumulating text.
enum MetaField {
    Title,
    Identifier,
}

fn parse_package(xml: &str) -> Result<PackageDoc> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut scope: Option<NsScope> = None;
    let mut title = String::new();
    let mut identifier = String::new();
    let mut manifest: Vec<ManifestItem> = Vec::new();
    let mut spine_ids: Vec<String> = Vec::new();

    let mut in_metadata = false;
    let mut in_manifest = false;
    let mut in_spine = false;
    let mut capturing: Option<MetaField> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Start(e))) | Ok((ns, Event::Empty(e))) => {
                let scope = scope.get_or_insert_with(|| NsScope::of(&ns));

                if scope.is(&ns, e.name(), b"metadata") {
                    in_metadata = true;
                } else if scope.is(&ns, e.name(), b"manifest") {
                    in_manifest = true;
                } else if scope.is(&ns, e.name(), b"spine") {
                    in_spine = true;
                } else if in_manifest && scope.is(&ns, e.name(), b"item") {
                    if let Some(item) = parse_manifest_item(&e)? {
                        manifest.push(item);
                    }
                } else if in_spine && scope.is(&ns, e.name(), b"itemref") {
                    if let Some(idref) = attr_value(&e, b"idref")? {
                        spine_ids.push(idref);
                    }
                } else if in_metadata {
                    // Metadata children live in their own namespaces (Dublin
                    // Core and friends), so match on the local name alone.
                    // The identifier must carry an id attribute: that is what
                    // distinguishes the unique identifier from alternate
                    // identifier schemes.
                    let local = e.name().local_name();
                    let local = String::from_utf8_lossy(local.as_ref()).into_owned();
                    if local.contains("title") {
                        capturing = Some(MetaField::Title);
                        buf_text.clear();
                    } else if local.contains("identifier") && attr_value(&e, b"id")?.is_some() {
                        capturing = Some(MetaField::Identifier);
                        buf_text.clear();
                    }
                }
            }
            Ok((_, Event::Text(e))) => {
                if capturing.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok((_, Event::GeneralRef(e))) => {
                if capturing.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Ok((ns, Event::End(e))) => {
                if let Some(scope) = scope.as_ref() {
                    if scope.is(&ns, e.name(), b"metadata") {
                        in_metadata = false;
                    } else if scope.is(&ns, e.name(), b"manifest") {
                        in_manifest = false;
                    } else if scope.is(&ns, e.name(), b"spine") {
                        in_spine = false;
                    }
                }

                if let Some(field) = capturing.take() {
                    match field {
                        MetaField::Title => title = buf_text.clone(),
                        MetaField::Identifier => identifier = buf_text.clone(),
                    }
                    buf_text.clear();
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => {
                return Err(Error::MalformedArchive(format!("package descriptor: {e}")));
            }
            _ => {}
        }
    }

    Ok(PackageDoc {
        namespace: scope.map(|s| s.uri()).unwrap_or_default(),
        title,
        identifier,
        manifest,
        spine_ids,
    })
}

fn parse_manifest_item(e: &BytesStart) -> Result<Option<ManifestItem>> {
    let mut id = None;
    let mut href = None;
    let mut media_type = None;

    for attr in e.attributes().flatten() {
        let value = String::from_utf8(attr.value.to_vec())?;
        match attr.key.as_ref() {
            b"id" => id = Some(value),
            b"href" => href = Some(value),
            b"media-type" => media_type = Some(value),
            _ => {}
        }
    }

    match (id, href, media_type) {
        (Some(id), Some(href), Some(media_type)) => Ok(Some(ManifestItem {
            id,
            href,
            media_type,
        })),
        _ => Ok(None),
    }
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return Ok(Some(String::from_utf8(attr.value.to_vec())?));
        }
    }
    Ok(None)
}
