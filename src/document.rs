//! Owned in-memory document.
//!
//! A [`Document`] holds every indirect object of a file in an object table
//! keyed by object number, plus the trailer dictionary. Opening a file loads
//! all in-use objects eagerly, expands object streams and, for files that can
//! be opened with the empty user password, decrypts everything in memory.
//!
//! Pages are exposed as a flattened left-to-right view over the page tree
//! through [`Document::pages`], recomputed on every call.

use crate::audit;
use crate::encryption::{EncryptDict, SecurityHandler};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{dict, Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_indirect_object_at;
use crate::parser_config::ParseOptions;
use crate::writer::{self, WriterConfig};
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntry};
use crate::xref_reconstruction::reconstruct_xref;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Width and height of an A4 page in points.
pub const DEFAULT_PAGE_SIZE: (f64, f64) = (595.0, 842.0);

/// Maximum depth followed through the page tree and `/Parent` chains.
const MAX_TREE_DEPTH: usize = 64;

/// Maximum length of a reference-to-reference chain.
const MAX_RESOLVE_CHAIN: usize = 32;

static NULL: Object = Object::Null;

#[derive(Debug, Clone)]
struct Slot {
    gen: u16,
    object: Object,
}

/// A leaf of the page tree in the current flattened page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle {
    /// 1-based position in the flattened page order
    pub index: usize,
    /// The page dictionary
    pub object_ref: ObjectRef,
    /// The page tree node whose `/Kids` lists this page
    pub parent: Option<ObjectRef>,
}

/// Document information dictionary (`/Info`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Document title
    pub title: Option<String>,
    /// Author name
    pub author: Option<String>,
    /// Subject
    pub subject: Option<String>,
    /// Keywords
    pub keywords: Option<String>,
    /// Application that created the original document
    pub creator: Option<String>,
    /// Application that produced the file
    pub producer: Option<String>,
    /// Creation date as stored (`D:YYYYMMDDHHmmSS...`)
    pub creation_date: Option<String>,
    /// Modification date as stored
    pub mod_date: Option<String>,
}

impl DocumentInfo {
    const KEYS: [&'static str; 8] = [
        "Title",
        "Author",
        "Subject",
        "Keywords",
        "Creator",
        "Producer",
        "CreationDate",
        "ModDate",
    ];

    fn fields(&self) -> [&Option<String>; 8] {
        [
            &self.title,
            &self.author,
            &self.subject,
            &self.keywords,
            &self.creator,
            &self.producer,
            &self.creation_date,
            &self.mod_date,
        ]
    }

    fn fields_mut(&mut self) -> [&mut Option<String>; 8] {
        [
            &mut self.title,
            &mut self.author,
            &mut self.subject,
            &mut self.keywords,
            &mut self.creator,
            &mut self.producer,
            &mut self.creation_date,
            &mut self.mod_date,
        ]
    }
}

/// Size and orientation of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page index
    pub index: usize,
    /// MediaBox width in points
    pub width: f64,
    /// MediaBox height in points
    pub height: f64,
    /// Normalized `/Rotate` value
    pub rotation: i64,
    /// Object number of the page dictionary
    pub object_id: u32,
}

/// One annotation found on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationInfo {
    /// 1-based page index
    pub page: usize,
    /// `/Subtype` (Link, Text, Highlight, ...)
    pub subtype: String,
    /// `/Contents` text, if any
    pub contents: Option<String>,
    /// Annotation rectangle
    pub rect: Option<Rect>,
}

/// Decode a text string: UTF-16BE with a byte order mark, else Latin-1.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a text string as Latin-1 when possible, else UTF-16BE with a BOM.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    if text.chars().all(|c| (c as u32) < 0x100) {
        return text.chars().map(|c| c as u8).collect();
    }
    let mut out = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// Normalize a rotation to one of 0, 90, 180 or 270.
pub fn normalize_rotation(degrees: i64) -> i64 {
    degrees.rem_euclid(360)
}

/// An in-memory document.
#[derive(Clone)]
pub struct Document {
    objects: BTreeMap<u32, Slot>,
    trailer: Dictionary,
    version: String,
    options: ParseOptions,
    /// Object-stream members of a document that is still encrypted:
    /// member id → (stream id, index).
    compressed: BTreeMap<u32, (u32, u32)>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("objects", &self.objects.len())
            .field("pages", &self.page_count())
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document: a Catalog (object 1) and an empty page tree
    /// root (object 2).
    pub fn new() -> Self {
        Self::with_root_ids(1, 2)
    }

    /// Empty document whose Catalog and page tree root use the given
    /// object numbers.
    pub(crate) fn with_root_ids(catalog: u32, pages: u32) -> Self {
        let mut objects = BTreeMap::new();
        objects.insert(
            catalog,
            Slot {
                gen: 0,
                object: Object::Dictionary(dict([
                    ("Type", Object::name("Catalog")),
                    ("Pages", Object::Reference(ObjectRef::new(pages, 0))),
                ])),
            },
        );
        objects.insert(
            pages,
            Slot {
                gen: 0,
                object: Object::Dictionary(dict([
                    ("Type", Object::name("Pages")),
                    ("Kids", Object::Array(Vec::new())),
                    ("Count", Object::Integer(0)),
                ])),
            },
        );
        Self {
            objects,
            trailer: dict([("Root", Object::Reference(ObjectRef::new(catalog, 0)))]),
            version: "1.7".to_string(),
            options: ParseOptions::default(),
            compressed: BTreeMap::new(),
        }
    }

    /// Parse a document with the default (lenient) options.
    pub fn open(data: &[u8]) -> Result<Self> {
        Self::open_with_options(data, &ParseOptions::default())
    }

    /// Parse a document.
    ///
    /// Fails with a parse error ([`Error::is_parse_error`]) on structural
    /// corruption that the options do not allow recovering from.
    pub fn open_with_options(data: &[u8], options: &ParseOptions) -> Result<Self> {
        if options.max_file_size > 0 && data.len() > options.max_file_size {
            return Err(Error::parse(
                0,
                format!("input is {} bytes, limit is {}", data.len(), options.max_file_size),
            ));
        }
        let version = parse_header(data)?;
        let decode = options.decode_options();

        let mut reconstructed = false;
        let mut table = match find_xref_offset(data).and_then(|off| parse_xref(data, off, &decode)) {
            Ok(table) if table.trailer().is_some() => table,
            Ok(_) if !options.reconstruct_xref => return Err(Error::InvalidXref),
            Err(e) if !options.reconstruct_xref => return Err(e),
            Ok(_) | Err(_) => {
                log::warn!("cross-reference data unusable, reconstructing by scanning the file");
                reconstructed = true;
                reconstruct_xref(data, options.max_nesting)?
            },
        };
        let trailer = table.take_trailer().ok_or(Error::InvalidXref)?;

        let mut objects = BTreeMap::new();
        let mut compressed = BTreeMap::new();
        let mut failed = Vec::new();
        for (id, entry) in table.iter() {
            match *entry {
                XRefEntry::Uncompressed { offset, .. } => {
                    match load_object(data, id, offset, options) {
                        Ok(slot) => {
                            objects.insert(id, slot);
                        },
                        Err(e) if options.strict => return Err(e),
                        Err(e) => {
                            log::warn!("object {} at offset {}: {}", id, offset, e);
                            failed.push(id);
                        },
                    }
                },
                XRefEntry::Compressed { stream, index } => {
                    compressed.insert(id, (stream, index));
                },
                XRefEntry::Free { .. } => {},
            }
        }

        if !failed.is_empty() && !reconstructed {
            recover_objects(data, &failed, options, &mut objects);
        }

        let mut doc = Self {
            objects,
            trailer,
            version,
            options: *options,
            compressed,
        };
        doc.check_stream_lengths()?;
        if reconstructed {
            doc.register_scanned_object_streams();
        }

        match doc.root_ref() {
            Some(r) if doc.get(r).is_some() => {},
            _ => return Err(Error::parse(0, "trailer has no valid /Root")),
        }

        if doc.trailer.contains_key("Encrypt") {
            match doc.unlock(b"") {
                Ok(()) => log::info!("opened encrypted document with the empty user password"),
                Err(e) => log::warn!("document stays locked: {}", e),
            }
        } else {
            doc.expand_object_streams()?;
        }

        log::debug!(
            "opened document: version {}, {} objects, {} pages",
            doc.version,
            doc.objects.len(),
            doc.page_count()
        );
        Ok(doc)
    }

    /// Read and parse a file.
    ///
    /// Failures are reported as [`Error::Input`] carrying `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let result = std::fs::read(path)
            .map_err(Error::from)
            .and_then(|data| Self::open(&data))
            .map_err(|e| e.for_input(path));
        let pages = result.as_ref().ok().map(Document::page_count);
        audit::record_file("load", path, result, pages)
    }

    /// Serialize and atomically write to `path`.
    ///
    /// Failures are reported as [`Error::Input`] carrying `path`.
    pub fn save(&self, path: impl AsRef<Path>, config: &WriterConfig) -> Result<()> {
        let path = path.as_ref();
        let result = writer::write_document(self, config, None)
            .and_then(|bytes| writer::atomic::save_atomic(path, &bytes))
            .map_err(|e| e.for_input(path));
        audit::record_file("save", path, result, Some(self.page_count()))
    }

    /// Header version, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Replace the header version.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Options the document was opened with.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    // ----- object table -----

    /// Look up an indirect object. The generation must match.
    pub fn get(&self, r: ObjectRef) -> Option<&Object> {
        self.objects
            .get(&r.id)
            .filter(|slot| slot.gen == r.gen)
            .map(|slot| &slot.object)
    }

    /// Mutable lookup of an indirect object.
    pub fn get_mut(&mut self, r: ObjectRef) -> Option<&mut Object> {
        self.objects
            .get_mut(&r.id)
            .filter(|slot| slot.gen == r.gen)
            .map(|slot| &mut slot.object)
    }

    /// Follow references until a direct value is reached.
    ///
    /// Never fails: a dangling reference resolves to `Null`.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut current = obj;
        for _ in 0..MAX_RESOLVE_CHAIN {
            match current {
                Object::Reference(r) => match self.get(*r) {
                    Some(target) => current = target,
                    None => {
                        log::debug!("dangling reference {} resolves to null", r);
                        return &NULL;
                    },
                },
                direct => return direct,
            }
        }
        log::warn!("reference chain longer than {} links", MAX_RESOLVE_CHAIN);
        &NULL
    }

    /// Resolve a reference.
    pub fn resolve_ref(&self, r: ObjectRef) -> &Object {
        match self.get(r) {
            Some(obj) => self.resolve(obj),
            None => &NULL,
        }
    }

    /// Store `obj` under a fresh object number.
    pub fn add_object(&mut self, obj: Object) -> ObjectRef {
        let id = self.next_object_id();
        self.objects.insert(id, Slot { gen: 0, object: obj });
        ObjectRef::new(id, 0)
    }

    /// Store `obj` under `r`, replacing any previous object with that number.
    pub fn set_object(&mut self, r: ObjectRef, obj: Object) {
        self.objects.insert(
            r.id,
            Slot {
                gen: r.gen,
                object: obj,
            },
        );
    }

    /// Remove an object from the table.
    pub fn remove_object(&mut self, r: ObjectRef) -> Option<Object> {
        match self.objects.get(&r.id) {
            Some(slot) if slot.gen == r.gen => self.objects.remove(&r.id).map(|s| s.object),
            _ => None,
        }
    }

    /// Smallest object number above every used one.
    pub fn next_object_id(&self) -> u32 {
        self.max_object_id() + 1
    }

    /// Highest object number in use (0 for an empty table).
    pub fn max_object_id(&self) -> u32 {
        self.objects.keys().next_back().copied().unwrap_or(0)
    }

    /// Number of objects in the table.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// All objects in ascending object-number order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectRef, &Object)> + '_ {
        self.objects
            .iter()
            .map(|(&id, slot)| (ObjectRef::new(id, slot.gen), &slot.object))
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub(crate) fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    fn root_ref(&self) -> Option<ObjectRef> {
        self.trailer.get("Root").and_then(Object::as_reference)
    }

    /// The document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.root_ref()
            .ok_or_else(|| Error::parse(0, "trailer has no /Root reference"))
    }

    /// The root node of the page tree.
    pub fn pages_root_ref(&self) -> Result<ObjectRef> {
        let catalog = self.resolve_ref(self.catalog_ref()?);
        catalog
            .as_dict()
            .and_then(|d| d.get("Pages"))
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::parse(0, "catalog has no /Pages reference"))
    }

    // ----- encryption -----

    /// True while the document carries an `/Encrypt` dictionary that has not
    /// been authenticated.
    pub fn is_encrypted(&self) -> bool {
        self.trailer.contains_key("Encrypt")
    }

    pub(crate) fn ensure_unlocked(&self, operation: &'static str) -> Result<()> {
        if self.is_encrypted() {
            return Err(Error::Encryption(format!(
                "{}: document is encrypted, decrypt it with a password first",
                operation
            )));
        }
        Ok(())
    }

    /// First element of the trailer `/ID`.
    pub fn file_id(&self) -> Option<Vec<u8>> {
        let id = self.trailer.get("ID")?;
        let first = self.resolve(id).as_array()?.first()?;
        self.resolve(first).as_string().map(<[u8]>::to_vec)
    }

    /// Return the file identifier, generating and storing one when absent.
    pub(crate) fn ensure_file_id(&mut self) -> Vec<u8> {
        if let Some(id) = self.file_id() {
            return id;
        }
        let id = writer::generate_file_id();
        self.trailer.insert(
            "ID".to_string(),
            Object::Array(vec![Object::String(id.clone()), Object::String(id.clone())]),
        );
        id
    }

    /// Authenticate `password` and decrypt every object in place.
    ///
    /// Fails with [`Error::Auth`] when the password matches neither the
    /// user nor the owner password; the document is then unchanged.
    pub fn unlock(&mut self, password: &[u8]) -> Result<()> {
        let Some(encrypt) = self.trailer.get("Encrypt").cloned() else {
            return Ok(());
        };
        let encrypt_id = encrypt.as_reference().map(|r| r.id);
        let dict = EncryptDict::from_object(self.resolve(&encrypt))?;
        let file_id = self.file_id().unwrap_or_default();
        let handler = SecurityHandler::authenticate(&dict, &file_id, password)?;

        let mut unlocked = self.clone();
        for (&id, slot) in unlocked.objects.iter_mut() {
            if Some(id) == encrypt_id {
                continue;
            }
            match slot.object.dict_type() {
                Some("XRef") => continue,
                Some("Metadata") if !dict.encrypt_metadata => continue,
                _ => handler.decrypt_object(&mut slot.object, id, slot.gen),
            }
        }
        unlocked.trailer.remove("Encrypt");
        if let Some(id) = encrypt_id {
            unlocked.objects.remove(&id);
        }
        unlocked.expand_object_streams()?;

        log::info!("decrypted document ({:?})", handler.algorithm());
        *self = unlocked;
        Ok(())
    }

    // ----- loading helpers -----

    fn check_stream_lengths(&mut self) -> Result<()> {
        let mut fixes = Vec::new();
        for (&id, slot) in &self.objects {
            let Object::Stream { dict, data } = &slot.object else {
                continue;
            };
            let declared = dict
                .get("Length")
                .map(|l| self.resolve(l))
                .and_then(Object::as_integer);
            match declared {
                Some(len) if len >= 0 && len as usize == data.len() => {},
                _ if self.options.strict => {
                    return Err(Error::parse(
                        0,
                        format!(
                            "stream object {} /Length {:?} does not match {} payload bytes",
                            id,
                            declared,
                            data.len()
                        ),
                    ))
                },
                _ => {
                    log::warn!(
                        "stream object {} /Length {:?} corrected to {}",
                        id,
                        declared,
                        data.len()
                    );
                    fixes.push((id, data.len()));
                },
            }
        }
        for (id, len) in fixes {
            if let Some(d) = self.objects.get_mut(&id).and_then(|s| s.object.as_dict_mut()) {
                d.insert("Length".to_string(), Object::Integer(len as i64));
            }
        }
        Ok(())
    }

    /// After reconstruction there are no compressed xref entries; register
    /// every member of every object stream not defined elsewhere.
    fn register_scanned_object_streams(&mut self) {
        if self.is_encrypted() {
            return;
        }
        let decode = self.options.decode_options();
        for (&stream_id, slot) in &self.objects {
            if slot.object.dict_type() != Some("ObjStm") {
                continue;
            }
            let Ok(members) = parse_object_stream(&slot.object, &decode, self.options.max_nesting) else {
                continue;
            };
            for (index, (id, _)) in members.iter().enumerate() {
                if !self.objects.contains_key(id) {
                    self.compressed.entry(*id).or_insert((stream_id, index as u32));
                }
            }
        }
    }

    /// Move object-stream members into the object table, then drop the
    /// object streams and cross-reference streams themselves.
    fn expand_object_streams(&mut self) -> Result<()> {
        let streams: BTreeSet<u32> = self.compressed.values().map(|&(s, _)| s).collect();
        let decode = self.options.decode_options();
        let mut loaded = Vec::new();

        for stream_id in streams {
            let Some(slot) = self.objects.get(&stream_id) else {
                if self.options.strict {
                    return Err(Error::parse(0, format!("object stream {} is missing", stream_id)));
                }
                log::warn!("object stream {} is missing", stream_id);
                continue;
            };
            match parse_object_stream(&slot.object, &decode, self.options.max_nesting) {
                Ok(members) => loaded.extend(members.into_iter().filter(|(id, _)| {
                    self.compressed.get(id).map(|&(s, _)| s) == Some(stream_id)
                })),
                Err(e) if self.options.strict => return Err(e),
                Err(e) => log::warn!("object stream {}: {}", stream_id, e),
            }
        }

        for (id, object) in loaded {
            self.objects.insert(id, Slot { gen: 0, object });
        }
        self.objects
            .retain(|_, slot| !matches!(slot.object.dict_type(), Some("ObjStm") | Some("XRef")));
        self.compressed.clear();
        Ok(())
    }

    // ----- pages -----

    /// The flattened page order.
    ///
    /// Walks the page tree left to right. `/Count` is ignored, nodes already
    /// visited are skipped.
    pub fn pages(&self) -> Vec<PageHandle> {
        let mut out = Vec::new();
        let Ok(root) = self.pages_root_ref() else {
            return out;
        };
        let mut visited = HashSet::new();
        self.collect_pages(root, None, 0, &mut visited, &mut out);
        out
    }

    fn collect_pages(
        &self,
        node: ObjectRef,
        parent: Option<ObjectRef>,
        depth: usize,
        visited: &mut HashSet<ObjectRef>,
        out: &mut Vec<PageHandle>,
    ) {
        if depth > MAX_TREE_DEPTH {
            log::warn!("page tree deeper than {} levels, skipping {}", MAX_TREE_DEPTH, node);
            return;
        }
        if !visited.insert(node) {
            log::warn!("page tree node {} visited twice, skipping", node);
            return;
        }
        let Some(d) = self.get(node).and_then(Object::as_dict) else {
            log::warn!("page tree node {} is missing", node);
            return;
        };

        let is_leaf = match d.get("Type").and_then(Object::as_name) {
            Some("Page") => true,
            Some("Pages") => false,
            _ => !d.contains_key("Kids"),
        };
        if is_leaf {
            out.push(PageHandle {
                index: out.len() + 1,
                object_ref: node,
                parent,
            });
            return;
        }

        let kids = d.get("Kids").map(|k| self.resolve(k));
        for kid in kids.and_then(Object::as_array).into_iter().flatten() {
            match kid.as_reference() {
                Some(r) => self.collect_pages(r, Some(node), depth + 1, visited, out),
                None => log::warn!("non-reference entry in /Kids of {}", node),
            }
        }
    }

    /// Number of pages in the flattened order.
    pub fn page_count(&self) -> usize {
        self.pages().len()
    }

    /// Look up a page by 1-based index.
    pub fn page(&self, index: usize) -> Result<PageHandle> {
        self.page_for("page", index)
    }

    pub(crate) fn page_for(&self, operation: &'static str, index: usize) -> Result<PageHandle> {
        let pages = self.pages();
        let page_count = pages.len();
        if index == 0 || index > page_count {
            return Err(Error::PageNotFound {
                operation,
                page: index,
                page_count,
            });
        }
        Ok(pages[index - 1])
    }

    /// A page dictionary.
    pub fn page_dict(&self, page: &PageHandle) -> Option<&Dictionary> {
        self.get(page.object_ref).and_then(Object::as_dict)
    }

    /// Look up `key` on a page, falling back to its ancestors.
    pub fn effective_attribute(&self, page_ref: ObjectRef, key: &str) -> Option<&Object> {
        let mut visited = HashSet::new();
        let mut current = page_ref;
        for _ in 0..MAX_TREE_DEPTH {
            if !visited.insert(current) {
                return None;
            }
            let d = self.get(current)?.as_dict()?;
            if let Some(value) = d.get(key) {
                return Some(self.resolve(value));
            }
            current = d.get("Parent")?.as_reference()?;
        }
        None
    }

    /// Effective MediaBox of a page, A4 when none is set.
    pub fn media_box(&self, page_ref: ObjectRef) -> Rect {
        self.effective_attribute(page_ref, "MediaBox")
            .and_then(Rect::from_object)
            .unwrap_or_else(|| Rect::new(0.0, 0.0, DEFAULT_PAGE_SIZE.0, DEFAULT_PAGE_SIZE.1))
    }

    /// Effective, normalized rotation of a page.
    pub fn rotation(&self, page_ref: ObjectRef) -> i64 {
        self.effective_attribute(page_ref, "Rotate")
            .and_then(Object::as_number)
            .map(|r| normalize_rotation(r as i64))
            .unwrap_or(0)
    }

    /// MediaBox width and height of a page.
    pub fn dimensions(&self, index: usize) -> Result<(f64, f64)> {
        let page = self.page_for("dimensions", index)?;
        let rect = self.media_box(page.object_ref);
        Ok((rect.width, rect.height))
    }

    /// Size, rotation and object number of a page.
    pub fn page_info(&self, index: usize) -> Result<PageInfo> {
        let page = self.page_for("page_info", index)?;
        let rect = self.media_box(page.object_ref);
        Ok(PageInfo {
            index,
            width: rect.width,
            height: rect.height,
            rotation: self.rotation(page.object_ref),
            object_id: page.object_ref.id,
        })
    }

    // ----- reader helpers -----

    /// Read the `/Info` dictionary.
    pub fn metadata(&self) -> DocumentInfo {
        let mut info = DocumentInfo::default();
        let Some(d) = self.trailer.get("Info").and_then(|i| self.resolve(i).as_dict()) else {
            return info;
        };
        for (key, field) in DocumentInfo::KEYS.iter().zip(info.fields_mut()) {
            *field = d
                .get(*key)
                .map(|v| self.resolve(v))
                .and_then(Object::as_string)
                .map(decode_text_string);
        }
        info
    }

    /// Write the fields that are set in `info` into `/Info`, creating the
    /// dictionary when needed. Unset fields are left as they are.
    pub fn set_metadata(&mut self, info: &DocumentInfo) {
        let info_ref = match self.trailer.get("Info").and_then(Object::as_reference) {
            Some(r) if self.get(r).and_then(Object::as_dict).is_some() => r,
            _ => {
                let r = self.add_object(Object::Dictionary(Dictionary::new()));
                self.trailer.insert("Info".to_string(), Object::Reference(r));
                r
            },
        };
        if let Some(d) = self.get_mut(info_ref).and_then(Object::as_dict_mut) {
            for (key, field) in DocumentInfo::KEYS.iter().zip(info.fields()) {
                if let Some(value) = field {
                    d.insert(key.to_string(), Object::String(encode_text_string(value)));
                }
            }
        }
    }

    /// Distinct `/BaseFont` names used by all pages, sorted.
    pub fn fonts(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for page in self.pages() {
            let Some(resources) = self
                .effective_attribute(page.object_ref, "Resources")
                .and_then(Object::as_dict)
            else {
                continue;
            };
            let Some(fonts) = resources.get("Font").and_then(|f| self.resolve(f).as_dict()) else {
                continue;
            };
            for font in fonts.values() {
                if let Some(base) = self
                    .resolve(font)
                    .as_dict()
                    .and_then(|d| d.get("BaseFont"))
                    .and_then(Object::as_name)
                {
                    names.insert(base.to_string());
                }
            }
        }
        names.into_iter().collect()
    }

    /// Annotations of every page in page order.
    pub fn annotations(&self) -> Vec<AnnotationInfo> {
        let mut out = Vec::new();
        for page in self.pages() {
            let Some(annots) = self
                .page_dict(&page)
                .and_then(|d| d.get("Annots"))
                .map(|a| self.resolve(a))
                .and_then(Object::as_array)
            else {
                continue;
            };
            for annot in annots {
                let Some(d) = self.resolve(annot).as_dict() else {
                    continue;
                };
                out.push(AnnotationInfo {
                    page: page.index,
                    subtype: d
                        .get("Subtype")
                        .and_then(Object::as_name)
                        .unwrap_or("Unknown")
                        .to_string(),
                    contents: d
                        .get("Contents")
                        .map(|c| self.resolve(c))
                        .and_then(Object::as_string)
                        .map(decode_text_string),
                    rect: d.get("Rect").map(|r| self.resolve(r)).and_then(Rect::from_object),
                });
            }
        }
        out
    }
}

fn parse_header(data: &[u8]) -> Result<String> {
    let window = &data[..data.len().min(1024)];
    let Some(pos) = window.windows(5).position(|w| w == b"%PDF-") else {
        let shown = String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned();
        return Err(Error::InvalidHeader(shown));
    };
    if pos > 0 {
        log::warn!("header found at byte {}, not at the start", pos);
    }
    let version: String = data[pos + 5..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|&b| b as char)
        .collect();
    if version.is_empty() {
        return Err(Error::InvalidHeader(
            String::from_utf8_lossy(&data[pos..data.len().min(pos + 8)]).into_owned(),
        ));
    }
    Ok(version)
}

fn load_object(data: &[u8], id: u32, offset: usize, options: &ParseOptions) -> Result<Slot> {
    let (r, object) = parse_indirect_object_at(data, offset, options.max_nesting)?;
    if r.id != id {
        return Err(Error::parse(
            offset,
            format!("expected object {}, found {}", id, r),
        ));
    }
    Ok(Slot { gen: r.gen, object })
}

/// Reload objects whose xref offsets were wrong from a scanned table.
fn recover_objects(
    data: &[u8],
    failed: &[u32],
    options: &ParseOptions,
    objects: &mut BTreeMap<u32, Slot>,
) {
    if !options.reconstruct_xref {
        log::warn!("{} objects could not be loaded", failed.len());
        return;
    }
    let scanned: CrossRefTable = match reconstruct_xref(data, options.max_nesting) {
        Ok(table) => table,
        Err(e) => {
            log::warn!("scan for misplaced objects failed: {}", e);
            return;
        },
    };
    for &id in failed {
        match scanned.get(id) {
            Some(&XRefEntry::Uncompressed { offset, .. }) => match load_object(data, id, offset, options) {
                Ok(slot) => {
                    log::info!("recovered object {} at offset {}", id, offset);
                    objects.insert(id, slot);
                },
                Err(e) => log::warn!("object {} unrecoverable: {}", id, e),
            },
            _ => log::warn!("object {} not found by scanning", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_config::ParseOptions;

    /// Build a file from object bodies, computing a correct xref table.
    fn build_pdf(bodies: &[&str], trailer_extra: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
        for off in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
                bodies.len() + 1,
                trailer_extra,
                xref
            )
            .as_bytes(),
        );
        out
    }

    fn two_page_pdf() -> Vec<u8> {
        build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] >>",
                "<< /Type /Page /Parent 2 0 R /Rotate -90 >>",
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 200] /Contents 5 0 R >>",
                "<< /Length 5 >>\nstream\nBT ET\nendstream",
                "<< /Title (Report) /Author <FEFF00C400DF> >>",
            ],
            "/Info 6 0 R",
        )
    }

    #[test]
    fn test_new_document_is_empty_and_valid() {
        let doc = Document::new();
        assert_eq!(doc.page_count(), 0);
        assert_eq!(doc.catalog_ref().unwrap(), ObjectRef::new(1, 0));
        assert_eq!(doc.pages_root_ref().unwrap(), ObjectRef::new(2, 0));
        assert_eq!(doc.next_object_id(), 3);
        assert!(!doc.is_encrypted());
    }

    #[test]
    fn test_open_pages_and_inheritance() {
        let doc = Document::open(&two_page_pdf()).unwrap();
        assert_eq!(doc.version(), "1.4");
        let pages = doc.pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].index, 1);
        assert_eq!(pages[0].parent, Some(ObjectRef::new(2, 0)));
        assert_eq!(doc.dimensions(1).unwrap(), (612.0, 792.0));
        assert_eq!(doc.dimensions(2).unwrap(), (100.0, 200.0));
        assert_eq!(doc.rotation(pages[0].object_ref), 270);
        assert!(matches!(
            doc.page(3),
            Err(Error::PageNotFound { page: 3, page_count: 2, .. })
        ));
        assert!(doc.page(0).is_err());
    }

    #[test]
    fn test_metadata_read_and_write() {
        let mut doc = Document::open(&two_page_pdf()).unwrap();
        let info = doc.metadata();
        assert_eq!(info.title.as_deref(), Some("Report"));
        assert_eq!(info.author.as_deref(), Some("Äß"));
        assert!(info.producer.is_none());

        doc.set_metadata(&DocumentInfo {
            subject: Some("Quarterly".to_string()),
            ..Default::default()
        });
        let info = doc.metadata();
        assert_eq!(info.subject.as_deref(), Some("Quarterly"));
        assert_eq!(info.title.as_deref(), Some("Report"));
    }

    #[test]
    fn test_resolve_dangling_is_null() {
        let doc = Document::new();
        let dangling = Object::Reference(ObjectRef::new(99, 0));
        assert!(doc.resolve(&dangling).is_null());
        let wrong_gen = Object::Reference(ObjectRef::new(1, 3));
        assert!(doc.resolve(&wrong_gen).is_null());
    }

    #[test]
    fn test_invalid_header() {
        assert!(matches!(Document::open(b"GIF89a..."), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_bad_length_lenient_and_strict() {
        let data = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] >>",
                "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>",
                "<< /Length 99 >>\nstream\nBT ET\nendstream",
            ],
            "",
        );
        let doc = Document::open(&data).unwrap();
        let stream = doc.get(ObjectRef::new(4, 0)).unwrap();
        assert_eq!(stream.as_dict().unwrap()["Length"], Object::Integer(5));

        let err = Document::open_with_options(&data, &ParseOptions::strict()).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_broken_xref_is_reconstructed() {
        let mut data = two_page_pdf();
        let pos = data.windows(9).position(|w| w == b"startxref").unwrap();
        data.truncate(pos);
        data.extend_from_slice(b"startxref\n999999\n%%EOF\n");
        let doc = Document::open(&data).unwrap();
        assert_eq!(doc.page_count(), 2);

        let strict = ParseOptions::strict();
        assert!(Document::open_with_options(&data, &strict).is_err());
    }

    #[test]
    fn test_page_tree_cycle_is_guarded() {
        let data = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R 2 0 R] >>",
                "<< /Type /Page /Parent 2 0 R >>",
            ],
            "",
        );
        let doc = Document::open(&data).unwrap();
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_fonts_and_annotations() {
        let data = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] /Resources << /Font << /F1 4 0 R /F2 5 0 R >> >> >>",
                "<< /Type /Page /Parent 2 0 R /Annots [<< /Subtype /Text /Contents (Note) /Rect [0 0 10 10] >>] >>",
                "<< /Type /Font /BaseFont /Helvetica >>",
                "<< /Type /Font /BaseFont /Courier >>",
            ],
            "",
        );
        let doc = Document::open(&data).unwrap();
        assert_eq!(doc.fonts(), vec!["Courier", "Helvetica"]);
        let annots = doc.annotations();
        assert_eq!(annots.len(), 1);
        assert_eq!(annots[0].subtype, "Text");
        assert_eq!(annots[0].contents.as_deref(), Some("Note"));
        assert_eq!(annots[0].rect, Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_text_string_encoding() {
        assert_eq!(encode_text_string("abc"), b"abc");
        let utf16 = encode_text_string("€");
        assert_eq!(utf16, vec![0xFE, 0xFF, 0x20, 0xAC]);
        assert_eq!(decode_text_string(&utf16), "€");
        assert_eq!(decode_text_string(b"caf\xe9"), "café");
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(360), 0);
    }

    #[test]
    fn test_add_and_remove_objects() {
        let mut doc = Document::new();
        let r = doc.add_object(Object::Integer(7));
        assert_eq!(r, ObjectRef::new(3, 0));
        assert_eq!(doc.resolve_ref(r), &Object::Integer(7));
        assert!(doc.remove_object(ObjectRef::new(3, 1)).is_none());
        assert_eq!(doc.remove_object(r), Some(Object::Integer(7)));
        assert_eq!(doc.object_count(), 2);
    }
}
