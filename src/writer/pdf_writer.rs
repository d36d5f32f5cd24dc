//! Document writer.
//!
//! Emits a complete file: header, every live object in ascending id order,
//! a classic cross-reference table and the trailer.

use super::object_serializer::ObjectSerializer;
use crate::audit;
use crate::decoders::{encode_stream, DecodeOptions, Filter};
use crate::document::Document;
use crate::encryption::{EncryptDict, SecurityHandler};
use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectRef};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

/// Configuration for serialization.
///
/// # Examples
///
/// ```
/// use pdf_forge::writer::WriterConfig;
///
/// let config = WriterConfig::default().with_compress(true).with_producer("pdf_forge");
/// assert!(config.compress);
/// assert!(config.garbage_collect);
/// ```
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Header version; the document's own version when `None`
    pub version: Option<String>,
    /// Flate-compress streams when that makes them smaller
    pub compress: bool,
    /// Drop objects unreachable from the trailer
    pub garbage_collect: bool,
    /// Stamp `/ModDate` in `/Info`
    pub update_modification_date: bool,
    /// Stamp `/Producer` in `/Info`
    pub producer: Option<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            version: None,
            compress: false,
            garbage_collect: true,
            update_modification_date: false,
            producer: None,
        }
    }
}

impl WriterConfig {
    /// Override the header version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Enable or disable dropping unreachable objects.
    pub fn with_garbage_collect(mut self, garbage_collect: bool) -> Self {
        self.garbage_collect = garbage_collect;
        self
    }

    /// Stamp the current time as `/ModDate`.
    pub fn with_update_modification_date(mut self, update: bool) -> Self {
        self.update_modification_date = update;
        self
    }

    /// Stamp `/Producer`.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }
}

/// Key material applied while writing an encrypted file.
#[derive(Debug, Clone)]
pub struct EncryptionContext {
    pub(crate) handler: SecurityHandler,
    pub(crate) dict: EncryptDict,
}

/// A fresh 16-byte file identifier.
pub fn generate_file_id() -> Vec<u8> {
    crate::encryption::random_bytes(16)
}

/// Date string in `D:YYYYMMDDHHmmSS` form, UTC.
pub fn format_date(time: chrono::DateTime<chrono::Utc>) -> String {
    time.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

/// Serialize a document.
///
/// A document without pages is written as a valid empty file.
pub fn serialize(doc: &Document, config: &WriterConfig) -> Result<Vec<u8>> {
    serialize_with(doc, config, None)
}

/// Serialize a document, encrypting strings and streams when `encryption`
/// is given.
pub fn serialize_with(
    doc: &Document,
    config: &WriterConfig,
    encryption: Option<&EncryptionContext>,
) -> Result<Vec<u8>> {
    let result = write_document(doc, config, encryption);
    audit::record("serialize", result, Some(doc.page_count()))
}

/// [`serialize_with`] without the audit event, for callers that report
/// their own.
pub(crate) fn write_document(
    doc: &Document,
    config: &WriterConfig,
    encryption: Option<&EncryptionContext>,
) -> Result<Vec<u8>> {
    doc.ensure_unlocked("serialize")?;

    let mut objects: BTreeMap<u32, (u16, Cow<'_, Object>)> = doc
        .objects()
        .map(|(r, obj)| (r.id, (r.gen, Cow::Borrowed(obj))))
        .collect();
    let mut trailer = Dictionary::new();
    trailer.insert("Root".to_string(), Object::Reference(doc.catalog_ref()?));
    if let Some(info) = doc.trailer().get("Info") {
        trailer.insert("Info".to_string(), info.clone());
    }

    stamp_info(doc, config, &mut objects, &mut trailer);

    if config.garbage_collect {
        let reachable = reachable_ids(&objects, &trailer);
        let before = objects.len();
        objects.retain(|id, _| reachable.contains(id));
        if objects.len() < before {
            log::debug!("dropped {} unreachable objects", before - objects.len());
        }
    }

    let file_id = match doc.file_id() {
        Some(id) => id,
        None => generate_file_id(),
    };
    let second_id = doc
        .trailer()
        .get("ID")
        .and_then(|id| doc.resolve(id).as_array())
        .and_then(|ids| ids.get(1))
        .and_then(|o| doc.resolve(o).as_string())
        .map(<[u8]>::to_vec)
        .unwrap_or_else(|| file_id.clone());
    trailer.insert(
        "ID".to_string(),
        Object::Array(vec![Object::String(file_id), Object::String(second_id)]),
    );

    let mut encrypt_id = None;
    if let Some(ctx) = encryption {
        let id = objects.keys().next_back().copied().unwrap_or(0) + 1;
        objects.insert(id, (0, Cow::Owned(ctx.dict.to_object())));
        trailer.insert("Encrypt".to_string(), Object::Reference(ObjectRef::new(id, 0)));
        encrypt_id = Some(id);
    }

    let size = objects.keys().next_back().copied().unwrap_or(0) + 1;
    trailer.insert("Size".to_string(), Object::Integer(size as i64));

    let serializer = ObjectSerializer::compact();
    let version = config.version.as_deref().unwrap_or(doc.version());
    let mut output = format!("%PDF-{}\n", version).into_bytes();
    output.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets: BTreeMap<u32, (usize, u16)> = BTreeMap::new();
    let mut compressed = 0usize;
    for (&id, (gen, obj)) in &objects {
        let mut obj: Cow<'_, Object> = Cow::Borrowed(obj.as_ref());
        if config.compress {
            if let Some(smaller) = compress_stream(&obj) {
                obj = Cow::Owned(smaller);
                compressed += 1;
            }
        }
        if let Some(ctx) = encryption {
            if Some(id) != encrypt_id {
                obj = Cow::Owned(ctx.handler.encrypt_object(&obj, id, *gen)?);
            }
        }
        offsets.insert(id, (output.len(), *gen));
        output.extend_from_slice(&serializer.serialize_indirect(id, *gen, &obj));
    }
    if compressed > 0 {
        log::debug!("compressed {} streams", compressed);
    }

    let xref_start = output.len();
    write_xref(&mut output, &offsets, size);

    output.extend_from_slice(b"trailer\n");
    output.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer)));
    output.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_start).as_bytes());

    log::info!(
        "serialized {} objects ({} bytes{})",
        offsets.len(),
        output.len(),
        if encryption.is_some() { ", encrypted" } else { "" }
    );
    Ok(output)
}

/// Apply `/ModDate` and `/Producer` to a copy of `/Info`.
fn stamp_info(
    doc: &Document,
    config: &WriterConfig,
    objects: &mut BTreeMap<u32, (u16, Cow<'_, Object>)>,
    trailer: &mut Dictionary,
) {
    if !config.update_modification_date && config.producer.is_none() {
        return;
    }
    let existing = trailer.get("Info").cloned();
    let mut info = existing
        .as_ref()
        .and_then(|i| doc.resolve(i).as_dict())
        .cloned()
        .unwrap_or_default();
    if config.update_modification_date {
        let now = format_date(chrono::Utc::now());
        info.insert("ModDate".to_string(), Object::String(now.into_bytes()));
    }
    if let Some(producer) = &config.producer {
        info.insert(
            "Producer".to_string(),
            Object::String(crate::document::encode_text_string(producer)),
        );
    }

    let target = match existing.as_ref().and_then(Object::as_reference) {
        Some(r) if objects.contains_key(&r.id) => r,
        _ => {
            let id = objects.keys().next_back().copied().unwrap_or(0) + 1;
            let r = ObjectRef::new(id, 0);
            trailer.insert("Info".to_string(), Object::Reference(r));
            r
        },
    };
    objects.insert(target.id, (target.gen, Cow::Owned(Object::Dictionary(info))));
}

fn reachable_ids(
    objects: &BTreeMap<u32, (u16, Cow<'_, Object>)>,
    trailer: &Dictionary,
) -> HashSet<u32> {
    let mut seen = HashSet::new();
    let mut stack = Vec::new();
    Object::Dictionary(trailer.clone()).for_each_reference(&mut |r| stack.push(r.id));
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some((_, obj)) = objects.get(&id) {
            obj.for_each_reference(&mut |r| {
                if !seen.contains(&r.id) {
                    stack.push(r.id);
                }
            });
        }
    }
    seen
}

/// Re-encode a stream as plain FlateDecode when the result is smaller.
///
/// Streams with an image codec or an unknown filter are left alone, as are
/// payloads that do not decode cleanly.
fn compress_stream(obj: &Object) -> Option<Object> {
    let Object::Stream { dict, data } = obj else {
        return None;
    };
    if matches!(obj.dict_type(), Some("Metadata") | Some("XRef")) {
        return None;
    }
    let filters = obj.filters();
    let decodable = filters
        .iter()
        .all(|f| Filter::from_name(f).is_some_and(|f| !f.is_image_codec()));
    if !decodable {
        return None;
    }

    let decoded = if filters.is_empty() {
        data.to_vec()
    } else {
        obj.decode_stream_data_with(&DecodeOptions::exact()).ok()?
    };
    let encoded = encode_stream(&decoded, &["FlateDecode".to_string()]).ok()?;
    if encoded.len() >= data.len() {
        return None;
    }

    let mut dict = dict.clone();
    dict.insert("Filter".to_string(), Object::name("FlateDecode"));
    dict.remove("DecodeParms");
    Some(Object::stream(dict, encoded))
}

/// Classic xref table; free entries form a linked list starting at 0.
fn write_xref(output: &mut Vec<u8>, offsets: &BTreeMap<u32, (usize, u16)>, size: u32) {
    // Free entries link to the next free number, the last one back to 0.
    let mut next_free = vec![0u32; size as usize];
    let mut following = 0;
    for id in (0..size).rev() {
        if !offsets.contains_key(&id) {
            next_free[id as usize] = following;
            following = id;
        }
    }

    output.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    for id in 0..size {
        let line = match offsets.get(&id) {
            Some(&(offset, gen)) => format!("{:010} {:05} n \n", offset, gen),
            None if id == 0 => format!("{:010} 65535 f \n", next_free[0]),
            None => format!("{:010} 00001 f \n", next_free[id as usize]),
        };
        output.extend_from_slice(line.as_bytes());
    }
}
