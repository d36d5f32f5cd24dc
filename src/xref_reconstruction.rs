//! Cross-reference reconstruction for damaged files.
//!
//! When the stored xref is missing or unusable, the file is scanned for
//! `N G obj` headers. A later definition of the same object number wins,
//! matching how incremental updates append newer versions. The trailer is
//! taken from the last `trailer << ... >>` in the file, or synthesized
//! around the first `/Type /Catalog` object.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::{parse_indirect_object_at, parse_object};
use crate::xref::{CrossRefTable, XRefEntry};
use lazy_static::lazy_static;

lazy_static! {
    static ref RE_OBJ_HEADER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(\d+)[ \t\r\n\x0C\x00]+(\d+)[ \t\r\n\x0C\x00]+obj\b").unwrap();
    static ref RE_TRAILER: regex::bytes::Regex = regex::bytes::Regex::new(r"trailer\s*<<").unwrap();
}

/// Rebuild the cross-reference table and trailer by scanning `data`.
pub fn reconstruct_xref(data: &[u8], max_nesting: usize) -> Result<CrossRefTable> {
    log::warn!("reconstructing cross-reference table by scanning {} bytes", data.len());

    let mut table = CrossRefTable::new();
    for caps in RE_OBJ_HEADER.captures_iter(data) {
        let (Some(whole), Some(id), Some(gen)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let offset = whole.start();
        // "12 0 obj" must not be the tail of a longer digit run.
        if offset > 0 && data[offset - 1].is_ascii_digit() {
            continue;
        }
        let parse_num = |m: regex::bytes::Match<'_>| {
            std::str::from_utf8(m.as_bytes()).ok().and_then(|s| s.parse::<u64>().ok())
        };
        let (Some(id), Some(gen)) = (parse_num(id), parse_num(gen)) else {
            continue;
        };
        let (Ok(id), Ok(gen)) = (u32::try_from(id), u16::try_from(gen)) else {
            continue;
        };
        if !looks_like_object_start(&data[whole.end()..]) {
            log::debug!("skipping false object header at offset {}", offset);
            continue;
        }
        table.add_entry(id, XRefEntry::Uncompressed { offset, gen });
    }

    if table.is_empty() {
        return Err(Error::parse(0, "no objects found while reconstructing xref"));
    }
    log::info!("reconstructed xref with {} objects", table.len());

    let trailer = find_trailer(data).unwrap_or_default();
    let trailer = if trailer.contains_key("Root") {
        trailer
    } else {
        synthesize_trailer(data, &table, trailer, max_nesting)?
    };
    table.set_trailer(trailer);

    Ok(table)
}

fn looks_like_object_start(rest: &[u8]) -> bool {
    let skip = rest.iter().take_while(|c| c.is_ascii_whitespace()).count();
    match rest.get(skip) {
        Some(&c) => {
            matches!(c, b'<' | b'[' | b'(' | b'/' | b't' | b'f' | b'n' | b'-' | b'+' | b'.')
                || c.is_ascii_digit()
        },
        None => false,
    }
}

fn find_trailer(data: &[u8]) -> Option<Dictionary> {
    let last = RE_TRAILER.find_iter(data).last()?;
    let input = &data[last.start() + b"trailer".len()..];
    match parse_object(input) {
        Ok((_, Object::Dictionary(dict))) => Some(dict),
        Ok(_) | Err(_) => {
            log::warn!("unparsable trailer at offset {}", last.start());
            None
        },
    }
}

fn synthesize_trailer(
    data: &[u8],
    table: &CrossRefTable,
    mut trailer: Dictionary,
    max_nesting: usize,
) -> Result<Dictionary> {
    let catalog = table.iter().find_map(|(id, entry)| match *entry {
        XRefEntry::Uncompressed { offset, gen } => {
            match parse_indirect_object_at(data, offset, max_nesting) {
                Ok((_, obj)) if obj.dict_type() == Some("Catalog") => Some(ObjectRef::new(id, gen)),
                _ => None,
            }
        },
        _ => None,
    });

    let catalog = catalog.ok_or_else(|| Error::parse(0, "no catalog found while reconstructing xref"))?;
    log::info!("using object {} as the catalog", catalog);
    trailer.insert("Root".to_string(), Object::Reference(catalog));
    Ok(trailer)
}
