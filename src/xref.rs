//! Cross-reference table parser.
//!
//! Maps object numbers to where their bytes live: at a file offset, or as
//! the n-th member of an object stream. Both traditional `xref` sections
//! and cross-reference streams (`/Type /XRef`) are read, following `/Prev`
//! chains (and `/XRefStm` in hybrid files) so newer sections win.

use crate::decoders::DecodeOptions;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_object_at, parse_object};
use std::collections::{BTreeMap, HashSet};

/// Longest `/Prev` chain followed before giving up.
const MAX_PREV_CHAIN: usize = 100;

/// Largest subsection count accepted in a traditional table.
const MAX_SUBSECTION: u32 = 1_000_000;

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Unused object number
    Free {
        /// Next free object number
        next: u32,
        /// Generation to use on reuse
        gen: u16,
    },
    /// Object stored at a byte offset
    Uncompressed {
        /// Byte offset of `N G obj`
        offset: usize,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing `/ObjStm`
        stream: u32,
        /// Index inside that stream
        index: u32,
    },
}

impl XRefEntry {
    /// True for uncompressed and compressed entries.
    pub fn in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free { .. })
    }
}

/// Cross-reference table plus the trailer of its newest section.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Option<Dictionary>,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dictionary) {
        self.trailer = Some(trailer);
    }

    /// Trailer dictionary, if one was found.
    pub fn trailer(&self) -> Option<&Dictionary> {
        self.trailer.as_ref()
    }

    /// Take the trailer out of the table.
    pub fn take_trailer(&mut self) -> Option<Dictionary> {
        self.trailer.take()
    }

    /// Add or replace an entry.
    pub fn add_entry(&mut self, id: u32, entry: XRefEntry) {
        self.entries.insert(id, entry);
    }

    /// Look up one entry.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// All entries in ascending object-number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    /// Merge an older section. Entries already present win.
    pub fn merge_older(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = older.trailer;
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the offset after the last `startxref` keyword.
pub fn find_xref_offset(data: &[u8]) -> Result<usize> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    let digits: Vec<u8> = tail[pos + keyword.len()..]
        .iter()
        .copied()
        .skip_while(|c| c.is_ascii_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or(Error::InvalidXref)
}

/// Parse the cross-reference section at `offset` and every older section
/// reachable through `/Prev`.
pub fn parse_xref(data: &[u8], offset: usize, options: &DecodeOptions) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    let mut next = Some(offset);
    let mut table = CrossRefTable::new();

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("xref /Prev chain loops back to offset {}", offset);
            break;
        }
        if visited.len() > MAX_PREV_CHAIN {
            return Err(Error::parse(offset, "xref /Prev chain too long"));
        }

        let mut section = parse_section(data, offset, options)?;

        // Hybrid files keep compressed entries in a stream named by /XRefStm.
        let xref_stm = section
            .trailer()
            .and_then(|t| t.get("XRefStm"))
            .and_then(Object::as_integer)
            .and_then(|o| usize::try_from(o).ok());
        if let Some(stm_offset) = xref_stm {
            match parse_xref_stream(data, stm_offset, options) {
                Ok(mut stream_section) => {
                    stream_section.trailer = None;
                    section.merge_older(stream_section);
                },
                Err(e) => log::warn!("ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
            }
        }

        next = section
            .trailer()
            .and_then(|t| t.get("Prev"))
            .and_then(Object::as_integer)
            .and_then(|o| usize::try_from(o).ok());

        if visited.len() == 1 {
            table = section;
        } else {
            // Older sections never replace the newest trailer.
            let keep = table.take_trailer();
            table.merge_older(section);
            if let Some(t) = keep {
                table.set_trailer(t);
            }
        }
    }

    Ok(table)
}

fn parse_section(data: &[u8], offset: usize, options: &DecodeOptions) -> Result<CrossRefTable> {
    let rest = data.get(offset..).ok_or(Error::InvalidXref)?;
    let skip = rest.iter().take_while(|c| c.is_ascii_whitespace()).count();
    let rest = &rest[skip..];

    if rest.starts_with(b"xref") {
        log::debug!("traditional xref at offset {}", offset);
        parse_traditional_xref(data, offset + skip)
    } else if rest.first().is_some_and(u8::is_ascii_digit) {
        log::debug!("xref stream at offset {}", offset);
        parse_xref_stream(data, offset + skip, options)
    } else {
        Err(Error::InvalidXref)
    }
}

/// Split bytes into lines on LF, CRLF or a lone CR.
fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\r' => {
                lines.push(&data[start..i]);
                i += if data.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            },
            b'\n' => {
                lines.push(&data[start..i]);
                i += 1;
                start = i;
            },
            _ => i += 1,
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

fn trim(line: &[u8]) -> &[u8] {
    let start = line.iter().take_while(|c| c.is_ascii_whitespace()).count();
    let end = line.len() - line.iter().rev().take_while(|c| c.is_ascii_whitespace()).count();
    if start >= end {
        &[]
    } else {
        &line[start..end]
    }
}

fn fields(line: &[u8]) -> Vec<&str> {
    line.split(|c| c.is_ascii_whitespace())
        .filter(|f| !f.is_empty())
        .filter_map(|f| std::str::from_utf8(f).ok())
        .collect()
}

/// Parse a traditional table:
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000018 00000 n
/// 0000000077 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
fn parse_traditional_xref(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let body = &data[offset + b"xref".len()..];
    let trailer_pos = body
        .windows(b"trailer".len())
        .position(|w| w == b"trailer")
        .ok_or(Error::InvalidXref)?;

    let mut table = CrossRefTable::new();
    let lines = split_lines(&body[..trailer_pos]);
    let mut idx = 0;

    while idx < lines.len() {
        let line = trim(lines[idx]);
        idx += 1;
        if line.is_empty() || line.starts_with(b"%") {
            continue;
        }

        let header = fields(line);
        if header.len() != 2 {
            log::warn!("skipping malformed xref subsection header {:?}", String::from_utf8_lossy(line));
            continue;
        }
        let start: u32 = header[0].parse().map_err(|_| Error::InvalidXref)?;
        let count: u32 = header[1].parse().map_err(|_| Error::InvalidXref)?;
        if count > MAX_SUBSECTION {
            return Err(Error::parse(offset, "xref subsection count exceeds limit"));
        }

        let mut i = 0;
        while i < count && idx < lines.len() {
            let line = trim(lines[idx]);
            idx += 1;
            if line.is_empty() {
                continue;
            }
            let id = start.saturating_add(i);
            i += 1;

            let parts = fields(line);
            let parsed = match parts.as_slice() {
                [off, gen, kind, ..] => off
                    .parse::<usize>()
                    .ok()
                    .zip(gen.parse::<u16>().ok())
                    .map(|(off, gen)| (off, gen, kind.starts_with(['n', 'N']))),
                _ => None,
            };

            let entry = match parsed {
                Some((off, gen, true)) => XRefEntry::Uncompressed { offset: off, gen },
                Some((next, gen, false)) => XRefEntry::Free {
                    next: next as u32,
                    gen,
                },
                None => {
                    log::warn!("malformed xref entry for object {}, treating as free", id);
                    XRefEntry::Free { next: 0, gen: 65535 }
                },
            };
            // Object 0 is always the free-list head.
            if id == 0 && entry.in_use() {
                continue;
            }
            table.add_entry(id, entry);
        }
    }

    let trailer_input = &body[trailer_pos + b"trailer".len()..];
    let trailer = match parse_object(trailer_input) {
        Ok((_, Object::Dictionary(dict))) => dict,
        _ => return Err(Error::parse(offset + trailer_pos, "trailer is not a dictionary")),
    };
    table.set_trailer(trailer);

    Ok(table)
}

/// Parse a cross-reference stream.
///
/// `/W [w1 w2 w3]` gives the field widths, `/Index` the subsections
/// (default `[0 Size]`). Field 1 is the type: 0 free, 1 offset, 2 object
/// stream member. A zero-width type field means type 1.
fn parse_xref_stream(data: &[u8], offset: usize, options: &DecodeOptions) -> Result<CrossRefTable> {
    let (_, stream) = parse_indirect_object_at(data, offset, crate::parser::DEFAULT_MAX_NESTING)?;
    let dict = match &stream {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };
    if stream.dict_type().is_some_and(|t| t != "XRef") {
        return Err(Error::parse(offset, "expected /Type /XRef"));
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| {
            w.iter()
                .filter_map(Object::as_integer)
                .filter_map(|v| usize::try_from(v).ok())
                .collect()
        })
        .unwrap_or_default();
    let [w1, w2, w3] = widths[..] else {
        return Err(Error::parse(offset, "invalid /W array in xref stream"));
    };
    if w1 > 8 || w2 > 8 || w3 > 8 {
        return Err(Error::parse(offset, "xref stream field width over 8 bytes"));
    }
    let entry_size = w1 + w2 + w3;
    if entry_size == 0 {
        return Err(Error::parse(offset, "xref stream entries are empty"));
    }

    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .and_then(|s| u32::try_from(s).ok())
        .ok_or_else(|| Error::parse(offset, "missing /Size in xref stream"))?;

    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(Object::as_array) {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| match pair {
                [start, count] => Some((
                    u32::try_from(start.as_integer()?).ok()?,
                    u32::try_from(count.as_integer()?).ok()?,
                )),
                _ => None,
            })
            .collect(),
        None => vec![(0, size)],
    };

    let decoded = stream.decode_stream_data_with(options)?;

    let mut table = CrossRefTable::new();
    let mut records = decoded.chunks_exact(entry_size);
    'ranges: for (start, count) in ranges {
        for i in 0..count {
            let Some(record) = records.next() else {
                log::warn!("xref stream at {} is truncated", offset);
                break 'ranges;
            };
            let kind = if w1 == 0 { 1 } else { read_int(&record[..w1]) };
            let field2 = read_int(&record[w1..w1 + w2]);
            let field3 = read_int(&record[w1 + w2..]);

            let entry = match kind {
                0 => XRefEntry::Free {
                    next: field2 as u32,
                    gen: field3 as u16,
                },
                1 => XRefEntry::Uncompressed {
                    offset: field2 as usize,
                    gen: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: field2 as u32,
                    index: field3 as u32,
                },
                // Unknown types are reserved and read as null references.
                _ => continue,
            };
            table.add_entry(start.saturating_add(i), entry);
        }
    }

    table.set_trailer(dict.clone());
    Ok(table)
}

/// Big-endian integer from up to 8 bytes.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \n\
trailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n";

    fn simple_pdf() -> Vec<u8> {
        let mut data = SIMPLE.to_vec();
        let xref_pos = data.windows(4).position(|w| w == b"xref").unwrap();
        data.extend_from_slice(format!("{}\n%%EOF\n", xref_pos).as_bytes());
        data
    }

    #[test]
    fn test_find_xref_offset() {
        let data = simple_pdf();
        let offset = find_xref_offset(&data).unwrap();
        assert!(data[offset..].starts_with(b"xref"));
    }

    #[test]
    fn test_find_xref_offset_missing() {
        assert!(matches!(find_xref_offset(b"%PDF-1.4\n%%EOF"), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_parse_traditional_xref() {
        let data = simple_pdf();
        let offset = find_xref_offset(&data).unwrap();
        let table = parse_xref(&data, offset, &DecodeOptions::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1), Some(&XRefEntry::Uncompressed { offset: 9, gen: 0 }));
        assert!(!table.get(0).unwrap().in_use());
        assert!(table.trailer().unwrap().contains_key("Root"));
    }

    #[test]
    fn test_parse_xref_cr_only_line_endings() {
        let data = b"xref\r0 2\r0000000000 65535 f\r0000000100 00000 n\rtrailer\r<< /Size 2 >>";
        let table = parse_xref(data, 0, &DecodeOptions::default()).unwrap();
        assert_eq!(table.get(1), Some(&XRefEntry::Uncompressed { offset: 100, gen: 0 }));
    }

    #[test]
    fn test_parse_xref_multiple_subsections() {
        let data = b"xref\n0 1\n0000000000 65535 f \n5 2\n0000000200 00000 n \n0000000300 00001 n \ntrailer\n<< /Size 7 >>";
        let table = parse_xref(data, 0, &DecodeOptions::default()).unwrap();
        assert_eq!(table.get(5), Some(&XRefEntry::Uncompressed { offset: 200, gen: 0 }));
        assert_eq!(table.get(6), Some(&XRefEntry::Uncompressed { offset: 300, gen: 1 }));
        assert!(table.get(1).is_none());
    }

    #[test]
    fn test_parse_xref_missing_trailer() {
        let data = b"xref\n0 1\n0000000000 65535 f \n";
        assert!(matches!(
            parse_xref(data, 0, &DecodeOptions::default()),
            Err(Error::InvalidXref)
        ));
    }

    #[test]
    fn test_prev_chain_newer_entries_win() {
        let older = b"xref\n0 2\n0000000000 65535 f \n0000000111 00000 n \ntrailer\n<< /Size 2 >>\n";
        let mut data = older.to_vec();
        let newer_offset = data.len();
        data.extend_from_slice(
            b"xref\n1 1\n0000000222 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R /Prev 0 >>\n",
        );
        let table = parse_xref(&data, newer_offset, &DecodeOptions::default()).unwrap();
        assert_eq!(table.get(1), Some(&XRefEntry::Uncompressed { offset: 222, gen: 0 }));
        assert!(table.get(0).is_some());
        assert!(table.trailer().unwrap().contains_key("Root"));
    }

    #[test]
    fn test_prev_chain_loop_is_broken() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        assert!(parse_xref(data, 0, &DecodeOptions::default()).is_ok());
    }

    #[test]
    fn test_parse_xref_stream() {
        // Type 1 entry for object 1 at offset 15, type 2 entry for object 2 in stream 5.
        let records: Vec<u8> = vec![0, 0, 0, 1, 15, 0, 2, 5, 0];
        let mut data = format!(
            "9 0 obj\n<< /Type /XRef /W [1 1 1] /Size 3 /Length {} >>\nstream\n",
            records.len()
        )
        .into_bytes();
        data.extend_from_slice(&records);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let table = parse_xref(&data, 0, &DecodeOptions::default()).unwrap();
        assert_eq!(table.get(1), Some(&XRefEntry::Uncompressed { offset: 15, gen: 0 }));
        assert_eq!(table.get(2), Some(&XRefEntry::Compressed { stream: 5, index: 0 }));
        assert_eq!(table.trailer().unwrap().get("Size").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn test_read_int() {
        assert_eq!(read_int(&[0x01, 0x00]), 256);
        assert_eq!(read_int(&[]), 0);
    }

    #[test]
    fn test_split_lines_mixed_endings() {
        let lines = split_lines(b"a\r\nb\rc\nd");
        assert_eq!(lines, vec![&b"a"[..], b"b", b"c", b"d"]);
    }
}
