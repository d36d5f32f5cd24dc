//! Span-based content stream rewriting.
//!
//! Rewrites splice replacement bytes over the spans reported by the
//! tokenizer, so everything that is not rewritten stays byte-identical.

use super::tokenizer::{tokenize, Instruction};
use crate::object::Object;
use crate::writer::{write_name, write_string, ObjectSerializer};
use std::collections::HashMap;
use std::ops::Range;

/// Old name to new name, per resource category (`Font`, `XObject`, ...).
pub type ResourceRenames = HashMap<String, HashMap<String, String>>;

/// Replace byte ranges. `edits` must not overlap.
pub fn splice(data: &[u8], mut edits: Vec<(Range<usize>, Vec<u8>)>) -> Vec<u8> {
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = Vec::with_capacity(data.len());
    let mut pos = 0;
    for (range, bytes) in edits {
        if range.start < pos {
            continue;
        }
        out.extend_from_slice(&data[pos..range.start]);
        out.extend_from_slice(&bytes);
        pos = range.end;
    }
    out.extend_from_slice(&data[pos..]);
    out
}

/// Replace every non-overlapping occurrence of `from`, left to right.
pub fn replace_bytes(haystack: &[u8], from: &[u8], to: &[u8]) -> (Vec<u8>, usize) {
    if from.is_empty() || haystack.len() < from.len() {
        return (haystack.to_vec(), 0);
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut count = 0;
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
            count += 1;
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    (out, count)
}

/// Resource category and operand index of the names an operator refers to.
fn resource_operands(inst: &Instruction) -> Vec<(&'static str, usize)> {
    match inst.operator.as_str() {
        "Tf" => vec![("Font", 0)],
        "Do" => vec![("XObject", 0)],
        "gs" => vec![("ExtGState", 0)],
        "cs" | "CS" => vec![("ColorSpace", 0)],
        "sh" => vec![("Shading", 0)],
        "scn" | "SCN" => match inst.operands.len() {
            0 => vec![],
            n => vec![("Pattern", n - 1)],
        },
        "BDC" | "DP" => vec![("Properties", 1)],
        "BI" => inst
            .operands
            .iter()
            .enumerate()
            .filter(|(i, o)| i % 2 == 0 && matches!(o.value.as_name(), Some("CS" | "ColorSpace")))
            .map(|(i, _)| ("ColorSpace", i + 1))
            .collect(),
        _ => vec![],
    }
}

/// Rename resource references in content bytes.
///
/// Only name operands in resource positions are touched; a `/F1` that is
/// a marked-content tag or a dictionary value elsewhere stays as is.
pub fn rename_resources(data: &[u8], renames: &ResourceRenames) -> Vec<u8> {
    if renames.values().all(HashMap::is_empty) {
        return data.to_vec();
    }

    let mut edits = Vec::new();
    for inst in tokenize(data) {
        for (category, index) in resource_operands(&inst) {
            let Some(operand) = inst.operands.get(index) else {
                continue;
            };
            let Some(name) = operand.value.as_name() else {
                continue;
            };
            if let Some(new_name) = renames.get(category).and_then(|m| m.get(name)) {
                let mut bytes = Vec::new();
                write_name(&mut bytes, new_name);
                edits.push((operand.span.clone(), bytes));
            }
        }
    }
    splice(data, edits)
}

/// Replace `from` with `to` inside the string operands of text-showing
/// operators. Returns the new bytes and the number of replacements.
pub fn replace_in_strings(data: &[u8], from: &[u8], to: &[u8]) -> (Vec<u8>, usize) {
    let mut edits = Vec::new();
    let mut total = 0;

    for inst in tokenize(data) {
        match inst.operator.as_str() {
            "Tj" | "'" | "\"" => {
                let Some(operand) = inst.operands.last() else {
                    continue;
                };
                let Some(s) = operand.value.as_string() else {
                    continue;
                };
                let (replaced, n) = replace_bytes(s, from, to);
                if n > 0 {
                    let mut bytes = Vec::new();
                    write_string(&mut bytes, &replaced);
                    edits.push((operand.span.clone(), bytes));
                    total += n;
                }
            },
            "TJ" => {
                let Some(operand) = inst.operands.first() else {
                    continue;
                };
                let Some(items) = operand.value.as_array() else {
                    continue;
                };
                let mut changed = 0;
                let items: Vec<Object> = items
                    .iter()
                    .map(|item| match item {
                        Object::String(s) => {
                            let (replaced, n) = replace_bytes(s, from, to);
                            changed += n;
                            Object::String(replaced)
                        },
                        other => other.clone(),
                    })
                    .collect();
                if changed > 0 {
                    let bytes = ObjectSerializer::compact().serialize(&Object::Array(items));
                    edits.push((operand.span.clone(), bytes));
                    total += changed;
                }
            },
            _ => {},
        }
    }

    (splice(data, edits), total)
}
