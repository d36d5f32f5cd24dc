//! Text scanning: extraction, visual redaction and in-place replacement.

use super::rewrite::replace_in_strings;
use super::text_state::{FontMetrics, TextState};
use super::tokenizer::{tokenize, Instruction};
use super::{page_content, page_resources};
use crate::decoders::{check_round_trip, encode_stream};
use crate::document::Document;
use crate::audit;
use crate::editor::compositor::{stamp_page, Overlay};
use crate::error::{Error, Result};
use crate::geometry::{Matrix, Rect};
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Form XObjects nested deeper than this are not scanned.
const MAX_FORM_DEPTH: usize = 16;

/// TJ adjustments at or below this (thousandths of an em) read as a space.
const TJ_SPACE_THRESHOLD: f64 = -200.0;

/// A gap wider than this fraction of the text height reads as a space.
const WORD_GAP_RATIO: f64 = 0.15;

/// A run of text shown by one text-showing operator.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    /// Decoded text
    pub text: String,
    /// Baseline origin, x
    pub x: f64,
    /// Baseline origin, y
    pub y: f64,
    /// Advance width in page space
    pub width: f64,
    /// Rendered font size in page space
    pub height: f64,
    /// Font size set by `Tf`
    pub font_size: f64,
    /// 1-based page index
    pub page: usize,
}

impl TextFragment {
    /// Approximate bounding box, extended below the baseline for descenders.
    pub fn bbox(&self) -> Rect {
        let descent = self.height * 0.2;
        Rect::new(self.x, self.y - descent, self.width, self.height + descent)
    }
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

struct Scan<'a> {
    doc: &'a Document,
    page: usize,
    fragments: Vec<TextFragment>,
    metrics: HashMap<ObjectRef, Rc<FontMetrics>>,
    forms: HashSet<ObjectRef>,
}

impl<'a> Scan<'a> {
    fn font_metrics(&mut self, resources: &Dictionary, name: &str) -> Rc<FontMetrics> {
        let doc = self.doc;
        let entry = resources
            .get("Font")
            .map(|f| doc.resolve(f))
            .and_then(Object::as_dict)
            .and_then(|fonts| fonts.get(name));
        match entry {
            Some(Object::Reference(r)) => Rc::clone(self.metrics.entry(*r).or_insert_with(|| {
                Rc::new(
                    doc.resolve_ref(*r)
                        .as_dict()
                        .map(|font| FontMetrics::from_font(doc, font))
                        .unwrap_or_default(),
                )
            })),
            Some(Object::Dictionary(font)) => Rc::new(FontMetrics::from_font(doc, font)),
            _ => Rc::default(),
        }
    }

    fn show(&mut self, state: &mut TextState, parts: &[&Object]) {
        let start = state.origin();
        let height = state.rendered_height();
        let mut text = String::new();
        for part in parts {
            match part {
                Object::String(bytes) => {
                    text.push_str(&decode_latin1(bytes));
                    state.advance_string(bytes);
                },
                other => {
                    if let Some(n) = other.as_number() {
                        if n <= TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                            text.push(' ');
                        }
                        state.adjust(n);
                    }
                },
            }
        }
        if text.is_empty() {
            return;
        }
        let end = state.origin();
        self.fragments.push(TextFragment {
            text,
            x: start.x,
            y: start.y,
            width: (end.x - start.x).hypot(end.y - start.y),
            height,
            font_size: state.font_size(),
            page: self.page,
        });
    }

    fn run(&mut self, data: &[u8], resources: &Dictionary, state: &mut TextState, depth: usize) {
        for inst in tokenize(data) {
            self.step(&inst, resources, state, depth);
        }
    }

    fn step(
        &mut self,
        inst: &Instruction,
        resources: &Dictionary,
        state: &mut TextState,
        depth: usize,
    ) {
        let nums = || inst.numbers().unwrap_or_default();
        match inst.operator.as_str() {
            "q" => state.save(),
            "Q" => state.restore(),
            "cm" => {
                if let [a, b, c, d, e, f] = nums()[..] {
                    state.concat(Matrix::new(a, b, c, d, e, f));
                }
            },
            "BT" => state.begin_text(),
            "Tm" => {
                if let [a, b, c, d, e, f] = nums()[..] {
                    state.set_text_matrix(Matrix::new(a, b, c, d, e, f));
                }
            },
            "Td" => {
                if let [tx, ty] = nums()[..] {
                    state.move_text(tx, ty);
                }
            },
            "TD" => {
                if let [tx, ty] = nums()[..] {
                    state.move_text_set_leading(tx, ty);
                }
            },
            "T*" => state.next_line(),
            "TL" | "Tc" | "Tw" | "Tz" | "Ts" => {
                let Some(v) = inst.number(0) else {
                    return;
                };
                match inst.operator.as_str() {
                    "TL" => state.set_leading(v),
                    "Tc" => state.set_char_spacing(v),
                    "Tw" => state.set_word_spacing(v),
                    "Tz" => state.set_horizontal_scaling(v),
                    _ => state.set_rise(v),
                }
            },
            "Tf" => {
                if let (Some(name), Some(size)) = (inst.name(0), inst.number(1)) {
                    state.set_font(name, size);
                    let metrics = self.font_metrics(resources, name);
                    state.set_metrics(metrics);
                }
            },
            "Tj" => {
                if let Some(o) = inst.operands.first() {
                    self.show(state, &[&o.value]);
                }
            },
            "'" => {
                state.next_line();
                if let Some(o) = inst.operands.last() {
                    self.show(state, &[&o.value]);
                }
            },
            "\"" => {
                if let [aw, ac, s] = &inst.operands[..] {
                    if let (Some(aw), Some(ac)) = (aw.value.as_number(), ac.value.as_number()) {
                        state.set_word_spacing(aw);
                        state.set_char_spacing(ac);
                    }
                    state.next_line();
                    self.show(state, &[&s.value]);
                }
            },
            "TJ" => {
                if let Some(items) = inst.operands.first().and_then(|o| o.value.as_array()) {
                    let parts: Vec<&Object> = items.iter().collect();
                    self.show(state, &parts);
                }
            },
            "Do" => {
                if let Some(name) = inst.name(0) {
                    self.run_form(name, resources, state, depth);
                }
            },
            _ => {},
        }
    }

    fn run_form(&mut self, name: &str, resources: &Dictionary, state: &TextState, depth: usize) {
        let doc = self.doc;
        if depth >= MAX_FORM_DEPTH {
            log::warn!("form XObjects nested deeper than {}, skipping {}", MAX_FORM_DEPTH, name);
            return;
        }
        let Some(form_ref) = resources
            .get("XObject")
            .map(|x| doc.resolve(x))
            .and_then(Object::as_dict)
            .and_then(|x| x.get(name))
            .and_then(Object::as_reference)
        else {
            return;
        };
        let form = doc.resolve_ref(form_ref);
        let Object::Stream { dict, .. } = form else {
            return;
        };
        if dict.get("Subtype").and_then(Object::as_name) != Some("Form") {
            return;
        }
        if !self.forms.insert(form_ref) {
            log::debug!("form {} already on the scan stack", form_ref);
            return;
        }

        match form.decode_stream_data_with(&doc.options().decode_options()) {
            Ok(data) => {
                let form_resources = dict
                    .get("Resources")
                    .map(|r| doc.resolve(r))
                    .and_then(Object::as_dict)
                    .unwrap_or(resources)
                    .clone();
                let mut inner = state.for_form();
                if let Some([a, b, c, d, e, f]) = dict
                    .get("Matrix")
                    .map(|m| doc.resolve(m))
                    .and_then(Object::as_array)
                    .and_then(|m| m.iter().map(Object::as_number).collect::<Option<Vec<_>>>())
                    .as_deref()
                    .and_then(|m| <[f64; 6]>::try_from(m).ok())
                {
                    inner.concat(Matrix::new(a, b, c, d, e, f));
                }
                self.run(&data, &form_resources, &mut inner, depth + 1);
            },
            Err(e) => log::warn!("cannot decode form {}: {}", form_ref, e),
        }
        self.forms.remove(&form_ref);
    }
}

/// Positioned text fragments of one page, in content order.
pub fn text_fragments(doc: &Document, page: usize) -> Result<Vec<TextFragment>> {
    doc.ensure_unlocked("text_fragments")?;
    let handle = doc.page_for("text_fragments", page)?;
    let data = page_content(doc, handle.object_ref)?;
    let resources = page_resources(doc, handle.object_ref);

    let mut scan = Scan {
        doc,
        page,
        fragments: Vec::new(),
        metrics: HashMap::new(),
        forms: HashSet::new(),
    };
    let mut state = TextState::default();
    scan.run(&data, &resources, &mut state, 0);
    Ok(scan.fragments)
}

/// Join fragments into lines: same baseline concatenates, a baseline
/// change starts a new line.
fn assemble(fragments: &[TextFragment]) -> String {
    let mut out = String::new();
    let mut prev: Option<&TextFragment> = None;
    for frag in fragments {
        if let Some(p) = prev {
            let tolerance = p.height.max(frag.height).max(1.0) * 0.2;
            if (frag.y - p.y).abs() > tolerance {
                out.push('\n');
            } else {
                let gap = frag.x - (p.x + p.width);
                let spaced = out.ends_with(' ') || frag.text.starts_with(' ');
                if gap > WORD_GAP_RATIO * frag.height.max(p.height) && !spaced {
                    out.push(' ');
                }
            }
        }
        out.push_str(&frag.text);
        prev = Some(frag);
    }
    out
}

/// Text of one page.
pub fn extract_page_text(doc: &Document, page: usize) -> Result<String> {
    let result = text_fragments(doc, page).map(|f| assemble(&f));
    audit::record("extract_page_text", result, Some(doc.page_count()))
}

/// Text of every page, pages separated by a line break.
pub fn extract_text(doc: &Document) -> Result<String> {
    let result = (1..=doc.page_count())
        .map(|p| text_fragments(doc, p).map(|f| assemble(&f)))
        .collect::<Result<Vec<_>>>()
        .map(|pages| pages.join("\n"));
    audit::record("extract_text", result, Some(doc.page_count()))
}

/// Paint an opaque black box over every fragment containing `pattern`.
///
/// This is a visual redaction: the boxes are drawn on top of the page and
/// the underlying text operators are left in place, so the text is still
/// extractable. Returns the number of boxes drawn.
pub fn redact(doc: &mut Document, pattern: &str) -> Result<usize> {
    let result = redact_boxes(doc, pattern);
    audit::record("redact", result, Some(doc.page_count()))
}

/// [`redact`] without the audit event.
pub(crate) fn redact_boxes(doc: &mut Document, pattern: &str) -> Result<usize> {
    if pattern.is_empty() {
        return Err(Error::invalid_argument("redact", "pattern is empty"));
    }
    doc.ensure_unlocked("redact")?;

    let mut overlays = Vec::new();
    for page in 1..=doc.page_count() {
        let boxes: Vec<Rect> = text_fragments(doc, page)?
            .iter()
            .filter(|f| f.text.contains(pattern))
            .map(TextFragment::bbox)
            .collect();
        if boxes.is_empty() {
            continue;
        }
        let mut content = b"0 g\n".to_vec();
        for b in &boxes {
            content.extend_from_slice(
                format!("{} {} {} {} re f\n", b.x, b.y, b.width, b.height).as_bytes(),
            );
        }
        let bbox = boxes.iter().skip(1).fold(boxes[0], |acc, b| acc.union(b));
        overlays.push((page, boxes.len(), Overlay::new(content).with_bbox(bbox)));
    }

    let mut total = 0;
    for (page, count, overlay) in overlays {
        stamp_page(doc, page, &overlay)?;
        total += count;
    }
    log::info!("redact: drew {} boxes for {:?}", total, pattern);
    Ok(total)
}

fn encode_latin1(operation: &'static str, text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| u8::try_from(c as u32).ok())
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| Error::invalid_argument(operation, format!("{:?} is not Latin-1", text)))
}

/// Replace `from` with `to` inside the text strings of every page.
///
/// Filtered streams are decoded, patched and re-encoded with the same
/// filter chain. Nothing is written unless every affected stream can be
/// rewritten. Returns the number of replacements.
pub fn replace_text(doc: &mut Document, from: &str, to: &str) -> Result<usize> {
    let result = replace_in_pages(doc, from, to);
    audit::record("replace_text", result, Some(doc.page_count()))
}

/// [`replace_text`] without the audit event.
pub(crate) fn replace_in_pages(doc: &mut Document, from: &str, to: &str) -> Result<usize> {
    if from.is_empty() {
        return Err(Error::invalid_argument("replace_text", "search text is empty"));
    }
    doc.ensure_unlocked("replace_text")?;
    let from = encode_latin1("replace_text", from)?;
    let to = encode_latin1("replace_text", to)?;

    let mut seen = HashSet::new();
    let mut staged: Vec<(ObjectRef, Object)> = Vec::new();
    let mut total = 0;

    for handle in doc.pages() {
        for stream_ref in super::content_refs(doc, handle.object_ref) {
            if !seen.insert(stream_ref) {
                continue;
            }
            let stream = doc.resolve_ref(stream_ref);
            let Object::Stream { dict, .. } = stream else {
                continue;
            };
            let filters = stream.filters();
            check_round_trip(&filters)?;
            if let Some(params) = stream.decode_params().filter(|p| p.predictor > 1) {
                return Err(Error::Encoding {
                    filter: filters.join(" "),
                    reason: format!("predictor {} cannot be re-applied", params.predictor),
                });
            }
            let decoded = stream
                .decode_stream_data_with(&doc.options().decode_options())
                .map_err(|e| Error::Encoding {
                    filter: filters.join(" "),
                    reason: e.to_string(),
                })?;

            let (rewritten, n) = replace_in_strings(&decoded, &from, &to);
            if n == 0 {
                continue;
            }
            let encoded = encode_stream(&rewritten, &filters)?;
            staged.push((stream_ref, Object::stream(dict.clone(), encoded)));
            total += n;
        }
    }

    for (r, obj) in staged {
        doc.set_object(r, obj);
    }
    log::info!("replace_text: {} replacements", total);
    Ok(total)
}
