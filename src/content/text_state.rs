//! Text state tracking for content stream execution.
//!
//! Tracks the registers that decide where shown text lands: the current
//! transformation matrix (with its `q`/`Q` stack), the text matrix and
//! text line matrix, and the text parameters set by `Tf`, `Tc`, `Tw`,
//! `Tz`, `TL` and `Ts`.

use crate::document::Document;
use crate::geometry::{Matrix, Point};
use crate::object::{Dictionary, Object};
use std::rc::Rc;

/// Width used for glyphs a font gives no metrics for, in thousandths of an em.
pub const DEFAULT_GLYPH_WIDTH: f64 = 500.0;

/// Glyph widths of one simple font.
#[derive(Debug, Clone, Default)]
pub struct FontMetrics {
    first_char: u32,
    widths: Vec<f64>,
    missing_width: Option<f64>,
}

impl FontMetrics {
    /// Read `/FirstChar`, `/Widths` and the descriptor's `/MissingWidth`.
    pub fn from_font(doc: &Document, font: &Dictionary) -> Self {
        let first_char = font
            .get("FirstChar")
            .map(|o| doc.resolve(o))
            .and_then(Object::as_integer)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0);
        let widths = font
            .get("Widths")
            .map(|o| doc.resolve(o))
            .and_then(Object::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|w| doc.resolve(w).as_number().unwrap_or(DEFAULT_GLYPH_WIDTH))
                    .collect()
            })
            .unwrap_or_default();
        let missing_width = font
            .get("FontDescriptor")
            .map(|o| doc.resolve(o))
            .and_then(Object::as_dict)
            .and_then(|d| d.get("MissingWidth"))
            .map(|o| doc.resolve(o))
            .and_then(Object::as_number);

        Self {
            first_char,
            widths,
            missing_width,
        }
    }

    /// Width of `code` in thousandths of an em.
    pub fn width(&self, code: u8) -> f64 {
        let code = code as u32;
        if code >= self.first_char {
            if let Some(&w) = self.widths.get((code - self.first_char) as usize) {
                return w;
            }
        }
        self.missing_width.unwrap_or(DEFAULT_GLYPH_WIDTH)
    }
}

/// Parameters saved and restored by `q`/`Q`.
#[derive(Debug, Clone)]
struct SavedState {
    ctm: Matrix,
    font: Option<String>,
    metrics: Rc<FontMetrics>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scaling: f64,
    leading: f64,
    rise: f64,
}

impl Default for SavedState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            font: None,
            metrics: Rc::default(),
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// The text state machine.
#[derive(Debug, Clone, Default)]
pub struct TextState {
    current: SavedState,
    stack: Vec<SavedState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
}

impl TextState {
    /// State a form XObject starts from: the caller's graphics and text
    /// parameters with an empty `q` stack and fresh text matrices.
    pub fn for_form(&self) -> Self {
        Self {
            current: self.current.clone(),
            ..Self::default()
        }
    }

    /// Current transformation matrix.
    pub fn ctm(&self) -> Matrix {
        self.current.ctm
    }

    /// Resource name of the current font.
    pub fn font(&self) -> Option<&str> {
        self.current.font.as_deref()
    }

    /// Glyph widths of the current font.
    pub fn metrics(&self) -> &FontMetrics {
        &self.current.metrics
    }

    /// Current font size.
    pub fn font_size(&self) -> f64 {
        self.current.font_size
    }

    /// Current text matrix.
    pub fn text_matrix(&self) -> Matrix {
        self.text_matrix
    }

    /// `q`
    pub fn save(&mut self) {
        self.stack.push(self.current.clone());
    }

    /// `Q`. An unbalanced restore is ignored.
    pub fn restore(&mut self) {
        if let Some(saved) = self.stack.pop() {
            self.current = saved;
        }
    }

    /// `cm`: the new matrix is applied before the existing CTM.
    pub fn concat(&mut self, m: Matrix) {
        self.current.ctm = m.multiply(&self.current.ctm);
    }

    /// `BT`
    pub fn begin_text(&mut self) {
        self.text_matrix = Matrix::identity();
        self.line_matrix = Matrix::identity();
    }

    /// `Tm`
    pub fn set_text_matrix(&mut self, m: Matrix) {
        self.text_matrix = m;
        self.line_matrix = m;
    }

    /// `Td`
    pub fn move_text(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translation(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// `TD`: like `Td`, and sets the leading to `-ty`.
    pub fn move_text_set_leading(&mut self, tx: f64, ty: f64) {
        self.current.leading = -ty;
        self.move_text(tx, ty);
    }

    /// `T*`
    pub fn next_line(&mut self) {
        let leading = self.current.leading;
        self.move_text(0.0, -leading);
    }

    /// `Tf`
    pub fn set_font(&mut self, name: &str, size: f64) {
        self.current.font = Some(name.to_string());
        self.current.font_size = size;
    }

    /// Widths for the font selected by the last `Tf`; saved and restored
    /// with it.
    pub fn set_metrics(&mut self, metrics: Rc<FontMetrics>) {
        self.current.metrics = metrics;
    }

    /// `Tc`
    pub fn set_char_spacing(&mut self, v: f64) {
        self.current.char_spacing = v;
    }

    /// `Tw`
    pub fn set_word_spacing(&mut self, v: f64) {
        self.current.word_spacing = v;
    }

    /// `Tz`, in percent.
    pub fn set_horizontal_scaling(&mut self, v: f64) {
        self.current.horizontal_scaling = v;
    }

    /// `TL`
    pub fn set_leading(&mut self, v: f64) {
        self.current.leading = v;
    }

    /// `Ts`
    pub fn set_rise(&mut self, v: f64) {
        self.current.rise = v;
    }

    fn scale(&self) -> f64 {
        self.current.horizontal_scaling / 100.0
    }

    /// Current glyph origin in device space.
    pub fn origin(&self) -> Point {
        let trm = self.text_matrix.multiply(&self.current.ctm);
        trm.transform_point(0.0, self.current.rise)
    }

    /// Rendered text height in device space.
    pub fn rendered_height(&self) -> f64 {
        let trm = self.text_matrix.multiply(&self.current.ctm);
        self.current.font_size * trm.vertical_scale()
    }

    /// Advance the text matrix over `bytes` shown in the current font.
    pub fn advance_string(&mut self, bytes: &[u8]) {
        let fs = self.current.font_size;
        let metrics = Rc::clone(&self.current.metrics);
        let mut tx = 0.0;
        for &b in bytes {
            let mut w = metrics.width(b) / 1000.0 * fs + self.current.char_spacing;
            if b == b' ' {
                w += self.current.word_spacing;
            }
            tx += w * self.scale();
        }
        self.translate_text(tx);
    }

    /// Apply one `TJ` adjustment, in thousandths of an em.
    pub fn adjust(&mut self, thousandths: f64) {
        let tx = -thousandths / 1000.0 * self.current.font_size * self.scale();
        self.translate_text(tx);
    }

    fn translate_text(&mut self, tx: f64) {
        self.text_matrix = Matrix::translation(tx, 0.0).multiply(&self.text_matrix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::dict;

    #[test]
    fn test_td_moves_line_matrix() {
        let mut ts = TextState::default();
        ts.begin_text();
        ts.move_text(100.0, 700.0);
        ts.move_text(0.0, -14.0);
        let p = ts.origin();
        assert_eq!((p.x, p.y), (100.0, 686.0));
    }

    #[test]
    fn test_tstar_uses_leading_from_td_upper() {
        let mut ts = TextState::default();
        ts.begin_text();
        ts.move_text_set_leading(10.0, -12.0);
        ts.next_line();
        let p = ts.origin();
        assert_eq!((p.x, p.y), (10.0, -24.0));
    }

    #[test]
    fn test_q_restores_ctm_and_font() {
        let mut ts = TextState::default();
        ts.set_font("F1", 12.0);
        ts.save();
        ts.concat(Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0));
        ts.set_font("F2", 8.0);
        ts.restore();
        assert_eq!(ts.ctm(), Matrix::identity());
        assert_eq!(ts.font(), Some("F1"));
        assert_eq!(ts.font_size(), 12.0);
        ts.restore();
        assert_eq!(ts.font(), Some("F1"));
    }

    #[test]
    fn test_ctm_scales_origin_and_height() {
        let mut ts = TextState::default();
        ts.concat(Matrix::new(2.0, 0.0, 0.0, 2.0, 10.0, 10.0));
        ts.set_font("F1", 10.0);
        ts.begin_text();
        ts.move_text(5.0, 5.0);
        let p = ts.origin();
        assert_eq!((p.x, p.y), (20.0, 20.0));
        assert_eq!(ts.rendered_height(), 20.0);
    }

    #[test]
    fn test_advance_uses_widths_and_spacing() {
        let doc = Document::new();
        let font = dict([
            ("FirstChar", Object::Integer(65)),
            ("Widths", Object::number_array(&[600.0, 400.0])),
        ]);
        let metrics = FontMetrics::from_font(&doc, &font);
        assert_eq!(metrics.width(b'A'), 600.0);
        assert_eq!(metrics.width(b'B'), 400.0);
        assert_eq!(metrics.width(b'C'), DEFAULT_GLYPH_WIDTH);

        let mut ts = TextState::default();
        ts.set_font("F1", 10.0);
        ts.set_metrics(Rc::new(metrics));
        ts.set_char_spacing(1.0);
        ts.begin_text();
        ts.advance_string(b"AB");
        assert!((ts.origin().x - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_restore_brings_back_metrics() {
        let doc = Document::new();
        let narrow = FontMetrics::from_font(&doc, &dict([("Widths", Object::number_array(&[100.0]))]));
        let wide = FontMetrics::from_font(&doc, &dict([("Widths", Object::number_array(&[900.0]))]));
        let mut ts = TextState::default();
        ts.set_font("F1", 10.0);
        ts.set_metrics(Rc::new(narrow));
        ts.save();
        ts.set_font("F2", 10.0);
        ts.set_metrics(Rc::new(wide));
        ts.restore();
        assert_eq!(ts.metrics().width(0), 100.0);
    }

    #[test]
    fn test_form_state_inherits_font() {
        let mut ts = TextState::default();
        ts.concat(Matrix::translation(5.0, 5.0));
        ts.set_font("F1", 9.0);
        ts.save();
        ts.begin_text();
        ts.move_text(100.0, 100.0);

        let mut form = ts.for_form();
        assert_eq!(form.font(), Some("F1"));
        assert_eq!(form.font_size(), 9.0);
        assert_eq!(form.text_matrix(), Matrix::identity());
        form.restore();
        assert_eq!(form.ctm(), ts.ctm());
    }

    #[test]
    fn test_tj_adjustment_moves_left_for_positive() {
        let mut ts = TextState::default();
        ts.set_font("F1", 10.0);
        ts.begin_text();
        ts.adjust(-500.0);
        assert!((ts.origin().x - 5.0).abs() < 1e-9);
        ts.adjust(250.0);
        assert!((ts.origin().x - 2.5).abs() < 1e-9);
    }
}
