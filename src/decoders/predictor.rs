//! Predictor post-processing for Flate and LZW payloads.
//!
//! Cross-reference streams are almost always written with PNG "Up"
//! prediction, so reading them needs this even though content streams
//! rarely use it.

use crate::error::{Error, Result};
use crate::object::Object;

/// Decode parameters from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read parameters from a `/DecodeParms` value (dictionary or array of
    /// dictionaries, first dictionary wins).
    pub fn from_object(obj: &Object) -> Option<Self> {
        let dict = match obj {
            Object::Array(items) => items.iter().find_map(|o| o.as_dict())?,
            other => other.as_dict()?,
        };
        let get = |key: &str, default: i64| dict.get(key).and_then(|o| o.as_integer()).unwrap_or(default);
        Some(Self {
            predictor: get("Predictor", 1),
            columns: get("Columns", 1).max(1) as usize,
            colors: get("Colors", 1).max(1) as usize,
            bits_per_component: get("BitsPerComponent", 8).max(1) as usize,
        })
    }

    /// Bytes of sample data per row, predictor tag excluded.
    pub fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Undo the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = params.row_bytes();
    let bpp = params.colors;
    let mut output = data.to_vec();
    for row in output.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(output)
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.row_bytes();
    let bpp = params.pixel_bytes();
    let stride = row_len + 1;
    let mut output = Vec::with_capacity(data.len() / stride * row_len);
    let mut prev = vec![0u8; row_len];

    for chunk in data.chunks(stride) {
        // A short trailing row is padded rather than rejected.
        let tag = chunk[0];
        let mut row = vec![0u8; row_len];
        row[..chunk.len() - 1].copy_from_slice(&chunk[1..]);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", tag))),
            };
            row[i] = row[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&row);
        prev = row;
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(predictor: i64, columns: usize) -> DecodeParams {
        DecodeParams {
            predictor,
            columns,
            ..DecodeParams::default()
        }
    }

    #[test]
    fn test_png_up_rows() {
        // Two rows of three bytes, second row encoded as "Up" deltas.
        let data = [2, 1, 2, 3, 2, 1, 1, 1];
        let out = decode_predictor(&data, &params(12, 3)).unwrap();
        assert_eq!(out, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_sub_row() {
        let data = [1, 5, 1, 1];
        assert_eq!(decode_predictor(&data, &params(15, 3)).unwrap(), vec![5, 6, 7]);
    }

    #[test]
    fn test_tiff_predictor() {
        let data = [10, 1, 1, 20, 2, 2];
        assert_eq!(decode_predictor(&data, &params(2, 3)).unwrap(), vec![10, 11, 12, 20, 22, 24]);
    }

    #[test]
    fn test_params_from_dictionary() {
        let mut dict = std::collections::HashMap::new();
        dict.insert("Predictor".to_string(), Object::Integer(12));
        dict.insert("Columns".to_string(), Object::Integer(5));
        let p = DecodeParams::from_object(&Object::Dictionary(dict)).unwrap();
        assert_eq!(p.predictor, 12);
        assert_eq!(p.columns, 5);
        assert_eq!(p.row_bytes(), 5);
    }
}
