//! In-memory object model.
//!
//! [`Object`] is the tagged union every parsed value lands in; indirect
//! objects point at each other through [`ObjectRef`] and are resolved by the
//! owning [`Document`](crate::document::Document).

use crate::decoders::{self, DecodeOptions, DecodeParams};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Name → value mapping used for dictionaries and stream dictionaries.
///
/// Key order carries no meaning; the serializer sorts keys on output.
pub type Dictionary = HashMap<String, Object>;

/// A parsed object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (opaque bytes, possibly encrypted)
    String(Vec<u8>),
    /// Name (without the leading /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary
    Dictionary(Dictionary),
    /// Stream (dictionary + payload as stored, i.e. still filter-encoded)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Encoded payload
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl From<ObjectRef> for Object {
    fn from(r: ObjectRef) -> Self {
        Object::Reference(r)
    }
}

impl Object {
    /// Build a name object.
    pub fn name(name: impl Into<String>) -> Self {
        Object::Name(name.into())
    }

    /// Build a stream object from a dictionary and an already-encoded payload.
    pub fn stream(dict: Dictionary, data: impl Into<bytes::Bytes>) -> Self {
        Object::Stream {
            dict,
            data: data.into(),
        }
    }

    /// Build a numeric array from a rectangle or matrix.
    pub fn number_array(values: &[f64]) -> Self {
        Object::Array(
            values
                .iter()
                .map(|&v| {
                    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                        Object::Integer(v as i64)
                    } else {
                        Object::Real(v)
                    }
                })
                .collect(),
        )
    }

    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer or real, as f64.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable dictionary access. Works for both Dictionary and Stream objects.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// True for Stream objects.
    pub fn is_stream(&self) -> bool {
        matches!(self, Object::Stream { .. })
    }

    /// `/Type` of a dictionary or stream, if present.
    pub fn dict_type(&self) -> Option<&str> {
        self.as_dict()?.get("Type")?.as_name()
    }

    /// The stream's filter chain in decode order.
    ///
    /// `/Filter` may be a single name or an array of names; anything else
    /// counts as no filter.
    pub fn filters(&self) -> Vec<String> {
        match self.as_dict().and_then(|d| d.get("Filter")) {
            Some(Object::Name(name)) => vec![name.clone()],
            Some(Object::Array(arr)) => arr
                .iter()
                .filter_map(|o| o.as_name().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Parsed `/DecodeParms` of a stream.
    pub fn decode_params(&self) -> Option<DecodeParams> {
        self.as_dict()
            .and_then(|d| d.get("DecodeParms"))
            .and_then(DecodeParams::from_object)
    }

    /// Decode stream data using the filters in its dictionary.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        self.decode_stream_data_with(&DecodeOptions::default())
    }

    /// Decode stream data with explicit limits and recovery policy.
    pub fn decode_stream_data_with(&self, options: &DecodeOptions) -> Result<Vec<u8>> {
        match self {
            Object::Stream { data, .. } => {
                let filters = self.filters();
                if filters.is_empty() {
                    return Ok(data.to_vec());
                }
                decoders::decode_stream(data, &filters, self.decode_params().as_ref(), options)
            },
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }

    /// Call `f` on every reference directly or transitively contained in
    /// this value (without following references).
    pub fn for_each_reference(&self, f: &mut impl FnMut(ObjectRef)) {
        match self {
            Object::Reference(r) => f(*r),
            Object::Array(items) => items.iter().for_each(|o| o.for_each_reference(f)),
            Object::Dictionary(dict) | Object::Stream { dict, .. } => {
                dict.values().for_each(|o| o.for_each_reference(f))
            },
            _ => {},
        }
    }
}

/// Build a dictionary from `(key, value)` pairs.
pub fn dict<I, K>(entries: I) -> Dictionary
where
    I: IntoIterator<Item = (K, Object)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_integer() {
        let obj = Object::Integer(42);
        assert_eq!(obj.as_integer(), Some(42));
        assert_eq!(obj.as_number(), Some(42.0));
        assert!(obj.as_name().is_none());
        assert!(!obj.is_null());
    }

    #[test]
    fn test_object_name() {
        let obj = Object::name("Type");
        assert_eq!(obj.as_name(), Some("Type"));
        assert!(obj.as_integer().is_none());
    }

    #[test]
    fn test_object_stream_dict_access() {
        let obj = Object::stream(dict([("Length", Object::Integer(100))]), &b"stream data"[..]);
        let d = obj.as_dict().unwrap();
        assert_eq!(d.get("Length").unwrap().as_integer(), Some(100));
        assert!(obj.is_stream());
    }

    #[test]
    fn test_object_ref_display() {
        let obj_ref = ObjectRef::new(10, 0);
        assert_eq!(format!("{}", obj_ref), "10 0 R");
    }

    #[test]
    fn test_object_ref_ordering() {
        let mut refs = vec![ObjectRef::new(3, 0), ObjectRef::new(1, 2), ObjectRef::new(1, 0)];
        refs.sort();
        assert_eq!(refs, vec![ObjectRef::new(1, 0), ObjectRef::new(1, 2), ObjectRef::new(3, 0)]);
    }

    #[test]
    fn test_number_array_keeps_integers() {
        let arr = Object::number_array(&[0.0, 0.0, 595.0, 841.89]);
        let items = arr.as_array().unwrap();
        assert_eq!(items[2], Object::Integer(595));
        assert_eq!(items[3], Object::Real(841.89));
    }

    #[test]
    fn test_decode_stream_no_filter() {
        let obj = Object::stream(Dictionary::new(), &b"Hello"[..]);
        assert_eq!(obj.decode_stream_data().unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_stream_filter_array() {
        let obj = Object::stream(
            dict([("Filter", Object::Array(vec![Object::name("ASCIIHexDecode")]))]),
            &b"48656C6C6F>"[..],
        );
        assert_eq!(obj.filters(), vec!["ASCIIHexDecode"]);
        assert_eq!(obj.decode_stream_data().unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_stream_not_a_stream() {
        match Object::Integer(42).decode_stream_data() {
            Err(Error::InvalidObjectType { expected, found }) => {
                assert_eq!(expected, "Stream");
                assert_eq!(found, "Integer");
            },
            other => panic!("Expected InvalidObjectType error, got {:?}", other),
        }
    }

    #[test]
    fn test_filters_invalid_entry_is_empty() {
        let obj = Object::stream(dict([("Filter", Object::Integer(42))]), &b""[..]);
        assert!(obj.filters().is_empty());
    }

    #[test]
    fn test_for_each_reference_walks_nested_values() {
        let obj = Object::Dictionary(dict([
            ("A", Object::Reference(ObjectRef::new(1, 0))),
            (
                "B",
                Object::Array(vec![Object::Integer(1), Object::Reference(ObjectRef::new(2, 0))]),
            ),
        ]));
        let mut found = Vec::new();
        obj.for_each_reference(&mut |r| found.push(r.id));
        found.sort();
        assert_eq!(found, vec![1, 2]);
    }
}
