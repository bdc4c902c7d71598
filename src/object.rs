//! PDF object types.
//!
//! The PDF data model is a small set of polymorphic values: null, booleans,
//! numbers, strings, names, arrays, dictionaries, streams and indirect
//! references. This module defines the tagged [`Object`] variant plus the
//! typed accessors the rest of the engine uses.
//!
//! Indirect references never own their target: an [`ObjectRef`] is only an
//! `(id, generation)` pair which the `Document` resolves on demand. That is
//! how cyclic structures (page parents, outline siblings) are represented
//! without ownership cycles.

use std::cell::OnceCell;
use std::collections::HashMap;

use bytes::Bytes;

use crate::decoders;
use crate::error::{Error, Result};

/// A PDF dictionary. Key order is not significant.
pub type Dict = HashMap<String, Object>;

/// PDF object representation.
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
    /// String (byte array; PDF strings are not necessarily text)
    String(Vec<u8>),
    /// Name (written with a leading / in PDF syntax)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary
    Dictionary(Dict),
    /// Stream (dictionary + raw payload)
    Stream(Stream),
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
///
/// Object id 0 is reserved and never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

/// A stream object: a dictionary plus a raw byte payload.
///
/// The decoded payload is computed lazily and cached. The owning object id
/// is attached when the stream is resolved through the document so that
/// per-object decryption can be keyed correctly.
#[derive(Debug, Clone)]
pub struct Stream {
    /// The stream dictionary
    pub dict: Dict,
    /// Raw (still encoded) payload bytes
    pub raw: Bytes,
    /// Owning `(id, generation)`, attached at resolution time
    pub obj_id: Option<(u32, u16)>,
    decoded: OnceCell<Bytes>,
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        // The decode cache is derived state and not part of identity.
        self.dict == other.dict && self.raw == other.raw && self.obj_id == other.obj_id
    }
}

impl Stream {
    /// Create a stream from its dictionary and raw payload.
    pub fn new(dict: Dict, raw: impl Into<Bytes>) -> Self {
        Self {
            dict,
            raw: raw.into(),
            obj_id: None,
            decoded: OnceCell::new(),
        }
    }

    /// Look up a dictionary entry.
    pub fn get(&self, name: &str) -> Option<&Object> {
        self.dict.get(name)
    }

    /// Look up a dictionary entry under any of several names.
    ///
    /// Inline images abbreviate their keys (`W` for `Width`, `BPC` for
    /// `BitsPerComponent`, ...), so several callers need to accept both
    /// spellings.
    pub fn get_any(&self, names: &[&str]) -> Option<&Object> {
        names.iter().find_map(|n| self.dict.get(*n))
    }

    /// The filter names attached to this stream, in application order.
    ///
    /// The `Filter` (or inline-image `F`) entry may be a single name or an
    /// array of names. Anything else decodes as no filters.
    pub fn filters(&self) -> Vec<String> {
        match self.get_any(&["F", "Filter"]) {
            Some(Object::Name(name)) => vec![name.clone()],
            Some(Object::Array(arr)) => arr
                .iter()
                .map(|obj| match obj {
                    Object::Name(name) => name.clone(),
                    other => {
                        // A broken indirect reference resolves to Null here.
                        // FlateDecode is overwhelmingly the most common
                        // filter, so that is the recovery guess.
                        log::warn!("non-name filter entry {:?}, assuming FlateDecode", other);
                        "FlateDecode".to_string()
                    },
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Replace the raw payload (used when the document deciphers streams).
    pub(crate) fn set_raw(&mut self, raw: impl Into<Bytes>) {
        self.raw = raw.into();
        self.decoded = OnceCell::new();
    }

    /// Decode the payload through the filter pipeline, caching the result.
    ///
    /// In lenient mode filter failures decode to empty data; in strict mode
    /// they surface as errors.
    pub fn decoded_data(&self, strict: bool) -> Result<Bytes> {
        if let Some(data) = self.decoded.get() {
            return Ok(data.clone());
        }
        let filters = self.filters();
        let params = decode_params(self.get_any(&["DP", "DecodeParms", "FDecodeParms"]));
        let data = match decoders::apply_filters(&self.raw, &filters, params.as_ref(), strict) {
            Ok(data) => data,
            Err(e @ Error::FilterUnsupported(_)) | Err(e @ Error::PredictorUnsupported(_)) => {
                return Err(e)
            },
            Err(e) if strict => return Err(e),
            Err(e) => {
                log::warn!("stream decode failed: {}", e);
                Vec::new()
            },
        };
        let data = Bytes::from(data);
        let _ = self.decoded.set(data.clone());
        Ok(data)
    }
}

/// Extract predictor parameters from a `DecodeParms` entry.
///
/// The entry may be a dictionary or an array of per-filter dictionaries;
/// the first dictionary found supplies the parameters.
fn decode_params(obj: Option<&Object>) -> Option<decoders::DecodeParams> {
    let dict = match obj? {
        Object::Dictionary(d) => d,
        Object::Array(arr) => arr.iter().find_map(|o| o.as_dict())?,
        _ => return None,
    };
    let get_int = |key: &str, default: i64| {
        dict.get(key).and_then(|o| o.as_integer()).unwrap_or(default)
    };
    Some(decoders::DecodeParams {
        predictor: get_int("Predictor", 1),
        colors: get_int("Colors", 1) as usize,
        columns: get_int("Columns", 1) as usize,
        bits_per_component: get_int("BitsPerComponent", 8) as i64,
    })
}

impl Object {
    /// Get the type name of this object, for error reporting.
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
            Object::Stream(_) => "Stream",
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

    /// Try to cast to a number (integer or real).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
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

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to string bytes.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both dictionaries and streams.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Try to cast to stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
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

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Cast to dictionary, or fail with [`Error::TypeMismatch`].
    pub fn expect_dict(&self) -> Result<&Dict> {
        self.as_dict().ok_or(Error::TypeMismatch {
            expected: "Dictionary",
            found: self.type_name(),
        })
    }

    /// Cast to stream, or fail with [`Error::TypeMismatch`].
    pub fn expect_stream(&self) -> Result<&Stream> {
        self.as_stream().ok_or(Error::TypeMismatch {
            expected: "Stream",
            found: self.type_name(),
        })
    }
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
        let obj = Object::Name("Type".to_string());
        assert_eq!(obj.as_name(), Some("Type"));
        assert!(obj.as_integer().is_none());
    }

    #[test]
    fn test_object_ref_display() {
        assert_eq!(format!("{}", ObjectRef::new(10, 0)), "10 0 R");
    }

    #[test]
    fn test_stream_dict_access() {
        let mut dict = Dict::new();
        dict.insert("Length".to_string(), Object::Integer(100));
        let obj = Object::Stream(Stream::new(dict, &b"stream data"[..]));

        let d = obj.as_dict().unwrap();
        assert_eq!(d.get("Length").unwrap().as_integer(), Some(100));
    }

    #[test]
    fn test_stream_get_any_prefers_first_name() {
        let mut dict = Dict::new();
        dict.insert("W".to_string(), Object::Integer(8));
        dict.insert("Width".to_string(), Object::Integer(16));
        let stream = Stream::new(dict, &b""[..]);
        assert_eq!(stream.get_any(&["W", "Width"]).unwrap().as_integer(), Some(8));
    }

    #[test]
    fn test_stream_filters_single_and_array() {
        let mut dict = Dict::new();
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        assert_eq!(Stream::new(dict, &b""[..]).filters(), vec!["FlateDecode"]);

        let mut dict = Dict::new();
        dict.insert(
            "Filter".to_string(),
            Object::Array(vec![
                Object::Name("ASCII85Decode".to_string()),
                Object::Name("FlateDecode".to_string()),
            ]),
        );
        assert_eq!(
            Stream::new(dict, &b""[..]).filters(),
            vec!["ASCII85Decode", "FlateDecode"]
        );
    }

    #[test]
    fn test_stream_decode_no_filter() {
        let stream = Stream::new(Dict::new(), &b"Hello"[..]);
        assert_eq!(stream.decoded_data(true).unwrap().as_ref(), b"Hello");
    }

    #[test]
    fn test_stream_decode_hex_filter() {
        let mut dict = Dict::new();
        dict.insert(
            "Filter".to_string(),
            Object::Name("ASCIIHexDecode".to_string()),
        );
        let stream = Stream::new(dict, &b"48656C6C6F>"[..]);
        assert_eq!(stream.decoded_data(true).unwrap().as_ref(), b"Hello");
    }

    #[test]
    fn test_stream_decode_is_cached() {
        let stream = Stream::new(Dict::new(), &b"abc"[..]);
        let a = stream.decoded_data(false).unwrap();
        let b = stream.decoded_data(false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_expect_dict_mismatch() {
        let err = Object::Integer(3).expect_dict().unwrap_err();
        match err {
            Error::TypeMismatch { expected, found } => {
                assert_eq!(expected, "Dictionary");
                assert_eq!(found, "Integer");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
