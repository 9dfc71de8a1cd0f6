//! Structured documents exchanged with the server.
//!
//! A [`Document`] is an ordered list of key/value pairs. Its binary form is
//! the little-endian, length-prefixed layout the server speaks:
//!
//! ```text
//! document := int32 total_len, element*, 0x00
//! element  := u8 type, cstring key, value
//! ```
//!
//! Only the element types the authentication exchange needs are supported;
//! anything else is rejected on decode.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DocumentError, DocumentResult};

const TYPE_DOUBLE: u8 = 0x01;
const TYPE_STRING: u8 = 0x02;
const TYPE_DOCUMENT: u8 = 0x03;
const TYPE_BINARY: u8 = 0x05;
const TYPE_BOOLEAN: u8 = 0x08;
const TYPE_NULL: u8 = 0x0A;
const TYPE_INT32: u8 = 0x10;
const TYPE_INT64: u8 = 0x12;

/// Generic binary subtype.
const BINARY_SUBTYPE_GENERIC: u8 = 0x00;

/// Smallest valid document: length prefix plus terminator.
const MIN_DOCUMENT_LEN: usize = 5;

/// Deepest nesting accepted on decode.
pub const MAX_DEPTH: usize = 100;

/// A single value stored in a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub enum Bson {
    /// 64-bit IEEE 754 float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Embedded document.
    Document(Document),
    /// Binary data with the generic subtype.
    Binary(Vec<u8>),
    /// Boolean.
    Boolean(bool),
    /// Null.
    Null,
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
}

impl Bson {
    fn element_type(&self) -> u8 {
        match self {
            Self::Double(_) => TYPE_DOUBLE,
            Self::String(_) => TYPE_STRING,
            Self::Document(_) => TYPE_DOCUMENT,
            Self::Binary(_) => TYPE_BINARY,
            Self::Boolean(_) => TYPE_BOOLEAN,
            Self::Null => TYPE_NULL,
            Self::Int32(_) => TYPE_INT32,
            Self::Int64(_) => TYPE_INT64,
        }
    }

    /// Numeric value as `f64`, for fields the server may send as any number type.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int32(v) => Some(f64::from(*v)),
            Self::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// An ordered set of key/value pairs.
///
/// # Examples
///
/// ```
/// use driverauth_core::{Bson, Document};
///
/// let doc = Document::new()
///     .with("saslStart", Bson::Int32(1))
///     .with("mechanism", Bson::String("PLAIN".to_owned()));
/// let bytes = doc.to_bytes();
/// let decoded = Document::from_bytes(&bytes).unwrap();
/// assert_eq!(decoded.get_str("mechanism").unwrap(), "PLAIN");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Bson)>,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, consuming and returning the document.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Bson) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a field, replacing an existing value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: Bson) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether the field is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a required string field.
    pub fn get_str(&self, key: &str) -> DocumentResult<&str> {
        match self.require(key)? {
            Bson::String(v) => Ok(v),
            _ => Err(type_error(key, "string")),
        }
    }

    /// Get a required binary field.
    pub fn get_binary(&self, key: &str) -> DocumentResult<&[u8]> {
        match self.require(key)? {
            Bson::Binary(v) => Ok(v),
            _ => Err(type_error(key, "binary")),
        }
    }

    /// Get a required 32-bit integer field.
    pub fn get_i32(&self, key: &str) -> DocumentResult<i32> {
        match self.require(key)? {
            Bson::Int32(v) => Ok(*v),
            _ => Err(type_error(key, "32-bit integer")),
        }
    }

    /// Get a required boolean field.
    pub fn get_bool(&self, key: &str) -> DocumentResult<bool> {
        match self.require(key)? {
            Bson::Boolean(v) => Ok(*v),
            _ => Err(type_error(key, "boolean")),
        }
    }

    /// Get a required numeric field as `f64` (double, int32 or int64).
    pub fn get_f64(&self, key: &str) -> DocumentResult<f64> {
        self.require(key)?
            .as_f64()
            .ok_or_else(|| type_error(key, "number"))
    }

    fn require(&self, key: &str) -> DocumentResult<&Bson> {
        self.get(key)
            .ok_or_else(|| DocumentError::MissingField(key.to_owned()))
    }

    /// Encode the document into its binary form.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        self.write_to(&mut buf);
        buf.freeze()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn write_to(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_i32_le(0); // length placeholder

        for (key, value) in &self.entries {
            buf.put_u8(value.element_type());
            put_cstring(buf, key);
            match value {
                Bson::Double(v) => buf.put_f64_le(*v),
                Bson::String(v) => {
                    buf.put_i32_le(v.len() as i32 + 1);
                    buf.extend_from_slice(v.as_bytes());
                    buf.put_u8(0);
                }
                Bson::Document(doc) => doc.write_to(buf),
                Bson::Binary(v) => {
                    buf.put_i32_le(v.len() as i32);
                    buf.put_u8(BINARY_SUBTYPE_GENERIC);
                    buf.extend_from_slice(v);
                }
                Bson::Boolean(v) => buf.put_u8(u8::from(*v)),
                Bson::Null => {}
                Bson::Int32(v) => buf.put_i32_le(*v),
                Bson::Int64(v) => buf.put_i64_le(*v),
            }
        }
        buf.put_u8(0); // terminator

        let len = (buf.len() - start) as i32;
        buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
    }

    /// Decode a document from its binary form.
    ///
    /// The input must contain exactly one document.
    pub fn from_bytes(input: &[u8]) -> DocumentResult<Self> {
        let mut buf = input;
        let doc = read_document(&mut buf, 0)?;
        if buf.has_remaining() {
            return Err(DocumentError::InvalidLength(input.len() as i64));
        }
        Ok(doc)
    }
}

fn type_error(key: &str, expected: &'static str) -> DocumentError {
    DocumentError::FieldType {
        key: key.to_owned(),
        expected,
    }
}

fn put_cstring(buf: &mut BytesMut, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.put_u8(0);
}

fn ensure(buf: &[u8], needed: usize) -> DocumentResult<()> {
    if buf.remaining() < needed {
        return Err(DocumentError::Truncated {
            needed: needed - buf.remaining(),
        });
    }
    Ok(())
}

fn read_document(buf: &mut &[u8], depth: usize) -> DocumentResult<Document> {
    if depth > MAX_DEPTH {
        return Err(DocumentError::TooDeep(MAX_DEPTH));
    }
    ensure(buf, 4)?;
    let declared = buf.get_i32_le();
    let len = usize::try_from(declared)
        .ok()
        .filter(|len| *len >= MIN_DOCUMENT_LEN)
        .ok_or(DocumentError::InvalidLength(i64::from(declared)))?;
    ensure(buf, len - 4)?;

    // Restrict element parsing to this document's body, excluding the terminator.
    let current: &[u8] = *buf;
    let (body, rest) = current.split_at(len - 4);
    *buf = rest;
    let (mut elements, terminator) = body.split_at(body.len() - 1);
    if terminator[0] != 0 {
        return Err(DocumentError::InvalidLength(i64::from(declared)));
    }

    let mut doc = Document::new();
    while elements.has_remaining() {
        let element_type = elements.get_u8();
        let key = read_cstring(&mut elements)?;
        let value = read_value(&mut elements, element_type, &key, depth)?;
        doc.entries.push((key, value));
    }
    Ok(doc)
}

fn read_cstring(buf: &mut &[u8]) -> DocumentResult<String> {
    let end = buf
        .iter()
        .position(|b| *b == 0)
        .ok_or(DocumentError::Truncated { needed: 1 })?;
    let s = std::str::from_utf8(&buf[..end])
        .map_err(|_| DocumentError::InvalidUtf8)?
        .to_owned();
    buf.advance(end + 1);
    Ok(s)
}

fn read_len(buf: &mut &[u8]) -> DocumentResult<usize> {
    ensure(buf, 4)?;
    let declared = buf.get_i32_le();
    usize::try_from(declared).map_err(|_| DocumentError::InvalidLength(i64::from(declared)))
}

fn read_value(
    buf: &mut &[u8],
    element_type: u8,
    key: &str,
    depth: usize,
) -> DocumentResult<Bson> {
    let value = match element_type {
        TYPE_DOUBLE => {
            ensure(buf, 8)?;
            Bson::Double(buf.get_f64_le())
        }
        TYPE_STRING => {
            let len = read_len(buf)?;
            if len == 0 {
                return Err(DocumentError::InvalidLength(0));
            }
            ensure(buf, len)?;
            let s = std::str::from_utf8(&buf[..len - 1])
                .map_err(|_| DocumentError::InvalidUtf8)?
                .to_owned();
            buf.advance(len);
            Bson::String(s)
        }
        TYPE_DOCUMENT => Bson::Document(read_document(buf, depth + 1)?),
        TYPE_BINARY => {
            let len = read_len(buf)?;
            ensure(buf, len + 1)?;
            let _subtype = buf.get_u8();
            let data = buf[..len].to_vec();
            buf.advance(len);
            Bson::Binary(data)
        }
        TYPE_BOOLEAN => {
            ensure(buf, 1)?;
            Bson::Boolean(buf.get_u8() != 0)
        }
        TYPE_NULL => Bson::Null,
        TYPE_INT32 => {
            ensure(buf, 4)?;
            Bson::Int32(buf.get_i32_le())
        }
        TYPE_INT64 => {
            ensure(buf, 8)?;
            Bson::Int64(buf.get_i64_le())
        }
        other => {
            return Err(DocumentError::UnsupportedType {
                element_type: other,
                key: key.to_owned(),
            });
        }
    };
    Ok(value)
}
