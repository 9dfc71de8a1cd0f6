//! Error types for document encoding and decoding.

/// Errors raised while reading or writing a [`Document`](crate::Document).
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The input ended before the declared length was consumed.
    #[error("truncated document: needed {needed} more bytes")]
    Truncated {
        /// Number of bytes that were missing.
        needed: usize,
    },

    /// The length prefix disagrees with the input or is out of range.
    #[error("invalid document length: {0}")]
    InvalidLength(i64),

    /// The element type byte is not one this codec understands.
    #[error("unsupported element type 0x{element_type:02x} for field `{key}`")]
    UnsupportedType {
        /// The element type byte.
        element_type: u8,
        /// The key the element was stored under.
        key: String,
    },

    /// A key or string value is not valid UTF-8.
    #[error("invalid UTF-8 in document")]
    InvalidUtf8,

    /// Embedded documents are nested deeper than the decoder allows.
    #[error("document nesting exceeds {0} levels")]
    TooDeep(usize),

    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A field holds a value of a different type than requested.
    #[error("field `{key}` is not a {expected}")]
    FieldType {
        /// The field name.
        key: String,
        /// The expected type name.
        expected: &'static str,
    },
}

/// Convenience result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;
