use crate::location::LocationKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoMetricsError {
    #[error("Invalid argument: confidence must be within [0, 1], got {0}")]
    InvalidArgument(f64),
}

/// Why a shareable link could not be turned back into a location result.
///
/// Decoding is all-or-nothing, so every variant means no result was produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field appears more than once: {0}")]
    DuplicateField(String),

    #[error("Invalid location type: {0:?}")]
    InvalidKind(String),

    #[error("Field `{field}` is not a finite number: {value:?}")]
    InvalidNumber { field: String, value: String },

    #[error("Field `{field}` is out of range: {value}")]
    OutOfRange { field: String, value: f64 },

    #[error("Field `{field}` is not allowed on {kind} results")]
    FieldNotAllowed { field: String, kind: LocationKind },

    #[error("Malformed exif data: {0}")]
    MalformedExif(String),

    #[error("Source must not be empty")]
    EmptySource,

    #[error("Link has no query string")]
    MissingQuery,
}

/// Reason a candidate file was turned away before upload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("File type {mime_type} not allowed. Allowed types: {allowed}")]
    UnsupportedType { mime_type: String, allowed: String },

    #[error("File size of {size_bytes} bytes exceeds the {max_bytes} byte limit")]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("File is empty")]
    Empty,
}
