//! Error taxonomy shared by every layer of the codec.
//!
//! All variants are fatal for the call that produced them.  The parser is
//! strict: there is no degraded mode and no partial directory is ever handed
//! out after a failed open.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::array::ArrayType;

pub type Result<T> = std::result::Result<T, EclError>;

#[derive(Error, Debug)]
pub enum EclError {
    #[error("could not open file '{path}': {source}")]
    FileNotFound {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file name '{0}' has no extension; cannot tell binary from formatted")]
    InvalidFileName(String),

    /// Header framing, unknown type tag, malformed X231 pair, unparsable token.
    #[error("format violation: {0}")]
    Format(String),

    #[error("type mismatch for array '{name}': stored as {actual}, requested {requested}")]
    TypeMismatch {
        name:      String,
        actual:    ArrayType,
        requested: ArrayType,
    },

    #[error("key '{0}' not found")]
    KeyNotFound(String),

    #[error("array index {index} out of range ({len} arrays in file)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Block accounting over- or under-shoots the declared element count.
    #[error("size inconsistency in array '{name}' ({array_type}): expected {expected} elements, {detail}")]
    SizeInconsistency {
        name:       String,
        array_type: ArrayType,
        expected:   i64,
        detail:     String,
    },

    #[error("invalid {array_type} value in array '{name}': {detail}")]
    DecodeValue {
        name:       String,
        array_type: ArrayType,
        detail:     String,
    },

    /// The writer was handed something the format cannot represent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("worker pool: {0}")]
    ThreadPool(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl EclError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        EclError::Format(msg.into())
    }

    pub(crate) fn size(name: &str, array_type: ArrayType, expected: i64, detail: impl Into<String>) -> Self {
        EclError::SizeInconsistency {
            name: name.to_owned(),
            array_type,
            expected,
            detail: detail.into(),
        }
    }

    pub(crate) fn value(name: &str, array_type: ArrayType, detail: impl Into<String>) -> Self {
        EclError::DecodeValue {
            name: name.to_owned(),
            array_type,
            detail: detail.into(),
        }
    }
}
