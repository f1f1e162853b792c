//! Decode errors and non-fatal decode warnings.

use std::fmt;

use thiserror::Error;

use dte_tree::TreeError;

/// Structural problems in a binary blob. All are fatal to the decode call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("truncated header: {len} bytes, need at least 40")]
    TruncatedHeader { len: usize },

    #[error("bad magic: {0:#010x}")]
    BadMagic(u32),

    #[error("size mismatch: header declares {declared} bytes, input has {actual}")]
    SizeMismatch { declared: u32, actual: usize },

    #[error("offset out of bounds: {field} = {value} exceeds totalsize {totalsize}")]
    OffsetOutOfBounds {
        field: &'static str,
        value: u64,
        totalsize: u32,
    },

    #[error("unsupported version: {version} (minimum {minimum})")]
    UnsupportedVersion { version: u32, minimum: u32 },

    #[error("invalid name offset: {0:#x}")]
    InvalidNameOffset(u32),

    #[error("empty property name at offset {offset:#x}")]
    EmptyPropertyName { offset: usize },

    #[error("empty node name at offset {offset:#x}")]
    EmptyNodeName { offset: usize },

    #[error("structure block truncated at offset {offset:#x}: {reason}")]
    Truncated { offset: usize, reason: String },

    #[error("structure block contains no root node")]
    MissingRoot,
}

/// Errors that abort a decode call.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Malformed binary blob.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// The decoded structure was rejected by the tree model.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Structural error in source text.
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// No registered decoder accepts the input.
    #[error("no decoder for {0}")]
    NoDecoder(String),

    /// Reading the input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`DecodeError`] for callers that render
/// different messages per failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    Syntax,
    NoDecoder,
    Io,
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) | Self::Tree(_) => ErrorKind::Format,
            Self::Syntax { .. } => ErrorKind::Syntax,
            Self::NoDecoder(_) => ErrorKind::NoDecoder,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// Convenience alias for decode results.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Problems that were recovered from during a decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// Blob version newer than the newest known version.
    UnknownVersion { version: u32, max_known: u32 },
    /// A cell or byte token failed to parse; the property was skipped.
    InvalidValue {
        line: usize,
        property: String,
        token: String,
    },
    /// Input ended while nodes were still open.
    UnclosedNodes { open: usize },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownVersion { version, max_known } => {
                write!(f, "blob version {version} is newer than {max_known}; decoding anyway")
            }
            Self::InvalidValue {
                line,
                property,
                token,
            } => write!(f, "line {line}: skipped property '{property}', invalid token '{token}'"),
            Self::UnclosedNodes { open } => write!(f, "input ended with {open} unclosed node(s)"),
        }
    }
}
