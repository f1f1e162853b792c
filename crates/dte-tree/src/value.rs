//! Typed property values and their human-readable rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};

/// The value carried by a device tree property.
///
/// Values never compare equal across variants: a string and a cell list that
/// happen to describe the same bytes are different values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Printable text (NUL terminator already stripped).
    String(String),
    /// Raw bytes with no further interpretation.
    Bytes(Vec<u8>),
    /// 32-bit cells.
    Cells(Vec<u32>),
    /// 64-bit cells.
    Cells64(Vec<u64>),
}

impl PropertyValue {
    /// The empty string value used for zero-length and boolean properties.
    pub fn empty() -> Self {
        Self::String(String::new())
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    pub fn is_cells(&self) -> bool {
        matches!(self, Self::Cells(_))
    }

    pub fn is_cells64(&self) -> bool {
        matches!(self, Self::Cells64(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_cells(&self) -> Option<&[u32]> {
        match self {
            Self::Cells(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_cells64(&self) -> Option<&[u64]> {
        match self {
            Self::Cells64(c) => Some(c),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Cells(_) => "cells",
            Self::Cells64(_) => "cells64",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Bytes(bytes) => {
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Self::Cells(cells) => write_words(f, cells.iter().map(|&c| u64::from(c))),
            Self::Cells64(cells) => write_words(f, cells.iter().copied()),
        }
    }
}

fn write_words(f: &mut fmt::Formatter<'_>, words: impl Iterator<Item = u64>) -> fmt::Result {
    for (i, w) in words.enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{w:#x}")?;
    }
    Ok(())
}

/// Render a value for display in diffs, listings and reports.
///
/// Strings render as-is, bytes as space-separated two-digit hex, and cells
/// as space-separated `0x`-prefixed hex words.
pub fn render_value(value: &PropertyValue) -> String {
    value.to_string()
}

/// A named property attached to a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    name: String,
    value: PropertyValue,
}

impl Property {
    /// Create a property. The name must be non-empty.
    pub fn new(name: impl Into<String>, value: PropertyValue) -> TreeResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(TreeError::EmptyPropertyName);
        }
        Ok(Self { name, value })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// Rendered value, same as [`render_value`].
    pub fn render(&self) -> String {
        render_value(&self.value)
    }
}
