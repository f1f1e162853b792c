//! Flattened device tree (DTB) decoder.
//!
//! On-disk layout:
//!
//! ```text
//! [40 bytes: header, ten u32 fields]
//! [memory reservation map]        at off_mem_rsvmap
//! [structure block: u32 tokens]   at off_dt_struct, size_dt_struct bytes
//! [strings block: NUL-terminated] at off_dt_strings, size_dt_strings bytes
//! ```
//!
//! Integers are big-endian. A blob whose magic reads as `0xedfe0dd0` had
//! every integer field written byte-reversed; those are normalized on read.
//! Names and property values are never reordered.

use tracing::{debug, warn};

use dte_tree::{Property, PropertyValue, Tree};

use crate::config::DecodeConfig;
use crate::error::{DecodeResult, DecodeWarning, FormatError};
use crate::selector::{Decoded, TreeDecoder};

pub const FDT_MAGIC: u32 = 0xd00d_feed;
pub const FDT_MAGIC_SWAPPED: u32 = 0xedfe_0dd0;
pub const HEADER_SIZE: usize = 40;

pub const FDT_BEGIN_NODE: u32 = 0x0000_0001;
pub const FDT_PROP: u32 = 0x0000_0002;
pub const FDT_END_NODE: u32 = 0x0000_0003;
pub const FDT_END: u32 = 0x0000_0009;

/// Byte order of the integer fields in a blob, relative to the format's
/// big-endian definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    Swapped,
}

impl ByteOrder {
    fn read_u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let end = offset.checked_add(4)?;
        let word: [u8; 4] = data.get(offset..end)?.try_into().ok()?;
        Some(match self {
            Self::BigEndian => u32::from_be_bytes(word),
            Self::Swapped => u32::from_le_bytes(word),
        })
    }
}

/// True if `head` starts with the blob magic in either byte order.
pub fn has_magic(head: &[u8]) -> bool {
    match head.get(..4) {
        Some(m) => m == FDT_MAGIC.to_be_bytes() || m == FDT_MAGIC_SWAPPED.to_be_bytes(),
        None => false,
    }
}

/// The ten header fields, already normalized to host values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FdtHeader {
    pub magic: u32,
    pub totalsize: u32,
    pub off_dt_struct: u32,
    pub off_dt_strings: u32,
    pub off_mem_rsvmap: u32,
    pub version: u32,
    pub last_comp_version: u32,
    pub boot_cpuid_phys: u32,
    pub size_dt_strings: u32,
    pub size_dt_struct: u32,
    pub byte_order: ByteOrder,
}

impl FdtHeader {
    /// Read the header and detect the byte order. Only the length and the
    /// magic are checked here; see [`FdtHeader::validate`].
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < HEADER_SIZE {
            return Err(FormatError::TruncatedHeader { len: data.len() });
        }
        let raw_magic = ByteOrder::BigEndian
            .read_u32(data, 0)
            .ok_or(FormatError::TruncatedHeader { len: data.len() })?;
        let byte_order = match raw_magic {
            FDT_MAGIC => ByteOrder::BigEndian,
            FDT_MAGIC_SWAPPED => ByteOrder::Swapped,
            other => return Err(FormatError::BadMagic(other)),
        };

        let mut fields = [0u32; 10];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = byte_order
                .read_u32(data, i * 4)
                .ok_or(FormatError::TruncatedHeader { len: data.len() })?;
        }

        Ok(Self {
            magic: fields[0],
            totalsize: fields[1],
            off_dt_struct: fields[2],
            off_dt_strings: fields[3],
            off_mem_rsvmap: fields[4],
            version: fields[5],
            last_comp_version: fields[6],
            boot_cpuid_phys: fields[7],
            size_dt_strings: fields[8],
            size_dt_struct: fields[9],
            byte_order,
        })
    }

    /// Check sizes, offsets and version against the actual input length.
    /// Returns the non-fatal warnings on success.
    pub fn validate(&self, input_len: usize, config: &DecodeConfig) -> Result<Vec<DecodeWarning>, FormatError> {
        if self.totalsize as usize != input_len {
            return Err(FormatError::SizeMismatch {
                declared: self.totalsize,
                actual: input_len,
            });
        }

        let total = u64::from(self.totalsize);
        let starts = [
            ("off_dt_struct", u64::from(self.off_dt_struct)),
            ("off_dt_strings", u64::from(self.off_dt_strings)),
            ("off_mem_rsvmap", u64::from(self.off_mem_rsvmap)),
        ];
        for (field, value) in starts {
            if value >= total {
                return Err(self.out_of_bounds(field, value));
            }
        }
        let ends = [
            (
                "off_dt_struct + size_dt_struct",
                u64::from(self.off_dt_struct) + u64::from(self.size_dt_struct),
            ),
            (
                "off_dt_strings + size_dt_strings",
                u64::from(self.off_dt_strings) + u64::from(self.size_dt_strings),
            ),
        ];
        for (field, value) in ends {
            if value > total {
                return Err(self.out_of_bounds(field, value));
            }
        }

        if self.version < config.min_version {
            return Err(FormatError::UnsupportedVersion {
                version: self.version,
                minimum: config.min_version,
            });
        }
        let mut warnings = Vec::new();
        if self.version > config.max_known_version {
            warnings.push(DecodeWarning::UnknownVersion {
                version: self.version,
                max_known: config.max_known_version,
            });
        }
        Ok(warnings)
    }

    fn out_of_bounds(&self, field: &'static str, value: u64) -> FormatError {
        FormatError::OffsetOutOfBounds {
            field,
            value,
            totalsize: self.totalsize,
        }
    }

    /// Byte range of the structure block. Version 16 blobs may leave
    /// `size_dt_struct` at zero, in which case the block runs to the end.
    fn struct_range(&self) -> (usize, usize) {
        let start = self.off_dt_struct as usize;
        let end = match self.size_dt_struct {
            0 => self.totalsize as usize,
            size => start + size as usize,
        };
        (start, end)
    }

    fn strings_range(&self) -> (usize, usize) {
        let start = self.off_dt_strings as usize;
        (start, start + self.size_dt_strings as usize)
    }
}

/// Classify raw property bytes.
///
/// Zero-length values become the empty string. A value ending in NUL whose
/// other bytes are all printable ASCII becomes a string. Anything else is
/// kept as raw bytes. Cell arrays that happen to look like text are read as
/// strings; there is no schema to tell them apart.
pub fn classify_value(raw: &[u8]) -> PropertyValue {
    match raw.split_last() {
        None => PropertyValue::empty(),
        Some((&0, text)) if text.iter().all(|b| (32..=126).contains(b)) => {
            PropertyValue::String(text.iter().map(|&b| char::from(b)).collect())
        }
        Some(_) => PropertyValue::Bytes(raw.to_vec()),
    }
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Decoder for flattened device tree blobs.
#[derive(Clone, Debug, Default)]
pub struct BinaryDecoder {
    config: DecodeConfig,
}

impl BinaryDecoder {
    pub fn new(config: DecodeConfig) -> Self {
        Self { config }
    }

    /// Decode a complete blob held in memory.
    pub fn decode_bytes(&self, data: &[u8], source_id: &str) -> DecodeResult<Decoded> {
        let header = FdtHeader::parse(data)?;
        let warnings = header.validate(data.len(), &self.config)?;
        for w in &warnings {
            warn!(source = source_id, "{w}");
        }

        let (struct_start, struct_end) = header.struct_range();
        let (strings_start, strings_end) = header.strings_range();
        let walker = StructWalker {
            data: &data[..struct_end],
            strings: &data[strings_start..strings_end],
            order: header.byte_order,
            pos: struct_start,
            max_name_offset: self.config.max_name_offset,
        };
        let tree = walker.walk(source_id)?;

        debug!(
            source = source_id,
            version = header.version,
            swapped = header.byte_order == ByteOrder::Swapped,
            nodes = tree.node_count(),
            properties = tree.property_count(),
            "decoded blob"
        );
        Ok(Decoded { tree, warnings })
    }
}

impl TreeDecoder for BinaryDecoder {
    fn name(&self) -> &'static str {
        "dtb"
    }

    fn can_decode(&self, source_id: &str, head: &[u8]) -> bool {
        has_magic(head) || self.config.is_binary_name(source_id)
    }

    fn decode(&self, input: &[u8], source_id: &str) -> DecodeResult<Decoded> {
        self.decode_bytes(input, source_id)
    }
}

/// Cursor over the structure block. `data` is cut at the end of the block,
/// so every read past it fails as truncation.
struct StructWalker<'a> {
    data: &'a [u8],
    strings: &'a [u8],
    order: ByteOrder,
    pos: usize,
    max_name_offset: u32,
}

impl<'a> StructWalker<'a> {
    fn walk(mut self, source_id: &str) -> DecodeResult<Tree> {
        let mut tree = Tree::new(source_id);

        // Skip anything (e.g. NOP tokens) before the root.
        loop {
            if self.pos + 4 > self.data.len() {
                return Err(FormatError::MissingRoot.into());
            }
            match self.token()? {
                FDT_BEGIN_NODE => break,
                FDT_END => return Err(FormatError::MissingRoot.into()),
                _ => {}
            }
        }
        let root_name = self.node_name()?;
        if !root_name.is_empty() && root_name != "/" {
            debug!(name = %root_name, "root node has a name; using '/'");
        }

        let mut open = vec![tree.root()];
        while let Some(&current) = open.last() {
            let offset = self.pos;
            match self.token()? {
                FDT_PROP => {
                    let property = self.property(offset)?;
                    tree.set_property(current, property)?;
                }
                FDT_BEGIN_NODE => {
                    let name = self.node_name()?;
                    if name.is_empty() {
                        return Err(FormatError::EmptyNodeName { offset }.into());
                    }
                    let child = tree.add_child(current, name)?;
                    open.push(child);
                }
                FDT_END_NODE => {
                    open.pop();
                }
                FDT_END => break,
                _ => {}
            }
        }
        Ok(tree)
    }

    fn token(&mut self) -> Result<u32, FormatError> {
        let value = self
            .order
            .read_u32(self.data, self.pos)
            .ok_or_else(|| self.truncated("expected a token"))?;
        self.pos += 4;
        Ok(value)
    }

    fn truncated(&self, reason: &str) -> FormatError {
        FormatError::Truncated {
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    /// NUL-terminated name padded to a 4-byte boundary.
    fn node_name(&mut self) -> Result<String, FormatError> {
        let rest = self.data.get(self.pos..).unwrap_or_default();
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.truncated("unterminated node name"))?;
        let name = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos = align4(self.pos + nul + 1);
        Ok(name)
    }

    fn property(&mut self, offset: usize) -> Result<Property, FormatError> {
        let len = self.token()? as usize;
        let nameoff = self.token()?;
        let name = self.property_name(nameoff, offset)?;

        let start = self.pos;
        let stop = start
            .checked_add(len)
            .filter(|&stop| stop <= self.data.len())
            .ok_or_else(|| self.truncated("property value overruns the structure block"))?;
        let value = classify_value(&self.data[start..stop]);
        self.pos = align4(stop);

        Property::new(name, value).map_err(|_| FormatError::EmptyPropertyName { offset })
    }

    fn property_name(&self, nameoff: u32, offset: usize) -> Result<String, FormatError> {
        if nameoff >= self.max_name_offset {
            return Err(FormatError::InvalidNameOffset(nameoff));
        }
        let tail = self
            .strings
            .get(nameoff as usize..)
            .ok_or(FormatError::InvalidNameOffset(nameoff))?;
        let nul = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(FormatError::InvalidNameOffset(nameoff))?;
        if nul == 0 {
            return Err(FormatError::EmptyPropertyName { offset });
        }
        Ok(String::from_utf8_lossy(&tail[..nul]).into_owned())
    }
}
