//! Test-only builder for flattened device tree blobs.

use std::collections::HashMap;

use crate::binary::{ByteOrder, FDT_BEGIN_NODE, FDT_END, FDT_END_NODE, FDT_MAGIC, FDT_PROP, HEADER_SIZE};

enum Op {
    Begin(String),
    Prop { nameoff: u32, value: Vec<u8> },
    End,
    Raw(u32),
}

/// Assembles a blob token by token. Integer fields are written in the
/// requested byte order; names and values are copied verbatim.
pub(crate) struct FdtBuilder {
    ops: Vec<Op>,
    strings: Vec<u8>,
    offsets: HashMap<String, u32>,
    version: u32,
}

impl FdtBuilder {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            strings: Vec::new(),
            offsets: HashMap::new(),
            version: 17,
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn begin(mut self, name: &str) -> Self {
        self.ops.push(Op::Begin(name.to_string()));
        self
    }

    pub fn end(mut self) -> Self {
        self.ops.push(Op::End);
        self
    }

    pub fn raw(mut self, token: u32) -> Self {
        self.ops.push(Op::Raw(token));
        self
    }

    pub fn prop(mut self, name: &str, value: &[u8]) -> Self {
        let nameoff = self.intern(name);
        self.ops.push(Op::Prop {
            nameoff,
            value: value.to_vec(),
        });
        self
    }

    /// Property whose name offset is written as-is, bypassing the string table.
    pub fn prop_at(mut self, nameoff: u32, value: &[u8]) -> Self {
        self.ops.push(Op::Prop {
            nameoff,
            value: value.to_vec(),
        });
        self
    }

    pub fn prop_str(self, name: &str, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.prop(name, &bytes)
    }

    pub fn prop_cells(self, name: &str, cells: &[u32]) -> Self {
        let bytes: Vec<u8> = cells.iter().flat_map(|c| c.to_be_bytes()).collect();
        self.prop(name, &bytes)
    }

    /// Adds a raw entry to the strings block (used to plant empty names).
    pub fn string_entry(mut self, raw: &[u8]) -> Self {
        self.strings.extend_from_slice(raw);
        self
    }

    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&off) = self.offsets.get(name) {
            return off;
        }
        let off = self.strings.len() as u32;
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        self.offsets.insert(name.to_string(), off);
        off
    }

    pub fn build(&self, order: ByteOrder) -> Vec<u8> {
        let put = |buf: &mut Vec<u8>, v: u32| match order {
            ByteOrder::BigEndian => buf.extend_from_slice(&v.to_be_bytes()),
            ByteOrder::Swapped => buf.extend_from_slice(&v.to_le_bytes()),
        };
        let pad = |buf: &mut Vec<u8>| {
            while buf.len() % 4 != 0 {
                buf.push(0);
            }
        };

        let mut structure = Vec::new();
        for op in &self.ops {
            match op {
                Op::Begin(name) => {
                    put(&mut structure, FDT_BEGIN_NODE);
                    structure.extend_from_slice(name.as_bytes());
                    structure.push(0);
                    pad(&mut structure);
                }
                Op::Prop { nameoff, value } => {
                    put(&mut structure, FDT_PROP);
                    put(&mut structure, value.len() as u32);
                    put(&mut structure, *nameoff);
                    structure.extend_from_slice(value);
                    pad(&mut structure);
                }
                Op::End => put(&mut structure, FDT_END_NODE),
                Op::Raw(token) => put(&mut structure, *token),
            }
        }
        put(&mut structure, FDT_END);

        let rsvmap_len = 16;
        let off_mem_rsvmap = HEADER_SIZE as u32;
        let off_dt_struct = off_mem_rsvmap + rsvmap_len;
        let off_dt_strings = off_dt_struct + structure.len() as u32;
        let totalsize = off_dt_strings + self.strings.len() as u32;

        let mut blob = Vec::with_capacity(totalsize as usize);
        for field in [
            FDT_MAGIC,
            totalsize,
            off_dt_struct,
            off_dt_strings,
            off_mem_rsvmap,
            self.version,
            16,
            0,
            self.strings.len() as u32,
            structure.len() as u32,
        ] {
            put(&mut blob, field);
        }
        blob.extend_from_slice(&[0u8; 16]);
        blob.extend_from_slice(&structure);
        blob.extend_from_slice(&self.strings);
        blob
    }
}

/// Overwrite one big-endian header word (index 0..10).
pub(crate) fn set_header_field(blob: &mut [u8], index: usize, value: u32) {
    blob[index * 4..index * 4 + 4].copy_from_slice(&value.to_be_bytes());
}

/// The blob decoded by most tests:
///
/// ```text
/// / {
///     compatible = "acme,board";
///     #address-cells = <1>;
///     cpus { cpu@0 { reg = <0>; }; };
///     memory@80000000 { device_type = "memory"; };
/// };
/// ```
pub(crate) fn sample_blob(order: ByteOrder) -> Vec<u8> {
    FdtBuilder::new()
        .begin("")
        .prop_str("compatible", "acme,board")
        .prop_cells("#address-cells", &[1])
        .begin("cpus")
        .begin("cpu@0")
        .prop_cells("reg", &[0])
        .end()
        .end()
        .begin("memory@80000000")
        .prop_str("device_type", "memory")
        .end()
        .end()
        .build(order)
}
