//! Decoders that turn device tree inputs into a [`dte_tree::Tree`].
//!
//! Two formats are understood: flattened blobs (`.dtb`, detected by magic
//! in either byte order) and source text (`.dts`/`.dtsi`, detected by name).
//!
//! # Key Types
//!
//! - [`BinaryDecoder`] / [`FdtHeader`] -- flattened blob decoding
//! - [`TextDecoder`] -- line-oriented source decoding
//! - [`DecoderRegistry`] / [`TreeDecoder`] -- format selection
//! - [`DecodeError`] / [`DecodeWarning`] -- fatal and recovered problems
//! - [`DecodeConfig`] -- version limits and file-name hints

pub mod binary;
pub mod config;
pub mod error;
pub mod selector;
pub mod text;

#[cfg(test)]
mod fixtures;

use std::path::Path;

use dte_tree::Tree;

pub use binary::{classify_value, BinaryDecoder, ByteOrder, FdtHeader};
pub use config::DecodeConfig;
pub use error::{DecodeError, DecodeResult, DecodeWarning, ErrorKind, FormatError};
pub use selector::{DecoderRegistry, Decoded, TreeDecoder};
pub use text::TextDecoder;

/// Decode an in-memory input with the default decoders.
///
/// `source_id` is usually a file name; it drives the extension hints and is
/// recorded as the tree's source.
pub fn decode(input: &[u8], source_id: &str) -> DecodeResult<Tree> {
    DecoderRegistry::default()
        .decode(input, source_id)
        .map(Decoded::into_tree)
}

/// Read a whole file and decode it with the default decoders.
pub fn decode_file(path: impl AsRef<Path>) -> DecodeResult<Tree> {
    let path = path.as_ref();
    let input = std::fs::read(path)?;
    decode(&input, &path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_blob;

    #[test]
    fn decode_file_reads_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.dtb");
        std::fs::write(&path, sample_blob(ByteOrder::BigEndian)).unwrap();

        let tree = decode_file(&path).unwrap();
        assert_eq!(tree.source(), path.to_string_lossy());
        assert!(tree.find_by_path("/cpus/cpu@0").is_some());
    }

    #[test]
    fn decode_file_reads_source_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.dts");
        std::fs::write(&path, "/dts-v1/;\n/ {\n    model = \"m\";\n};\n").unwrap();

        let tree = decode_file(&path).unwrap();
        assert_eq!(
            tree.root_node().property("model").unwrap().value().as_str(),
            Some("m")
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode_file(dir.path().join("absent.dtb")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn blob_with_unhelpful_name_still_decodes() {
        let tree = decode(&sample_blob(ByteOrder::Swapped), "firmware.img").unwrap();
        assert_eq!(tree.node_count(), 4);
    }
}
