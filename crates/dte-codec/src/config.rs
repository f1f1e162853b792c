//! Decoder limits and file-name hints.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Limits and file-name hints shared by the decoders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Oldest blob version accepted.
    pub min_version: u32,
    /// Newest blob version known; newer versions decode with a warning.
    pub max_known_version: u32,
    /// Property name offsets at or above this are rejected outright.
    pub max_name_offset: u32,
    /// File extensions that mark a blob (lowercase, no dot).
    pub binary_extensions: Vec<String>,
    /// File extensions that mark source text (lowercase, no dot).
    pub text_extensions: Vec<String>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            min_version: 16,
            max_known_version: 17,
            max_name_offset: 0x0100_0000,
            binary_extensions: vec!["dtb".into(), "dtbo".into()],
            text_extensions: vec!["dts".into(), "dtsi".into()],
        }
    }
}

impl DecodeConfig {
    pub(crate) fn is_binary_name(&self, source_id: &str) -> bool {
        has_extension(source_id, &self.binary_extensions)
    }

    pub(crate) fn is_text_name(&self, source_id: &str) -> bool {
        has_extension(source_id, &self.text_extensions)
    }
}

fn has_extension(source_id: &str, extensions: &[String]) -> bool {
    Path::new(source_id)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = DecodeConfig::default();
        assert_eq!(c.min_version, 16);
        assert_eq!(c.max_known_version, 17);
        assert_eq!(c.max_name_offset, 0x100_0000);
    }

    #[test]
    fn extension_hints() {
        let c = DecodeConfig::default();
        assert!(c.is_binary_name("board.dtb"));
        assert!(c.is_binary_name("/boot/overlay.DTBO"));
        assert!(!c.is_binary_name("board.dts"));
        assert!(c.is_text_name("board.dts"));
        assert!(c.is_text_name("soc.dtsi"));
        assert!(!c.is_text_name("notes.txt"));
        assert!(!c.is_text_name("dts"));
    }
}
