//! Decoder selection.
//!
//! Decoders are tried in registration order; the first whose
//! [`TreeDecoder::can_decode`] accepts the input wins.

use tracing::debug;

use dte_tree::Tree;

use crate::binary::BinaryDecoder;
use crate::config::DecodeConfig;
use crate::error::{DecodeError, DecodeResult, DecodeWarning};
use crate::text::TextDecoder;

/// Number of leading bytes handed to [`TreeDecoder::can_decode`].
pub const SNIFF_LEN: usize = 4;

/// A decoded tree plus the problems recovered from along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub tree: Tree,
    pub warnings: Vec<DecodeWarning>,
}

impl Decoded {
    pub fn into_tree(self) -> Tree {
        self.tree
    }
}

/// One input format.
pub trait TreeDecoder: Send + Sync {
    /// Short format name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this decoder should handle the input, judged from its
    /// identifier and its first [`SNIFF_LEN`] bytes.
    fn can_decode(&self, source_id: &str, head: &[u8]) -> bool;

    /// Decode the whole input.
    fn decode(&self, input: &[u8], source_id: &str) -> DecodeResult<Decoded>;
}

/// Ordered set of decoders.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn TreeDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { decoders: Vec::new() }
    }

    /// Binary decoder first, then text.
    pub fn with_defaults(config: DecodeConfig) -> Self {
        let mut registry = Self::new();
        registry.register(BinaryDecoder::new(config.clone()));
        registry.register(TextDecoder::new(config));
        registry
    }

    /// Append a decoder; it is tried after those already registered.
    pub fn register(&mut self, decoder: impl TreeDecoder + 'static) {
        self.decoders.push(Box::new(decoder));
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// First decoder that accepts the input, if any.
    pub fn select(&self, source_id: &str, input: &[u8]) -> Option<&dyn TreeDecoder> {
        let head = &input[..input.len().min(SNIFF_LEN)];
        self.decoders
            .iter()
            .map(|d| d.as_ref())
            .find(|d| d.can_decode(source_id, head))
    }

    /// Select a decoder and run it.
    pub fn decode(&self, input: &[u8], source_id: &str) -> DecodeResult<Decoded> {
        let decoder = self
            .select(source_id, input)
            .ok_or_else(|| DecodeError::NoDecoder(source_id.to_string()))?;
        debug!(source = source_id, decoder = decoder.name(), bytes = input.len(), "selected decoder");
        decoder.decode(input, source_id)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults(DecodeConfig::default())
    }
}
