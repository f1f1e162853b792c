//! Structural diff engine for device trees.
//!
//! Compares a base tree with an overlay tree and produces a flat, ordered
//! list of node and property changes, with counts and filters over it.
//!
//! # Key Types
//!
//! - [`DiffEngine`] -- cached comparison of two trees; see [`diff`]
//! - [`DiffEntry`] / [`DiffKind`] -- one added, removed or modified item
//! - [`DiffStats`] -- aggregate counts
//! - [`DiffError`] -- why an engine is invalid

pub mod engine;
pub mod entry;
pub mod error;

pub use engine::{diff, DiffEngine, DiffStats};
pub use entry::{DiffEntry, DiffKind};
pub use error::DiffError;
