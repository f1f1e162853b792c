//! In-memory model for device trees.
//!
//! Both the binary blob decoder and the source text decoder produce a
//! [`Tree`]; the diff engine consumes two of them.
//!
//! # Key Types
//!
//! - [`PropertyValue`] -- string, raw bytes, 32-bit cells or 64-bit cells
//! - [`Property`] -- a named value; names are unique within a node
//! - [`Tree`] / [`Node`] / [`NodeId`] -- arena-owned nodes with parent indices
//!
//! [`render_value`] is the single place property values are turned into
//! display text.

pub mod error;
pub mod node;
pub mod tree;
pub mod value;

pub use error::{TreeError, TreeResult};
pub use node::{Node, NodeId};
pub use tree::{join_path, Tree, ValidationIssue, Walk, ROOT_NAME};
pub use value::{render_value, Property, PropertyValue};
