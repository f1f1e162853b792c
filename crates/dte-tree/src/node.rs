//! Node storage for the tree arena.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Property;

/// Index of a node inside its owning [`Tree`](crate::Tree).
///
/// A `NodeId` is only meaningful for the tree that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The root of every tree.
    pub const ROOT: NodeId = NodeId(0);

    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named point in the tree owning ordered properties and children.
///
/// Children are stored as arena indices in insertion order. The parent link
/// is a plain index used for path reconstruction only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) properties: Vec<Property>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            children: Vec::new(),
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Look up a property by name. Names are unique per node.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Insert a property; an existing one with the same name is removed first
    /// and the new one is appended at the end.
    pub(crate) fn set_property(&mut self, property: Property) {
        self.remove_property(property.name());
        self.properties.push(property);
    }

    pub(crate) fn remove_property(&mut self, name: &str) -> Option<Property> {
        let pos = self.properties.iter().position(|p| p.name() == name)?;
        Some(self.properties.remove(pos))
    }
}
