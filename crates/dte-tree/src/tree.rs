//! The arena-backed device tree.
//!
//! A [`Tree`] owns every node in a single `Vec`; children are referenced by
//! [`NodeId`] and each node keeps the index of its parent. Paths are rebuilt
//! on demand by walking parent indices, so there are no reference cycles and
//! no shared ownership of subtrees.
//!
//! # Invariants
//!
//! - `NodeId::ROOT` always exists and is named `"/"`.
//! - Every reachable node other than the root has exactly one parent, and
//!   appears exactly once in that parent's child list.
//! - Property names are unique per node; the most recent insert wins.

use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};
use crate::node::{Node, NodeId};
use crate::value::Property;

/// Name of the root node.
pub const ROOT_NAME: &str = "/";

/// A decoded device tree together with the identifier of its source.
///
/// Deserialization checks the arena (see `TryFrom<TreeRepr>`) so a loaded
/// tree upholds the same invariants as one built through the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TreeRepr")]
pub struct Tree {
    source: String,
    nodes: Vec<Node>,
}

/// Unchecked wire form of a [`Tree`].
#[derive(Deserialize)]
pub struct TreeRepr {
    source: String,
    nodes: Vec<Node>,
}

impl TryFrom<TreeRepr> for Tree {
    type Error = TreeError;

    /// Accepts the arena only if the root is first, parentless and named
    /// `"/"`, every index is in range, parent and child links agree, each
    /// node is listed by at most one parent, and every node descends from a
    /// parentless node (no cycles).
    fn try_from(repr: TreeRepr) -> TreeResult<Self> {
        let nodes = repr.nodes;
        let corrupt = |msg: String| TreeError::Corrupt(msg);

        let root = nodes.first().ok_or_else(|| corrupt("no root node".into()))?;
        if root.parent.is_some() || root.name != ROOT_NAME {
            return Err(corrupt("first node is not a root".into()));
        }

        let mut listed = vec![false; nodes.len()];
        for (index, node) in nodes.iter().enumerate() {
            let id = NodeId(index);
            for &child in &node.children {
                let entry = nodes
                    .get(child.0)
                    .ok_or_else(|| corrupt(format!("{id} lists missing child {child}")))?;
                if entry.parent != Some(id) || std::mem::replace(&mut listed[child.0], true) {
                    return Err(corrupt(format!("inconsistent link {id} -> {child}")));
                }
            }
            if let Some(parent) = node.parent {
                let lists_us = nodes.get(parent.0).is_some_and(|p| p.children.contains(&id));
                if !lists_us {
                    return Err(corrupt(format!("{id} names {parent} as parent")));
                }
            }
        }

        let mut stack: Vec<NodeId> = (0..nodes.len())
            .filter(|&i| nodes[i].parent.is_none())
            .map(NodeId)
            .collect();
        let mut seen = 0;
        while let Some(id) = stack.pop() {
            seen += 1;
            stack.extend(nodes[id.0].children.iter().copied());
        }
        if seen != nodes.len() {
            return Err(corrupt("parent links form a cycle".into()));
        }

        Ok(Self {
            source: repr.source,
            nodes,
        })
    }
}

/// Problems reported by [`Tree::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("root node missing 'compatible' property")]
    MissingRootCompatible,
}

impl Tree {
    /// Create a tree holding only an empty root node.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            nodes: vec![Node::new(ROOT_NAME, None)],
        }
    }

    /// Identifier of the input this tree was decoded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn root_node(&self) -> &Node {
        &self.nodes[NodeId::ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(TreeError::NodeNotFound(id))
    }

    // ---------------------------------------------------------------
    // Paths
    // ---------------------------------------------------------------

    /// Full `/`-separated path of a node; the root is `"/"`.
    ///
    /// Returns `None` for unknown ids and for nodes detached by
    /// [`remove_child`](Self::remove_child).
    pub fn full_path(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = id;
        while current != NodeId::ROOT {
            let node = self.node(current)?;
            names.push(node.name.as_str());
            current = node.parent?;
        }
        if names.is_empty() {
            return Some(ROOT_NAME.to_string());
        }
        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        Some(path)
    }

    /// Resolve an absolute path. Each component selects the first child with
    /// that name; empty components are ignored.
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let mut current = NodeId::ROOT;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current = self.child_named(current, component)?;
        }
        Some(current)
    }

    /// First direct child of `parent` with the given name.
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)?
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].name == name)
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Append a new, empty child node and return its id.
    pub fn add_child(&mut self, parent: NodeId, name: impl Into<String>) -> TreeResult<NodeId> {
        let name = name.into();
        if name.is_empty() {
            return Err(TreeError::EmptyNodeName);
        }
        let id = NodeId(self.nodes.len());
        self.node_mut(parent)?.children.push(id);
        self.nodes.push(Node::new(name, Some(parent)));
        Ok(id)
    }

    /// Unlink `child` (and its subtree) from `parent`.
    ///
    /// Returns `false` when `child` is not a direct child of `parent`. The
    /// detached nodes stay in the arena but are no longer reachable.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> TreeResult<bool> {
        let children = &mut self.node_mut(parent)?.children;
        let Some(pos) = children.iter().position(|&c| c == child) else {
            return Ok(false);
        };
        children.remove(pos);
        self.node_mut(child)?.parent = None;
        Ok(true)
    }

    /// Add a property to a node, replacing any property with the same name.
    pub fn set_property(&mut self, node: NodeId, property: Property) -> TreeResult<()> {
        self.node_mut(node)?.set_property(property);
        Ok(())
    }

    /// Remove a property by name, returning it if present.
    pub fn remove_property(&mut self, node: NodeId, name: &str) -> TreeResult<Option<Property>> {
        Ok(self.node_mut(node)?.remove_property(name))
    }

    // ---------------------------------------------------------------
    // Traversal and search
    // ---------------------------------------------------------------

    /// Pre-order iterator over every node reachable from the root.
    pub fn walk(&self) -> Walk<'_> {
        self.walk_from(NodeId::ROOT)
    }

    /// Pre-order iterator over `start` and its descendants.
    pub fn walk_from(&self, start: NodeId) -> Walk<'_> {
        let stack = if self.node(start).is_some() { vec![start] } else { Vec::new() };
        Walk { tree: self, stack }
    }

    /// Nodes whose name equals `name`, in pre-order.
    pub fn find_nodes_by_name(&self, name: &str) -> Vec<NodeId> {
        self.walk().filter(|&id| self.nodes[id.0].name == name).collect()
    }

    /// Nodes whose name contains `pattern`, in pre-order.
    pub fn find_nodes_by_pattern(&self, pattern: &str) -> Vec<NodeId> {
        self.walk()
            .filter(|&id| self.nodes[id.0].name.contains(pattern))
            .collect()
    }

    /// Number of reachable nodes, root included.
    pub fn node_count(&self) -> usize {
        self.walk().count()
    }

    /// Total number of properties over all reachable nodes.
    pub fn property_count(&self) -> usize {
        self.walk().map(|id| self.nodes[id.0].properties.len()).sum()
    }

    /// Basic structural checks. An empty result means the tree is valid.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.root_node().property("compatible").is_none() {
            issues.push(ValidationIssue::MissingRootCompatible);
        }
        issues
    }
}

/// Join a parent path and a child name without doubling the root slash.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Pre-order traversal returned by [`Tree::walk`].
pub struct Walk<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Walk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.0];
        self.stack.extend(node.children.iter().rev().copied());
        Some(id)
    }
}
