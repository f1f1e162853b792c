//! Change records produced by the diff engine.

use std::fmt;

use serde::Serialize;

use dte_tree::Property;

/// What happened to a node or property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        })
    }
}

/// One change between base and overlay.
///
/// An entry without a property name describes a whole node; otherwise it
/// describes one property of the node at `path`. Values are rendered with
/// [`dte_tree::render_value`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    kind: DiffKind,
    path: String,
    property_name: Option<String>,
    old_value: Option<String>,
    new_value: Option<String>,
    description: String,
}

impl DiffEntry {
    pub(crate) fn node_added(path: &str, name: &str) -> Self {
        Self::node(DiffKind::Added, path, format!("Node added: {name}"))
    }

    pub(crate) fn node_removed(path: &str, name: &str) -> Self {
        Self::node(DiffKind::Removed, path, format!("Node removed: {name}"))
    }

    fn node(kind: DiffKind, path: &str, description: String) -> Self {
        Self {
            kind,
            path: path.to_string(),
            property_name: None,
            old_value: None,
            new_value: None,
            description,
        }
    }

    pub(crate) fn property_added(path: &str, property: &Property) -> Self {
        Self {
            kind: DiffKind::Added,
            path: path.to_string(),
            property_name: Some(property.name().to_string()),
            old_value: None,
            new_value: Some(property.render()),
            description: format!("Property added: {}", property.name()),
        }
    }

    pub(crate) fn property_removed(path: &str, property: &Property) -> Self {
        Self {
            kind: DiffKind::Removed,
            path: path.to_string(),
            property_name: Some(property.name().to_string()),
            old_value: Some(property.render()),
            new_value: None,
            description: format!("Property removed: {}", property.name()),
        }
    }

    pub(crate) fn property_modified(path: &str, old: &Property, new: &Property) -> Self {
        Self {
            kind: DiffKind::Modified,
            path: path.to_string(),
            property_name: Some(new.name().to_string()),
            old_value: Some(old.render()),
            new_value: Some(new.render()),
            description: format!("Property modified: {}", new.name()),
        }
    }

    pub fn kind(&self) -> DiffKind {
        self.kind
    }

    /// Full path of the node the change belongs to.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    pub fn old_value(&self) -> Option<&str> {
        self.old_value.as_deref()
    }

    pub fn new_value(&self) -> Option<&str> {
        self.new_value.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// True for whole-node additions and removals.
    pub fn is_node_change(&self) -> bool {
        self.property_name.is_none()
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.description)?;
        match (&self.old_value, &self.new_value) {
            (Some(old), Some(new)) => write!(f, " ({old} -> {new})"),
            (None, Some(new)) => write!(f, " ({new})"),
            (Some(old), None) => write!(f, " ({old})"),
            (None, None) => Ok(()),
        }
    }
}
