//! Structural comparison of two trees.
//!
//! Nodes are matched by name, properties by name. Where both sides have a
//! node, the overlay's names are visited first (added or compared), then
//! names only the base has (removed), both in lexicographic order. A subtree
//! present on one side only is emitted depth-first with its children in
//! insertion order and each node's properties sorted by name.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use dte_tree::{join_path, Node, NodeId, Property, Tree, ROOT_NAME};

use crate::entry::{DiffEntry, DiffKind};
use crate::error::DiffError;

/// Aggregate counts over a diff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub total_changes: usize,
    pub added_nodes: usize,
    pub removed_nodes: usize,
    pub added_properties: usize,
    pub removed_properties: usize,
    pub modified_properties: usize,
}

impl DiffStats {
    pub fn is_empty(&self) -> bool {
        self.total_changes == 0
    }
}

/// Compares a base tree against an overlay tree.
///
/// Entries are computed on first use and cached; every later call returns
/// the same slice. A missing tree makes the engine invalid and its entry
/// list empty.
pub struct DiffEngine<'t> {
    base: Option<&'t Tree>,
    overlay: Option<&'t Tree>,
    entries: OnceCell<Vec<DiffEntry>>,
}

/// Diff two trees.
pub fn diff<'t>(base: &'t Tree, overlay: &'t Tree) -> DiffEngine<'t> {
    DiffEngine::new(Some(base), Some(overlay))
}

impl<'t> DiffEngine<'t> {
    pub fn new(base: Option<&'t Tree>, overlay: Option<&'t Tree>) -> Self {
        Self {
            base,
            overlay,
            entries: OnceCell::new(),
        }
    }

    pub fn base(&self) -> Option<&'t Tree> {
        self.base
    }

    pub fn overlay(&self) -> Option<&'t Tree> {
        self.overlay
    }

    /// Both trees are present.
    pub fn is_valid(&self) -> bool {
        self.base.is_some() && self.overlay.is_some()
    }

    pub fn validation_errors(&self) -> Vec<DiffError> {
        let mut errors = Vec::new();
        if self.base.is_none() {
            errors.push(DiffError::MissingBase);
        }
        if self.overlay.is_none() {
            errors.push(DiffError::MissingOverlay);
        }
        errors
    }

    /// Ordered change list.
    pub fn entries(&self) -> &[DiffEntry] {
        self.entries.get_or_init(|| self.compute())
    }

    fn compute(&self) -> Vec<DiffEntry> {
        let (Some(base), Some(overlay)) = (self.base, self.overlay) else {
            for error in self.validation_errors() {
                warn!(%error, "diff skipped");
            }
            return Vec::new();
        };
        let entries = Comparison { base, overlay }.run();
        debug!(
            base = base.source(),
            overlay = overlay.source(),
            changes = entries.len(),
            "computed tree diff"
        );
        entries
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    fn count(&self, kind: DiffKind, node_level: bool) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.kind() == kind && e.is_node_change() == node_level)
            .count()
    }

    pub fn added_node_count(&self) -> usize {
        self.count(DiffKind::Added, true)
    }

    pub fn removed_node_count(&self) -> usize {
        self.count(DiffKind::Removed, true)
    }

    pub fn added_property_count(&self) -> usize {
        self.count(DiffKind::Added, false)
    }

    pub fn removed_property_count(&self) -> usize {
        self.count(DiffKind::Removed, false)
    }

    pub fn modified_property_count(&self) -> usize {
        self.count(DiffKind::Modified, false)
    }

    pub fn total_changes(&self) -> usize {
        self.entries().len()
    }

    pub fn added_nodes(&self) -> Vec<&DiffEntry> {
        self.select(|e| e.kind() == DiffKind::Added && e.is_node_change())
    }

    pub fn removed_nodes(&self) -> Vec<&DiffEntry> {
        self.select(|e| e.kind() == DiffKind::Removed && e.is_node_change())
    }

    pub fn modified_properties(&self) -> Vec<&DiffEntry> {
        self.select(|e| e.kind() == DiffKind::Modified && !e.is_node_change())
    }

    pub fn stats(&self) -> DiffStats {
        DiffStats {
            total_changes: self.total_changes(),
            added_nodes: self.added_node_count(),
            removed_nodes: self.removed_node_count(),
            added_properties: self.added_property_count(),
            removed_properties: self.removed_property_count(),
            modified_properties: self.modified_property_count(),
        }
    }

    pub fn filter_by_kind(&self, kind: DiffKind) -> Vec<&DiffEntry> {
        self.select(|e| e.kind() == kind)
    }

    /// Entries whose path contains `pattern`.
    pub fn filter_by_path(&self, pattern: &str) -> Vec<&DiffEntry> {
        self.select(|e| e.path().contains(pattern))
    }

    /// Property entries whose name contains `pattern`.
    pub fn filter_by_property(&self, pattern: &str) -> Vec<&DiffEntry> {
        self.select(|e| e.property_name().is_some_and(|p| p.contains(pattern)))
    }

    fn select(&self, keep: impl Fn(&DiffEntry) -> bool) -> Vec<&DiffEntry> {
        self.entries().iter().filter(|&e| keep(e)).collect()
    }
}

/// Pending comparison work, processed depth-first.
enum Step {
    Both { base: NodeId, overlay: NodeId, path: String },
    Added { node: NodeId, path: String },
    Removed { node: NodeId, path: String },
}

struct Comparison<'t> {
    base: &'t Tree,
    overlay: &'t Tree,
}

impl<'t> Comparison<'t> {
    fn run(&self) -> Vec<DiffEntry> {
        let mut entries = Vec::new();
        let mut stack = vec![Step::Both {
            base: self.base.root(),
            overlay: self.overlay.root(),
            path: ROOT_NAME.to_string(),
        }];

        while let Some(step) = stack.pop() {
            let mut next = Vec::new();
            match step {
                Step::Both { base, overlay, path } => {
                    let (Some(b), Some(o)) = (self.base.node(base), self.overlay.node(overlay)) else {
                        continue;
                    };
                    compare_properties(b, o, &path, &mut entries);

                    let base_children = children_by_name(self.base, b);
                    let overlay_children = children_by_name(self.overlay, o);
                    for (&name, &child) in &overlay_children {
                        let path = join_path(&path, name);
                        next.push(match base_children.get(name) {
                            Some(&base) => Step::Both { base, overlay: child, path },
                            None => Step::Added { node: child, path },
                        });
                    }
                    for (&name, &child) in &base_children {
                        if !overlay_children.contains_key(name) {
                            next.push(Step::Removed {
                                node: child,
                                path: join_path(&path, name),
                            });
                        }
                    }
                }
                Step::Added { node, path } => {
                    let Some(n) = self.overlay.node(node) else { continue };
                    entries.push(DiffEntry::node_added(&path, n.name()));
                    for property in sorted_properties(n) {
                        entries.push(DiffEntry::property_added(&path, property));
                    }
                    for (name, child) in children_in_order(self.overlay, n) {
                        next.push(Step::Added {
                            node: child,
                            path: join_path(&path, name),
                        });
                    }
                }
                Step::Removed { node, path } => {
                    let Some(n) = self.base.node(node) else { continue };
                    entries.push(DiffEntry::node_removed(&path, n.name()));
                    for property in sorted_properties(n) {
                        entries.push(DiffEntry::property_removed(&path, property));
                    }
                    for (name, child) in children_in_order(self.base, n) {
                        next.push(Step::Removed {
                            node: child,
                            path: join_path(&path, name),
                        });
                    }
                }
            }
            stack.extend(next.into_iter().rev());
        }
        entries
    }
}

fn compare_properties(base: &Node, overlay: &Node, path: &str, entries: &mut Vec<DiffEntry>) {
    let base_props = properties_by_name(base);
    let overlay_props = properties_by_name(overlay);

    for (name, new) in &overlay_props {
        match base_props.get(name) {
            None => entries.push(DiffEntry::property_added(path, new)),
            // Values of different kinds never compare equal.
            Some(old) if old.value() != new.value() => {
                entries.push(DiffEntry::property_modified(path, old, new));
            }
            Some(_) => {}
        }
    }
    for (name, old) in &base_props {
        if !overlay_props.contains_key(name) {
            entries.push(DiffEntry::property_removed(path, old));
        }
    }
}

fn properties_by_name(node: &Node) -> BTreeMap<&str, &Property> {
    node.properties().iter().map(|p| (p.name(), p)).collect()
}

fn sorted_properties(node: &Node) -> impl Iterator<Item = &Property> {
    properties_by_name(node).into_values()
}

/// Direct children keyed by name. With duplicate names the last one wins.
fn children_by_name<'t>(tree: &'t Tree, node: &'t Node) -> BTreeMap<&'t str, NodeId> {
    node.children()
        .iter()
        .filter_map(|&id| tree.node(id).map(|c| (c.name(), id)))
        .collect()
}

/// Direct children in insertion order.
fn children_in_order<'t>(tree: &'t Tree, node: &'t Node) -> impl Iterator<Item = (&'t str, NodeId)> {
    node.children()
        .iter()
        .filter_map(move |&id| tree.node(id).map(|c| (c.name(), id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dte_tree::PropertyValue;
    use proptest::prelude::*;

    fn dts(text: &str) -> Tree {
        dte_codec::decode(text.as_bytes(), "test.dts").unwrap()
    }

    fn summary(engine: &DiffEngine<'_>) -> Vec<(DiffKind, String, Option<String>)> {
        engine
            .entries()
            .iter()
            .map(|e| (e.kind(), e.path().to_string(), e.property_name().map(str::to_string)))
            .collect()
    }

    #[test]
    fn modified_property() {
        let base = dts(r#"/ { a = "1"; };"#);
        let overlay = dts(r#"/ { a = "2"; };"#);
        let engine = diff(&base, &overlay);

        let entries = engine.entries();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.kind(), DiffKind::Modified);
        assert_eq!(e.path(), "/");
        assert_eq!(e.property_name(), Some("a"));
        assert_eq!(e.old_value(), Some("1"));
        assert_eq!(e.new_value(), Some("2"));
        assert_eq!(e.description(), "Property modified: a");
        assert_eq!(engine.modified_property_count(), 1);
    }

    #[test]
    fn added_subtree() {
        let base = dts("/ { };");
        let overlay = dts("/ { child@0 { x = <1>; }; };");
        let engine = diff(&base, &overlay);

        let entries = engine.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind(), DiffKind::Added);
        assert_eq!(entries[0].path(), "/child@0");
        assert!(entries[0].is_node_change());
        assert_eq!(entries[0].description(), "Node added: child@0");
        assert_eq!(entries[1].kind(), DiffKind::Added);
        assert_eq!(entries[1].path(), "/child@0");
        assert_eq!(entries[1].property_name(), Some("x"));
        assert_eq!(entries[1].new_value(), Some("0x1"));
    }

    #[test]
    fn children_visited_in_name_order() {
        let base = dts("/ { b { }; a { p = \"old\"; }; };");
        let overlay = dts("/ { c { }; a { p = \"new\"; }; };");
        let engine = diff(&base, &overlay);

        assert_eq!(
            summary(&engine),
            vec![
                (DiffKind::Modified, "/a".to_string(), Some("p".to_string())),
                (DiffKind::Added, "/c".to_string(), None),
                (DiffKind::Removed, "/b".to_string(), None),
            ]
        );
    }

    #[test]
    fn properties_visited_in_name_order() {
        let base = dts("/ { z = \"1\"; m = \"1\"; gone = \"1\"; };");
        let overlay = dts("/ { new = \"1\"; z = \"2\"; m = \"1\"; };");
        let engine = diff(&base, &overlay);

        assert_eq!(
            summary(&engine),
            vec![
                (DiffKind::Added, "/".to_string(), Some("new".to_string())),
                (DiffKind::Modified, "/".to_string(), Some("z".to_string())),
                (DiffKind::Removed, "/".to_string(), Some("gone".to_string())),
            ]
        );
    }

    #[test]
    fn removed_subtree_is_depth_first() {
        let base = dts(
            "/ {\n  soc {\n    status = \"okay\";\n    uart@2 { };\n    i2c@1 { clk = <0x10>; };\n  };\n};\n",
        );
        let overlay = dts("/ { };");
        let engine = diff(&base, &overlay);

        assert_eq!(
            summary(&engine),
            vec![
                (DiffKind::Removed, "/soc".to_string(), None),
                (DiffKind::Removed, "/soc".to_string(), Some("status".to_string())),
                (DiffKind::Removed, "/soc/uart@2".to_string(), None),
                (DiffKind::Removed, "/soc/i2c@1".to_string(), None),
                (DiffKind::Removed, "/soc/i2c@1".to_string(), Some("clk".to_string())),
            ]
        );
        assert_eq!(engine.removed_node_count(), 3);
        assert_eq!(engine.removed_property_count(), 2);
        assert_eq!(engine.removed_nodes().len(), 3);
    }

    #[test]
    fn added_subtree_keeps_insertion_order() {
        let base = dts("/ { };");
        let overlay = dts("/ { soc { zeta { }; alpha { b = <1>; a = <2>; }; }; };");
        let engine = diff(&base, &overlay);

        assert_eq!(
            summary(&engine),
            vec![
                (DiffKind::Added, "/soc".to_string(), None),
                (DiffKind::Added, "/soc/zeta".to_string(), None),
                (DiffKind::Added, "/soc/alpha".to_string(), None),
                (DiffKind::Added, "/soc/alpha".to_string(), Some("a".to_string())),
                (DiffKind::Added, "/soc/alpha".to_string(), Some("b".to_string())),
            ]
        );
    }

    #[test]
    fn nested_shared_nodes_are_compared() {
        let base = dts("/ { soc { uart { baud = <0x1c200>; }; }; };");
        let overlay = dts("/ { soc { uart { baud = <0x2580>; }; }; };");
        let engine = diff(&base, &overlay);
        let modified = engine.modified_properties();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].path(), "/soc/uart");
        assert_eq!(modified[0].old_value(), Some("0x1c200"));
        assert_eq!(modified[0].new_value(), Some("0x2580"));
    }

    #[test]
    fn different_kinds_are_modified() {
        let mut base = Tree::new("base");
        let mut overlay = Tree::new("overlay");
        base.set_property(base.root(), Property::new("p", PropertyValue::Cells(vec![])).unwrap())
            .unwrap();
        overlay
            .set_property(overlay.root(), Property::new("p", PropertyValue::Bytes(vec![])).unwrap())
            .unwrap();
        let engine = diff(&base, &overlay);
        assert_eq!(engine.modified_property_count(), 1);
    }

    #[test]
    fn identical_trees_have_no_changes() {
        let tree = dts("/ { a = <1 2>; soc { b = [01 02]; }; };");
        let engine = diff(&tree, &tree);
        assert!(engine.entries().is_empty());
        assert!(engine.stats().is_empty());
    }

    #[test]
    fn missing_tree_yields_empty_invalid_diff() {
        let tree = dts("/ { a = \"1\"; };");

        let engine = DiffEngine::new(None, Some(&tree));
        assert!(!engine.is_valid());
        assert!(engine.entries().is_empty());
        assert_eq!(engine.validation_errors(), vec![DiffError::MissingBase]);

        let engine = DiffEngine::new(Some(&tree), None);
        assert_eq!(engine.validation_errors(), vec![DiffError::MissingOverlay]);
        assert_eq!(engine.total_changes(), 0);

        let engine = DiffEngine::new(None, None);
        assert_eq!(engine.validation_errors().len(), 2);

        assert!(diff(&tree, &tree).is_valid());
        assert!(diff(&tree, &tree).validation_errors().is_empty());
    }

    #[test]
    fn entries_are_cached() {
        let base = dts("/ { a = \"1\"; };");
        let overlay = dts("/ { b = \"1\"; };");
        let engine = diff(&base, &overlay);
        let first = engine.entries();
        let second = engine.entries();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn stats_and_filters() {
        let base = dts("/ { model = \"a\"; soc { x = <1>; }; old { }; };");
        let overlay = dts("/ { model = \"b\"; soc { y = <1>; }; fresh { }; };");
        let engine = diff(&base, &overlay);

        assert_eq!(
            engine.stats(),
            DiffStats {
                total_changes: 5,
                added_nodes: 1,
                removed_nodes: 1,
                added_properties: 1,
                removed_properties: 1,
                modified_properties: 1,
            }
        );
        assert_eq!(engine.filter_by_kind(DiffKind::Added).len(), 2);
        assert_eq!(engine.filter_by_path("/soc").len(), 2);
        assert_eq!(engine.filter_by_property("model").len(), 1);
        assert!(engine.filter_by_property("").iter().all(|e| !e.is_node_change()));
        assert_eq!(engine.added_nodes()[0].path(), "/fresh");
    }

    #[test]
    fn entries_serialize_to_json() {
        let base = dts(r#"/ { a = "1"; };"#);
        let overlay = dts(r#"/ { a = "2"; };"#);
        let engine = diff(&base, &overlay);
        let json = serde_json::to_value(engine.entries()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "kind": "modified",
                "path": "/",
                "property_name": "a",
                "old_value": "1",
                "new_value": "2",
                "description": "Property modified: a",
            }])
        );
    }

    fn arb_tree() -> impl Strategy<Value = Tree> {
        let ops = prop::collection::vec(
            (0usize..8, "[a-z]{1,4}", prop::option::of(prop::collection::vec(any::<u32>(), 0..3))),
            0..40,
        );
        ops.prop_map(|ops| {
            let mut tree = Tree::new("random");
            let mut nodes = vec![tree.root()];
            for (pick, name, cells) in ops {
                let parent = nodes[pick % nodes.len()];
                match cells {
                    Some(cells) => {
                        let property = Property::new(name, PropertyValue::Cells(cells)).unwrap();
                        tree.set_property(parent, property).unwrap();
                    }
                    None => nodes.push(tree.add_child(parent, name).unwrap()),
                }
            }
            tree
        })
    }

    proptest! {
        #[test]
        fn self_diff_is_empty(tree in arb_tree()) {
            prop_assert!(diff(&tree, &tree).entries().is_empty());
        }

        #[test]
        fn diff_against_empty_adds_everything(tree in arb_tree()) {
            let empty = Tree::new("empty");
            let engine = diff(&empty, &tree);
            prop_assert!(engine.entries().iter().all(|e| e.kind() == DiffKind::Added));
            prop_assert_eq!(engine.added_property_count() >= tree.root_node().property_count(), true);
        }
    }
}
