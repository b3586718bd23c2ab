/// The output tree produced by applying an input trace to a machine.
pub mod output_tree;

use crate::trace::IOListContainer;
use crate::Symbol;

/// Dense index of a tree node.
pub type NodeId = u32;

#[derive(Debug, Clone)]
struct TreeNode {
    parent: Option<(NodeId, Symbol)>,
    children: Vec<(Symbol, NodeId)>,
    deleted: bool,
}

/// An arena-backed prefix tree over symbol sequences. Every node knows its
/// parent, so paths can be reconstructed from any node; the arena layout
/// keeps the structure acyclic by construction.
///
/// Removal never frees nodes, it only flags them; flagged leaves are
/// excluded from [`Tree::test_cases`]. This is what lets the transition
/// cover subtract the state cover while keeping the shared prefixes
/// intact.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    /// The root node, present in every tree.
    pub const ROOT: NodeId = 0;

    /// Creates a tree holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode {
                parent: None,
                children: Vec::new(),
                deleted: false,
            }],
        }
    }

    /// Number of nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True iff the tree holds nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// The child of `node` along `symbol`, if present.
    pub fn child(&self, node: NodeId, symbol: Symbol) -> Option<NodeId> {
        self.nodes[node as usize]
            .children
            .iter()
            .find(|&&(s, _)| s == symbol)
            .map(|&(_, id)| id)
    }

    /// The child of `node` along `symbol`, created if missing.
    pub fn ensure_child(&mut self, node: NodeId, symbol: Symbol) -> NodeId {
        if let Some(existing) = self.child(node, symbol) {
            return existing;
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(TreeNode {
            parent: Some((node, symbol)),
            children: Vec::new(),
            deleted: false,
        });
        self.nodes[node as usize].children.push((symbol, id));
        id
    }

    /// Iterates over the labelled children of `node` in insertion order.
    pub fn children(&self, node: NodeId) -> impl Iterator<Item = (Symbol, NodeId)> + '_ {
        self.nodes[node as usize].children.iter().copied()
    }

    /// True iff `node` has no children.
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.nodes[node as usize].children.is_empty()
    }

    /// True iff `node` carries the deleted flag.
    pub fn is_deleted(&self, node: NodeId) -> bool {
        self.nodes[node as usize].deleted
    }

    /// The root-to-node symbol path, reconstructed through the parent links.
    pub fn path_to(&self, node: NodeId) -> Vec<Symbol> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some((parent, symbol)) = self.nodes[current as usize].parent {
            path.push(symbol);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Iterates over all node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len() as NodeId
    }

    /// Inserts `sequence` below `node`, sharing the longest existing prefix.
    /// Returns the node the sequence ends at.
    pub fn insert_at(&mut self, node: NodeId, sequence: &[Symbol]) -> NodeId {
        let mut current = node;
        for &symbol in sequence {
            current = self.ensure_child(current, symbol);
        }
        current
    }

    /// Inserts `sequence` at the root.
    pub fn add(&mut self, sequence: &[Symbol]) {
        self.insert_at(Self::ROOT, sequence);
    }

    /// Unions the container's sequences at *every* node that existed before
    /// the call. This realises concatenation on path sets: afterwards the
    /// tree contains `p · s` for every old node path `p` and every sequence
    /// `s` of the container.
    pub fn add_container(&mut self, container: &IOListContainer) {
        let existing = self.nodes.len() as NodeId;
        for node in 0..existing {
            for list in container.lists() {
                self.insert_at(node, list);
            }
        }
    }

    /// Adds every root-to-leaf path of `other` at the root. The donor is
    /// never mutated; shared content is copied.
    pub fn union_tree(&mut self, other: &Tree) {
        for path in other.test_case_paths() {
            self.add(&path);
        }
    }

    /// Deletes every path that is also present in `other` by flagging the
    /// nodes met in a lock-step walk of the two trees. Nodes are not freed.
    pub fn remove(&mut self, other: &Tree) {
        let mut stack = vec![(Self::ROOT, Self::ROOT)];
        while let Some((this_node, other_node)) = stack.pop() {
            self.nodes[this_node as usize].deleted = true;
            for (symbol, other_child) in other.children(other_node) {
                if let Some(this_child) = self.child(this_node, symbol) {
                    stack.push((this_child, other_child));
                }
            }
        }
    }

    /// Iterates over all leaves in insertion order, deleted ones included.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_ids().filter(|&id| self.is_leaf(id))
    }

    fn test_case_paths(&self) -> Vec<Vec<Symbol>> {
        self.leaves()
            .filter(|&id| !self.is_deleted(id))
            .map(|id| self.path_to(id))
            .collect()
    }

    /// One sequence per non-deleted leaf, in insertion order.
    pub fn test_cases(&self) -> IOListContainer {
        let paths = self.test_case_paths();
        let max_symbol = paths
            .iter()
            .flatten()
            .copied()
            .max()
            .unwrap_or(0);
        IOListContainer::new(paths, max_symbol)
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

fn subtree_eq(a: &Tree, na: NodeId, b: &Tree, nb: NodeId) -> bool {
    if a.is_deleted(na) != b.is_deleted(nb) {
        return false;
    }
    if a.nodes[na as usize].children.len() != b.nodes[nb as usize].children.len() {
        return false;
    }
    a.children(na).all(|(symbol, ca)| match b.child(nb, symbol) {
        Some(cb) => subtree_eq(a, ca, b, cb),
        None => false,
    })
}

impl PartialEq for Tree {
    /// Structural isomorphism: matching edge labels and deleted flags,
    /// insertion order of siblings being irrelevant.
    fn eq(&self, other: &Self) -> bool {
        subtree_eq(self, Self::ROOT, other, Self::ROOT)
    }
}
impl Eq for Tree {}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(paths: &[&[Symbol]]) -> Tree {
        let mut tree = Tree::new();
        for path in paths {
            tree.add(path);
        }
        tree
    }

    #[test]
    fn add_shares_prefixes() {
        let tree = tree_of(&[&[0, 1], &[0, 2], &[0, 1]]);
        // root, 0, 01, 02
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.test_cases().lists(), &[vec![0, 1], vec![0, 2]]);
    }

    #[test]
    fn equality_ignores_sibling_order() {
        let a = tree_of(&[&[0], &[1]]);
        let b = tree_of(&[&[1], &[0]]);
        assert_eq!(a, b);
        let c = tree_of(&[&[0], &[1], &[1, 0]]);
        assert_ne!(a, c);
    }

    #[test]
    fn add_container_concatenates_at_every_node() {
        let mut tree = tree_of(&[&[0, 0]]);
        let container = IOListContainer::new(vec![vec![1]], 1);
        tree.add_container(&container);
        let mut cases = tree.test_cases().lists().to_vec();
        cases.sort();
        // ε·1, 0·1, 00·1 — the original leaf 00 persists as prefix of 001
        assert_eq!(cases, vec![vec![0, 0, 1], vec![0, 1], vec![1]]);
    }

    #[test]
    fn union_is_idempotent() {
        let mut tree = tree_of(&[&[0, 1], &[1]]);
        let copy = tree.clone();
        tree.union_tree(&copy);
        assert_eq!(tree, copy);
    }

    #[test]
    fn remove_self_empties_the_test_cases() {
        let mut tree = tree_of(&[&[0, 1], &[1, 0, 1]]);
        let copy = tree.clone();
        tree.remove(&copy);
        assert!(tree.test_cases().is_empty());
        // nodes survive, only flagged
        assert_eq!(tree.len(), copy.len());
        assert_ne!(tree, copy);
    }

    #[test]
    fn remove_keeps_proper_extensions() {
        // transition-cover-style difference: remove all paths of the
        // shorter tree, keep the one-symbol extensions
        let mut extended = tree_of(&[&[0], &[0, 0], &[0, 1], &[1]]);
        let cover = tree_of(&[&[0]]);
        extended.remove(&cover);
        let mut cases = extended.test_cases().lists().to_vec();
        cases.sort();
        assert_eq!(cases, vec![vec![0, 0], vec![0, 1], vec![1]]);
    }

    #[test]
    fn deleted_leaves_are_skipped_until_extended() {
        let mut tree = tree_of(&[&[0]]);
        let copy = tree.clone();
        tree.remove(&copy);
        assert!(tree.test_cases().is_empty());
        // extending below a deleted leaf resurrects the branch
        tree.add(&[0, 1]);
        assert_eq!(tree.test_cases().lists(), &[vec![0, 1]]);
    }

    #[test]
    fn paths_follow_parent_links() {
        let mut tree = Tree::new();
        let end = tree.insert_at(Tree::ROOT, &[2, 0, 1]);
        assert_eq!(tree.path_to(end), vec![2, 0, 1]);
        assert_eq!(tree.path_to(Tree::ROOT), Vec::<Symbol>::new());
    }
}
