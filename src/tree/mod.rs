//! Object Tree
//!
//! In-memory n-ary tree of the backed-up objects. Nodes live in an arena owned
//! by [`Tree`] and are linked through integer handles (parent, first child,
//! next sibling), so nodes discovered out of order can be linked and moved in
//! place without shared mutable references.

pub mod builder;
pub mod iter;
pub mod node;

pub use iter::{AncestorIter, ChildIter, SubtreeIter};
pub use node::{Node, NodeIndex, NodeKind};

use crate::error::TreeError;
use crate::types::NodeId;
use std::collections::HashMap;

/// Arena-backed tree with a single root.
///
/// Detached nodes (inserted but not yet linked) are owned by the tree as
/// well; they are simply unreachable from the root until linked.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    ids: HashMap<NodeId, NodeIndex>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree holding only the synthetic ROOT
    pub fn new() -> Self {
        Self::with_root(Node::root())
    }

    /// Create a tree whose root is an arbitrary node
    pub fn with_root(root: Node) -> Self {
        let mut ids = HashMap::new();
        ids.insert(root.id(), NodeIndex(0));
        Self {
            nodes: vec![root],
            ids,
        }
    }

    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    pub fn root_node(&self) -> &Node {
        &self.nodes[0]
    }

    /// Add a detached node to the arena and return its handle
    pub fn insert(&mut self, node: Node) -> NodeIndex {
        debug_assert!(node.parent.is_none() && node.next_sibling.is_none());
        let idx = NodeIndex(self.nodes.len());
        self.ids.insert(node.id(), idx);
        self.nodes.push(node);
        idx
    }

    /// Get a node by handle.
    ///
    /// Panics if the handle does not belong to this tree.
    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx.0]
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(idx.0)
    }

    /// Look up a node handle by its NodeId
    pub fn find(&self, id: NodeId) -> Option<NodeIndex> {
        self.ids.get(&id).copied()
    }

    /// Number of nodes in the arena, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing is linked under the root
    pub fn is_empty(&self) -> bool {
        !self.has_child(self.root())
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.node(idx).parent
    }

    pub fn has_child(&self, idx: NodeIndex) -> bool {
        self.node(idx).has_child()
    }

    pub fn has_sibling(&self, idx: NodeIndex) -> bool {
        self.node(idx).has_sibling()
    }

    /// Append `child` at the end of `parent`'s sibling chain.
    ///
    /// `child` must be detached.
    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex) {
        debug_assert!(self.nodes[child.0].parent.is_none());
        debug_assert!(self.nodes[child.0].next_sibling.is_none());

        self.nodes[child.0].parent = Some(parent);
        match self.nodes[parent.0].first_child {
            None => self.nodes[parent.0].first_child = Some(child),
            Some(first) => {
                let mut last = first;
                while let Some(next) = self.nodes[last.0].next_sibling {
                    last = next;
                }
                self.nodes[last.0].next_sibling = Some(child);
            }
        }
    }

    /// Unlink the first immediate child of `parent` whose id is `id`.
    ///
    /// The removed node keeps its own children but loses its parent and
    /// sibling links. Returns `None` when no immediate child matches.
    pub fn delete_child(&mut self, parent: NodeIndex, id: NodeId) -> Option<NodeIndex> {
        let first = self.nodes[parent.0].first_child?;

        let removed = if self.nodes[first.0].id() == id {
            self.nodes[parent.0].first_child = self.nodes[first.0].next_sibling;
            first
        } else {
            let mut prev = first;
            loop {
                let next = self.nodes[prev.0].next_sibling?;
                if self.nodes[next.0].id() == id {
                    self.nodes[prev.0].next_sibling = self.nodes[next.0].next_sibling;
                    break next;
                }
                prev = next;
            }
        };

        let node = &mut self.nodes[removed.0];
        node.parent = None;
        node.next_sibling = None;
        Some(removed)
    }

    /// Whether `idx` is linked directly under the tree's root
    pub fn is_attached_to_root(&self, idx: NodeIndex) -> bool {
        self.parent(idx) == Some(self.root())
    }

    /// Move a provisionally root-attached node under its true parent.
    ///
    /// Fails if `node` is not currently a direct child of ROOT, or if
    /// `new_parent` lies inside `node`'s own subtree.
    pub fn reattach_from_root(
        &mut self,
        node: NodeIndex,
        new_parent: NodeIndex,
    ) -> Result<(), TreeError> {
        let node_id = self.node(node).id();
        if !self.is_attached_to_root(node) || self.root_node().kind() != NodeKind::Root {
            return Err(TreeError::NotRootAttached { node: node_id });
        }
        if self.ancestors(new_parent).any(|ancestor| ancestor == node) {
            return Err(TreeError::WouldCreateCycle {
                node: node_id,
                new_parent: self.node(new_parent).id(),
            });
        }

        let root = self.root();
        self.delete_child(root, node_id)
            .ok_or(TreeError::NodeNotFound(node_id))?;
        self.add_child(new_parent, node);
        Ok(())
    }

    /// Iterate the immediate children of `idx` in sibling order
    pub fn children(&self, idx: NodeIndex) -> ChildIter<'_> {
        ChildIter::new(self, Some(idx))
    }

    /// Iterate from `idx` up to the topmost ancestor, inclusive of `idx`
    pub fn ancestors(&self, idx: NodeIndex) -> AncestorIter<'_> {
        AncestorIter::new(self, Some(idx))
    }

    /// Breadth-first iteration over the subtree of `idx` (ROOT itself is never yielded)
    pub fn subtree(&self, idx: NodeIndex) -> SubtreeIter<'_> {
        SubtreeIter::new(self, Some(idx))
    }

    /// NodeIds of the immediate children of `idx`, in sibling order
    pub fn children_ids(&self, idx: NodeIndex) -> Vec<NodeId> {
        self.children(idx).map(|child| self.node(child).id()).collect()
    }

    /// Number of nodes reachable from the root, excluding a ROOT node itself
    pub fn reachable_count(&self) -> usize {
        self.subtree(self.root()).count()
    }
}
