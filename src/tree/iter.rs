//! Tree traversal iterators
//!
//! All three iterators are single pass and borrow the tree immutably. Each
//! accepts an optional starting handle; `None` yields an exhausted iterator.

use super::{NodeIndex, NodeKind, Tree};
use std::collections::VecDeque;

/// Immediate children of a node, in sibling order
pub struct ChildIter<'a> {
    tree: &'a Tree,
    next: Option<NodeIndex>,
}

impl<'a> ChildIter<'a> {
    pub fn new(tree: &'a Tree, start: Option<NodeIndex>) -> Self {
        let next = start
            .and_then(|idx| tree.get(idx))
            .and_then(|node| node.first_child());
        Self { tree, next }
    }
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let current = self.next?;
        self.next = self.tree.node(current).next_sibling();
        Some(current)
    }
}

/// The starting node followed by each of its ancestors up to the top
pub struct AncestorIter<'a> {
    tree: &'a Tree,
    next: Option<NodeIndex>,
}

impl<'a> AncestorIter<'a> {
    pub fn new(tree: &'a Tree, start: Option<NodeIndex>) -> Self {
        let next = start.filter(|idx| tree.get(*idx).is_some());
        Self { tree, next }
    }
}

impl<'a> Iterator for AncestorIter<'a> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let current = self.next?;
        self.next = self.tree.node(current).parent();
        Some(current)
    }
}

/// Level-order walk of a subtree.
///
/// Starting at a ROOT node seeds the queue with ROOT's children, so ROOT is
/// never yielded; any other start node is yielded first.
pub struct SubtreeIter<'a> {
    tree: &'a Tree,
    queue: VecDeque<NodeIndex>,
}

impl<'a> SubtreeIter<'a> {
    pub fn new(tree: &'a Tree, start: Option<NodeIndex>) -> Self {
        let mut queue = VecDeque::new();
        if let Some((idx, node)) = start.and_then(|idx| tree.get(idx).map(|node| (idx, node))) {
            if node.kind() == NodeKind::Root {
                queue.extend(ChildIter::new(tree, Some(idx)));
            } else {
                queue.push_back(idx);
            }
        }
        Self { tree, queue }
    }
}

impl<'a> Iterator for SubtreeIter<'a> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let current = self.queue.pop_front()?;
        self.queue.extend(ChildIter::new(self.tree, Some(current)));
        Some(current)
    }
}
