//! Metadata Tree Builder
//!
//! Rebuilds a tree from a portable metadata document without touching the
//! network. Every entry is staged and validated before the tree is linked,
//! and no partially linked tree escapes on failure.

use crate::error::EngineError;
use crate::metadata::MetadataDocument;
use crate::tree::{Node, NodeKind, Tree};
use crate::types::NodeId;
use tracing::debug;

pub struct MetadataTreeBuilder<'a> {
    document: &'a MetadataDocument,
}

impl<'a> MetadataTreeBuilder<'a> {
    pub fn new(document: &'a MetadataDocument) -> Self {
        Self { document }
    }

    /// Reconstruct the tree described by the document.
    ///
    /// Fails with a validation error on an unknown kind, a malformed ROOT
    /// entry, an adjacency reference missing from the object table, a node
    /// listed under more than one parent, or a node unreachable from ROOT.
    pub fn build(&self) -> Result<Tree, EngineError> {
        let staged = self.stage_nodes()?;

        let mut tree = Tree::new();
        for node in staged {
            tree.insert(node);
        }

        for (parent_id, children) in &self.document.adjacency {
            let parent = tree.find(*parent_id).ok_or_else(|| {
                EngineError::Validation(format!(
                    "Adjacency parent {} is not in the object table",
                    parent_id
                ))
            })?;
            for child_id in children {
                if child_id.is_root() {
                    return Err(EngineError::Validation(format!(
                        "ROOT listed as a child of {}",
                        parent_id
                    )));
                }
                let child = tree.find(*child_id).ok_or_else(|| {
                    EngineError::Validation(format!(
                        "Child {} of {} is not in the object table",
                        child_id, parent_id
                    ))
                })?;
                if tree.parent(child).is_some() {
                    return Err(EngineError::Validation(format!(
                        "Node {} is listed under more than one parent",
                        child_id
                    )));
                }
                tree.add_child(parent, child);
            }
        }

        let reachable = tree.reachable_count();
        let expected = tree.len() - 1;
        if reachable != expected {
            return Err(EngineError::Validation(format!(
                "{} of {} nodes are not reachable from ROOT",
                expected - reachable,
                expected
            )));
        }

        debug!(nodes = expected, "Rebuilt tree from metadata");
        Ok(tree)
    }

    /// Phase one: one bare node per object-table entry, ROOT excluded
    fn stage_nodes(&self) -> Result<Vec<Node>, EngineError> {
        let mut staged = Vec::with_capacity(self.document.objects.len());
        let mut saw_root = false;

        for (id, entry) in &self.document.objects {
            let kind: NodeKind = entry
                .kind
                .parse()
                .map_err(|e: String| EngineError::Validation(format!("Object {}: {}", id, e)))?;

            if kind == NodeKind::Root || id.is_root() {
                if kind != NodeKind::Root {
                    return Err(EngineError::Validation(format!(
                        "Sentinel id carries kind {}",
                        kind
                    )));
                }
                if !id.is_root() {
                    return Err(EngineError::Validation(format!(
                        "ROOT entry has non-sentinel id {}",
                        id
                    )));
                }
                if !entry.remote_object_id.is_empty() || !entry.storage_handle.is_empty() {
                    return Err(EngineError::Validation(
                        "ROOT entry must have empty remote id and storage handle".to_string(),
                    ));
                }
                saw_root = true;
                continue;
            }

            staged.push(Node::with_id(
                *id,
                kind,
                entry.remote_object_id.clone(),
                entry.storage_handle.clone(),
            ));
        }

        if !saw_root {
            return Err(EngineError::Validation(format!(
                "No ROOT entry with id {}",
                NodeId::ROOT
            )));
        }
        Ok(staged)
    }
}
