//! Metadata Codec
//!
//! Freezes a finished tree into a [`MetadataDocument`] and hands it to the
//! durable store.

use super::{MetadataDocument, ObjectEntry};
use crate::error::EngineError;
use crate::store::{DurableStore, StorageLayout};
use crate::tree::{NodeIndex, NodeKind, Tree};
use std::path::PathBuf;
use tracing::{debug, info};

/// Tree to document encoder
pub struct MetadataCodec;

impl MetadataCodec {
    /// Encode `tree` into a document carrying `layout`.
    ///
    /// The object table holds every reachable node plus ROOT; the adjacency
    /// table has one entry per node with at least one child.
    pub fn encode(tree: &Tree, layout: StorageLayout) -> Result<MetadataDocument, EngineError> {
        let root = tree.root();
        let root_node = tree.root_node();
        if root_node.kind() != NodeKind::Root || !root_node.id().is_root() {
            return Err(EngineError::Validation(format!(
                "Tree root must be the ROOT sentinel, found {} {}",
                root_node.kind(),
                root_node.id()
            )));
        }

        let mut document = MetadataDocument::new(layout);
        for idx in std::iter::once(root).chain(tree.subtree(root)) {
            Self::add_entry(&mut document, tree, idx);
        }

        debug!(
            objects = document.objects.len(),
            parents = document.adjacency.len(),
            "Encoded metadata document"
        );
        Ok(document)
    }

    fn add_entry(document: &mut MetadataDocument, tree: &Tree, idx: NodeIndex) {
        let node = tree.node(idx);
        document.objects.insert(
            node.id(),
            ObjectEntry {
                kind: node.kind().as_str().to_string(),
                remote_object_id: node.remote_object_id().to_string(),
                storage_handle: node.storage_handle().clone(),
            },
        );
        if node.has_child() {
            document.adjacency.insert(node.id(), tree.children_ids(idx));
        }
    }

    /// Encode `tree` with the store's layout and persist the document
    pub fn export<S>(tree: &Tree, store: &S) -> Result<PathBuf, EngineError>
    where
        S: DurableStore + ?Sized,
    {
        let document = Self::encode(tree, store.storage_layout())?;
        let path = store
            .write_metadata(&document)
            .map_err(|e| EngineError::persistence("metadata", e))?;
        info!(path = %path.display(), objects = document.objects.len(), "Exported metadata");
        Ok(path)
    }
}
