//! Portable Metadata Document
//!
//! Frozen form of a tree: an object table, an adjacency table holding each
//! parent's children in sibling order, and the storage layout the store
//! used. Encoded with bincode.

pub mod codec;

pub use codec::MetadataCodec;

use crate::error::StorageError;
use crate::store::StorageLayout;
use crate::types::{NodeId, RemoteId, StorageHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current document format version
pub const FORMAT_VERSION: u32 = 1;

/// One row of the object table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Wire name of the node kind (ROOT, PAGE, DATABASE, BLOCK)
    pub kind: String,
    pub remote_object_id: RemoteId,
    pub storage_handle: StorageHandle,
}

/// The portable metadata document.
///
/// Built once at export time; read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub format_version: u32,
    pub objects: BTreeMap<NodeId, ObjectEntry>,
    /// Parent id to its children's ids, in sibling order
    pub adjacency: BTreeMap<NodeId, Vec<NodeId>>,
    pub storage_layout: StorageLayout,
}

impl MetadataDocument {
    pub fn new(storage_layout: StorageLayout) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            objects: BTreeMap::new(),
            adjacency: BTreeMap::new(),
            storage_layout,
        }
    }

    /// Serialize to the binary on-disk form
    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from the binary on-disk form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let document: MetadataDocument = bincode::deserialize(bytes)?;
        if document.format_version != FORMAT_VERSION {
            return Err(StorageError::Serialization(format!(
                "Unsupported metadata format version {} (expected {})",
                document.format_version, FORMAT_VERSION
            )));
        }
        Ok(document)
    }

    /// Children of `parent` in sibling order; empty for leaves
    pub fn children_of(&self, parent: &NodeId) -> &[NodeId] {
        self.adjacency
            .get(parent)
            .map(|children| children.as_slice())
            .unwrap_or(&[])
    }
}
