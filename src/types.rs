//! Core identifier types shared by the tree, the metadata document and the collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// RemoteId: identifier of a page, database or block in the remote service
pub type RemoteId = String;

/// NodeId: process-local identifier of a tree node.
///
/// Generated once when the node is created and never reused. The all-zero
/// UUID is reserved for the synthetic ROOT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Sentinel id of the synthetic ROOT node
    pub const ROOT: NodeId = NodeId(Uuid::nil());

    /// Generate a fresh id for a non-root node
    pub fn generate() -> Self {
        NodeId(Uuid::new_v4())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for NodeId {
    fn from(value: Uuid) -> Self {
        NodeId(value)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(NodeId)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// StorageHandle: opaque reference returned by a durable store for persisted content
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageHandle(String);

impl StorageHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        StorageHandle(handle.into())
    }

    /// The empty handle carried by ROOT
    pub fn empty() -> Self {
        StorageHandle(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
