//! Tree node types

use crate::types::{NodeId, RemoteId, StorageHandle};
use std::fmt;
use std::str::FromStr;

/// Handle of a node inside its owning [`Tree`](super::Tree) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

/// Kind of object a node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Page,
    Database,
    Block,
}

impl NodeKind {
    /// Wire name used in the metadata document
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Root => "ROOT",
            NodeKind::Page => "PAGE",
            NodeKind::Database => "DATABASE",
            NodeKind::Block => "BLOCK",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROOT" => Ok(NodeKind::Root),
            "PAGE" => Ok(NodeKind::Page),
            "DATABASE" => Ok(NodeKind::Database),
            "BLOCK" => Ok(NodeKind::Block),
            other => Err(format!("unknown node kind: {}", other)),
        }
    }
}

/// A vertex of the ownership tree.
///
/// Children form a singly linked sibling chain starting at `first_child`;
/// insertion order is preserved and is meaningful (it is the rendering
/// order of pages and blocks). Only the link fields ever change after
/// creation.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    remote_object_id: RemoteId,
    storage_handle: StorageHandle,
    pub(crate) parent: Option<NodeIndex>,
    pub(crate) first_child: Option<NodeIndex>,
    pub(crate) next_sibling: Option<NodeIndex>,
}

impl Node {
    /// Create a detached node with a freshly generated id
    pub fn new(kind: NodeKind, remote_object_id: RemoteId, storage_handle: StorageHandle) -> Self {
        Self::with_id(NodeId::generate(), kind, remote_object_id, storage_handle)
    }

    /// Create a detached node with a known id (used when decoding a metadata document)
    pub fn with_id(
        id: NodeId,
        kind: NodeKind,
        remote_object_id: RemoteId,
        storage_handle: StorageHandle,
    ) -> Self {
        Self {
            id,
            kind,
            remote_object_id,
            storage_handle,
            parent: None,
            first_child: None,
            next_sibling: None,
        }
    }

    pub(crate) fn root() -> Self {
        Self::with_id(
            NodeId::ROOT,
            NodeKind::Root,
            String::new(),
            StorageHandle::empty(),
        )
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn remote_object_id(&self) -> &str {
        &self.remote_object_id
    }

    pub fn storage_handle(&self) -> &StorageHandle {
        &self.storage_handle
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeIndex> {
        self.first_child
    }

    pub fn next_sibling(&self) -> Option<NodeIndex> {
        self.next_sibling
    }

    pub fn has_child(&self) -> bool {
        self.first_child.is_some()
    }

    pub fn has_sibling(&self) -> bool {
        self.next_sibling.is_some()
    }
}
