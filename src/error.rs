//! Error types for every layer of the backup engine.

use crate::types::{NodeId, RemoteId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by node linking and restructuring
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node {node} cannot be moved: it is not attached directly under ROOT")]
    NotRootAttached { node: NodeId },

    #[error("Moving node {node} under {new_parent} would create a cycle")]
    WouldCreateCycle { node: NodeId, new_parent: NodeId },
}

/// Errors raised by a durable store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Invalid storage layout: {0}")]
    InvalidLayout(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors raised by the remote content service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Object not found: {0}")]
    NotFound(RemoteId),
}

/// Top-level error for export and import operations.
///
/// Every variant aborts the running operation; the ids carried in the
/// variants identify the object and phase that failed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to {phase} for {object_id}: {source}")]
    Discovery {
        object_id: RemoteId,
        phase: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("Failed to persist or read {object_id}: {source}")]
    Persistence {
        object_id: String,
        #[source]
        source: StorageError,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Restructuring failed: {0}")]
    Restructuring(#[from] TreeError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn discovery(
        object_id: impl Into<RemoteId>,
        phase: &'static str,
        source: ServiceError,
    ) -> Self {
        EngineError::Discovery {
            object_id: object_id.into(),
            phase,
            source,
        }
    }

    pub(crate) fn persistence(object_id: impl Into<String>, source: StorageError) -> Self {
        EngineError::Persistence {
            object_id: object_id.into(),
            source,
        }
    }
}
