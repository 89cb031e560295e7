//! Durable Store
//!
//! Persists the content of backed-up objects and the metadata document.
//! Content is addressed by the opaque [`StorageHandle`] returned on write.

pub mod file;

pub use file::FileStore;

use crate::error::StorageError;
use crate::metadata::MetadataDocument;
use crate::remote::{Block, Database, Page};
use crate::types::StorageHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Class of persisted content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentCategory {
    Page,
    Database,
    Block,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 3] = [
        ContentCategory::Page,
        ContentCategory::Database,
        ContentCategory::Block,
    ];

    /// Default location name used by the local backend
    pub fn dir_name(&self) -> &'static str {
        match self {
            ContentCategory::Page => "pages",
            ContentCategory::Database => "databases",
            ContentCategory::Block => "blocks",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Storage layout descriptor embedded in the metadata document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLayout {
    pub backend: String,
    pub categories: BTreeMap<ContentCategory, String>,
}

impl StorageLayout {
    /// Layout of a local directory store with the default category names
    pub fn local() -> Self {
        Self {
            backend: "local".to_string(),
            categories: ContentCategory::ALL
                .iter()
                .map(|c| (*c, c.dir_name().to_string()))
                .collect(),
        }
    }

    pub fn location(&self, category: ContentCategory) -> Option<&str> {
        self.categories.get(&category).map(|s| s.as_str())
    }
}

/// Durable store contract.
///
/// Calls are synchronous; a store instance belongs to one export or import
/// at a time.
pub trait DurableStore: Send + Sync {
    fn write_page(&self, page: &Page) -> Result<StorageHandle, StorageError>;

    fn write_database(&self, database: &Database) -> Result<StorageHandle, StorageError>;

    fn write_block(&self, block: &Block) -> Result<StorageHandle, StorageError>;

    fn read_page(&self, handle: &StorageHandle) -> Result<Page, StorageError>;

    fn read_database(&self, handle: &StorageHandle) -> Result<Database, StorageError>;

    fn read_block(&self, handle: &StorageHandle) -> Result<Block, StorageError>;

    /// Category to location mapping for the metadata document
    fn storage_layout(&self) -> StorageLayout;

    /// Persist the metadata document and return where it was written
    fn write_metadata(&self, document: &MetadataDocument) -> Result<PathBuf, StorageError>;

    /// Remove everything written through this store so far
    fn cleanup(&self) -> Result<(), StorageError>;
}
