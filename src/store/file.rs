//! Local directory store
//!
//! Layout under the base directory:
//!
//! ```text
//! <base>/pages/<uuid>.json
//! <base>/databases/<uuid>.json
//! <base>/blocks/<uuid>.json
//! <base>/metadata_<timestamp>.bin
//! ```
//!
//! Storage handles are paths relative to the base directory, so a backup
//! directory can be moved as a whole. Content files are made read-only.

use super::{ContentCategory, DurableStore, StorageLayout};
use crate::error::StorageError;
use crate::metadata::MetadataDocument;
use crate::remote::{Block, Database, Page};
use crate::types::StorageHandle;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Permission bits of persisted content files (owner read-only)
#[cfg(unix)]
const FILE_MODE: u32 = 0o400;

/// Store writing objects as JSON files under a base directory
pub struct FileStore {
    base_dir: PathBuf,
    layout: StorageLayout,
    written: Mutex<Vec<PathBuf>>,
}

impl FileStore {
    /// Open a store for writing a new backup.
    ///
    /// Fails when `base_dir` does not exist and `create_if_missing` is false.
    /// Category directories are created as needed.
    pub fn create(base_dir: impl Into<PathBuf>, create_if_missing: bool) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        if !base_dir.is_dir() {
            if !create_if_missing {
                return Err(StorageError::NotFound(format!(
                    "Backup directory does not exist: {}",
                    base_dir.display()
                )));
            }
            std::fs::create_dir_all(&base_dir).map_err(|e| StorageError::io(&base_dir, e))?;
        }

        let layout = StorageLayout::local();
        for location in layout.categories.values() {
            let dir = base_dir.join(location);
            std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        }

        info!(base_dir = %base_dir.display(), "Opened backup directory");
        Ok(Self {
            base_dir,
            layout,
            written: Mutex::new(Vec::new()),
        })
    }

    /// Open the backup a metadata file belongs to.
    ///
    /// The base directory is the metadata file's parent; every location named
    /// by the document's storage layout must exist under it.
    pub fn open_from_metadata(
        metadata_path: &Path,
    ) -> Result<(Self, MetadataDocument), StorageError> {
        let bytes = std::fs::read(metadata_path).map_err(|e| StorageError::io(metadata_path, e))?;
        let document = MetadataDocument::from_bytes(&bytes)?;

        let layout = document.storage_layout.clone();
        if layout.backend != "local" {
            return Err(StorageError::InvalidLayout(format!(
                "Unsupported storage backend '{}'",
                layout.backend
            )));
        }

        let base_dir = metadata_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        for category in ContentCategory::ALL {
            let location = layout.location(category).ok_or_else(|| {
                StorageError::InvalidLayout(format!("No location recorded for {}", category))
            })?;
            let dir = base_dir.join(location);
            if !dir.is_dir() {
                return Err(StorageError::InvalidLayout(format!(
                    "Missing {} directory: {}",
                    category,
                    dir.display()
                )));
            }
        }

        debug!(
            metadata = %metadata_path.display(),
            objects = document.objects.len(),
            "Opened backup from metadata"
        );
        Ok((
            Self {
                base_dir,
                layout,
                written: Mutex::new(Vec::new()),
            },
            document,
        ))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn location(&self, category: ContentCategory) -> Result<&str, StorageError> {
        self.layout
            .location(category)
            .ok_or_else(|| StorageError::InvalidLayout(format!("No location for {}", category)))
    }

    fn write_json<T: Serialize>(
        &self,
        category: ContentCategory,
        value: &T,
    ) -> Result<StorageHandle, StorageError> {
        let bytes = serde_json::to_vec(value)?;
        let relative = Path::new(self.location(category)?).join(format!("{}.json", Uuid::new_v4()));
        let path = self.base_dir.join(&relative);
        write_read_only(&path, &bytes)?;
        self.written.lock().push(path);
        Ok(StorageHandle::new(relative.to_string_lossy()))
    }

    fn read_json<T: DeserializeOwned>(
        &self,
        category: ContentCategory,
        handle: &StorageHandle,
    ) -> Result<T, StorageError> {
        let relative = Path::new(handle.as_str());
        let location = self.location(category)?;
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidLayout(format!(
                "Handle {} escapes the backup directory",
                handle
            )));
        }
        if !relative.starts_with(location) {
            return Err(StorageError::InvalidLayout(format!(
                "Handle {} is not a {} handle",
                handle, category
            )));
        }
        let path = self.base_dir.join(relative);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(handle.to_string()))
            }
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn write_read_only(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    std::fs::write(path, bytes).map_err(|e| StorageError::io(path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_MODE))
            .map_err(|e| StorageError::io(path, e))?;
    }
    Ok(())
}

impl DurableStore for FileStore {
    fn write_page(&self, page: &Page) -> Result<StorageHandle, StorageError> {
        self.write_json(ContentCategory::Page, page)
    }

    fn write_database(&self, database: &Database) -> Result<StorageHandle, StorageError> {
        self.write_json(ContentCategory::Database, database)
    }

    fn write_block(&self, block: &Block) -> Result<StorageHandle, StorageError> {
        self.write_json(ContentCategory::Block, block)
    }

    fn read_page(&self, handle: &StorageHandle) -> Result<Page, StorageError> {
        self.read_json(ContentCategory::Page, handle)
    }

    fn read_database(&self, handle: &StorageHandle) -> Result<Database, StorageError> {
        self.read_json(ContentCategory::Database, handle)
    }

    fn read_block(&self, handle: &StorageHandle) -> Result<Block, StorageError> {
        self.read_json(ContentCategory::Block, handle)
    }

    fn storage_layout(&self) -> StorageLayout {
        self.layout.clone()
    }

    fn write_metadata(&self, document: &MetadataDocument) -> Result<PathBuf, StorageError> {
        let bytes = document.to_bytes()?;
        let name = format!(
            "metadata_{}.bin",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        );
        let path = self.base_dir.join(name);
        write_read_only(&path, &bytes)?;
        self.written.lock().push(path.clone());
        info!(path = %path.display(), objects = document.objects.len(), "Wrote metadata");
        Ok(path)
    }

    fn cleanup(&self) -> Result<(), StorageError> {
        let paths: Vec<PathBuf> = std::mem::take(&mut *self.written.lock());
        let total = paths.len();
        let mut first_error = None;
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove backup file");
                    if first_error.is_none() {
                        first_error = Some(StorageError::io(&path, e));
                    }
                }
            }
        }
        info!(files = total, "Cleaned up backup files");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
