//! Backup and restore entry points
//!
//! Wire the builders, the metadata codec and the importer together for one
//! complete operation each.

use crate::error::EngineError;
use crate::importer::{ImportReport, Importer};
use crate::metadata::{MetadataCodec, MetadataDocument};
use crate::remote::ContentService;
use crate::store::DurableStore;
use crate::tree::builder::{ExportRequest, ExportTreeBuilder, MetadataTreeBuilder};
use crate::types::RemoteId;
use std::path::PathBuf;
use tracing::{info, warn};

/// Outcome of a successful backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub metadata_path: PathBuf,
    /// Objects in the tree, ROOT excluded
    pub node_count: usize,
}

/// Discover, persist and freeze the objects selected by `request`.
///
/// Any failure, including writing the metadata document, removes what was
/// persisted for this backup.
pub async fn run_backup<C, S>(
    service: &C,
    store: &S,
    request: ExportRequest,
) -> Result<BackupReport, EngineError>
where
    C: ContentService + ?Sized,
    S: DurableStore + ?Sized,
{
    let mut builder = ExportTreeBuilder::new(service, store, request);
    let tree = builder.build().await?;
    let node_count = tree.reachable_count();

    match MetadataCodec::export(tree, store) {
        Ok(metadata_path) => {
            info!(path = %metadata_path.display(), nodes = node_count, "Backup complete");
            Ok(BackupReport {
                metadata_path,
                node_count,
            })
        }
        Err(err) => {
            warn!(error = %err, "Writing metadata failed, removing persisted content");
            if let Err(cleanup_err) = store.cleanup() {
                warn!(error = %cleanup_err, "Cleanup after failed backup failed");
            }
            Err(err)
        }
    }
}

/// Rebuild the tree frozen in `document` and recreate it under `destination_page`
pub async fn run_restore<C, S>(
    service: &C,
    store: &S,
    document: &MetadataDocument,
    destination_page: impl Into<RemoteId>,
) -> Result<ImportReport, EngineError>
where
    C: ContentService + ?Sized,
    S: DurableStore + ?Sized,
{
    let tree = MetadataTreeBuilder::new(document).build()?;
    let mut importer = Importer::new(service, store, &tree, destination_page);
    importer.run().await
}
