//! Importer
//!
//! Replays a rebuilt tree against the content service, creating new objects
//! under a destination page and translating every old remote id into the id
//! the service assigned.
//!
//! Containers are processed strictly in FIFO order starting at ROOT, so a
//! node's owner has always been created before the node itself. Plain
//! blocks are batched into append calls; a page or database met among a
//! container's children closes the current batch and is created directly,
//! which also makes the service add the link block in the right position.
//! Nothing is rolled back on failure.

pub mod translation;

pub use translation::{IdTranslation, ObjectClass};

use crate::error::EngineError;
use crate::remote::model::embed_children;
use crate::remote::{
    all_block_children, Block, ContentService, DatabaseCreateRequest, PageCreateRequest, Parent,
};
use crate::store::DurableStore;
use crate::tree::{Node, NodeIndex, NodeKind, Tree};
use crate::types::RemoteId;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Largest number of blocks sent in one append call
pub const MAX_APPEND_BATCH: usize = 100;

/// Counts of what an import created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub pages: usize,
    pub databases: usize,
    pub blocks: usize,
    pub append_calls: usize,
    pub skipped_blocks: usize,
}

/// A block waiting in the current append batch
struct PendingBlock {
    old_id: RemoteId,
    payload: Value,
    /// Old ids of children embedded in the payload, in order
    nested: Vec<RemoteId>,
}

pub struct Importer<'a, C: ?Sized, S: ?Sized> {
    service: &'a C,
    store: &'a S,
    tree: &'a Tree,
    destination_page: RemoteId,
    translation: IdTranslation,
    queue: VecDeque<NodeIndex>,
    report: ImportReport,
}

impl<'a, C, S> Importer<'a, C, S>
where
    C: ContentService + ?Sized,
    S: DurableStore + ?Sized,
{
    /// Importer replaying `tree` under the page `destination_page`
    pub fn new(
        service: &'a C,
        store: &'a S,
        tree: &'a Tree,
        destination_page: impl Into<RemoteId>,
    ) -> Self {
        Self {
            service,
            store,
            tree,
            destination_page: destination_page.into(),
            translation: IdTranslation::new(),
            queue: VecDeque::new(),
            report: ImportReport::default(),
        }
    }

    pub fn translation(&self) -> &IdTranslation {
        &self.translation
    }

    /// Replay the whole tree
    pub async fn run(&mut self) -> Result<ImportReport, EngineError> {
        let tree = self.tree;
        let root = tree.root();
        if tree.node(root).kind() != NodeKind::Root {
            return Err(EngineError::Validation(
                "Tree to import is not rooted at ROOT".to_string(),
            ));
        }

        info!(
            destination = %self.destination_page,
            nodes = tree.reachable_count(),
            "Starting import"
        );
        self.queue.push_back(root);
        while let Some(idx) = self.queue.pop_front() {
            let node = tree.node(idx);
            debug!(node_id = %node.id(), kind = %node.kind(), "Processing container");
            match node.kind() {
                NodeKind::Root => self.process_root(idx).await?,
                NodeKind::Database => self.process_database(idx).await?,
                NodeKind::Page => {
                    let new_id = self
                        .translation
                        .lookup(ObjectClass::Page, node.remote_object_id())?
                        .clone();
                    self.process_children(idx, &new_id).await?;
                }
                NodeKind::Block => {
                    let new_id = self
                        .translation
                        .lookup(ObjectClass::Block, node.remote_object_id())?
                        .clone();
                    self.process_children(idx, &new_id).await?;
                }
            }
        }

        info!(
            pages = self.report.pages,
            databases = self.report.databases,
            blocks = self.report.blocks,
            append_calls = self.report.append_calls,
            "Import finished"
        );
        Ok(self.report.clone())
    }

    async fn process_root(&mut self, root: NodeIndex) -> Result<(), EngineError> {
        let tree = self.tree;
        for child in tree.children(root) {
            match tree.node(child).kind() {
                NodeKind::Page => self.create_page(child).await?,
                NodeKind::Database => self.create_database(child).await?,
                kind => {
                    return Err(EngineError::Structural(format!(
                        "{} node {} directly under ROOT",
                        kind,
                        tree.node(child).id()
                    )))
                }
            }
        }
        Ok(())
    }

    async fn process_database(&mut self, database: NodeIndex) -> Result<(), EngineError> {
        let tree = self.tree;
        for child in tree.children(database) {
            let node = tree.node(child);
            if node.kind() != NodeKind::Page {
                return Err(EngineError::Structural(format!(
                    "{} node {} inside database {}",
                    node.kind(),
                    node.id(),
                    tree.node(database).remote_object_id()
                )));
            }
            self.create_page(child).await?;
        }
        Ok(())
    }

    /// Children of a page or block, appended under `parent_id`
    async fn process_children(
        &mut self,
        container: NodeIndex,
        parent_id: &str,
    ) -> Result<(), EngineError> {
        let tree = self.tree;
        let mut batch = Vec::new();
        for child in tree.children(container) {
            match tree.node(child).kind() {
                NodeKind::Page => {
                    self.flush(parent_id, &mut batch).await?;
                    self.create_page(child).await?;
                }
                NodeKind::Database => {
                    self.flush(parent_id, &mut batch).await?;
                    self.create_database(child).await?;
                }
                NodeKind::Block => {
                    if let Some(pending) = self.prepare_block(child)? {
                        batch.push(pending);
                        if batch.len() >= MAX_APPEND_BATCH {
                            self.flush(parent_id, &mut batch).await?;
                        }
                    }
                }
                NodeKind::Root => {
                    return Err(EngineError::Structural(
                        "ROOT found below another node".to_string(),
                    ))
                }
            }
        }
        self.flush(parent_id, &mut batch).await
    }

    /// Creation payload for a block node, or `None` when it is skipped.
    ///
    /// Multi-column and table containers carry their children inline; any
    /// other block with children is queued to be processed once created.
    fn prepare_block(&mut self, idx: NodeIndex) -> Result<Option<PendingBlock>, EngineError> {
        let tree = self.tree;
        let node = tree.node(idx);
        let block = self.read_block(node)?;
        if self.skip(&block) {
            return Ok(None);
        }

        let mut payload = block.to_payload();
        let mut nested = Vec::new();
        if block.embeds_children() {
            let mut children = Vec::new();
            for inner_idx in tree.children(idx) {
                let inner_node = tree.node(inner_idx);
                if inner_node.kind() != NodeKind::Block {
                    return Err(EngineError::Structural(format!(
                        "{} node {} inside {} block {}",
                        inner_node.kind(),
                        inner_node.id(),
                        block.block_type,
                        block.id
                    )));
                }
                let inner = self.read_block(inner_node)?;
                if self.skip(&inner) {
                    continue;
                }
                children.push(inner.to_payload());
                nested.push(inner_node.remote_object_id().to_string());
                if tree.has_child(inner_idx) {
                    self.queue.push_back(inner_idx);
                }
            }
            embed_children(&mut payload, &block.block_type, children);
        } else if tree.has_child(idx) {
            self.queue.push_back(idx);
        }

        Ok(Some(PendingBlock {
            old_id: node.remote_object_id().to_string(),
            payload,
            nested,
        }))
    }

    fn skip(&mut self, block: &Block) -> bool {
        if block.is_unsupported() {
            warn!(remote_id = %block.id, "Skipping unsupported block");
        } else if block.is_structural() {
            warn!(remote_id = %block.id, block_type = %block.block_type, "Skipping stored link block");
        } else {
            return false;
        }
        self.report.skipped_blocks += 1;
        true
    }

    /// Append the pending batch and record the ids assigned to it
    async fn flush(
        &mut self,
        parent_id: &str,
        batch: &mut Vec<PendingBlock>,
    ) -> Result<(), EngineError> {
        if batch.is_empty() {
            return Ok(());
        }
        let (submitted, payloads): (Vec<_>, Vec<_>) = std::mem::take(batch)
            .into_iter()
            .map(|pending| ((pending.old_id, pending.nested), pending.payload))
            .unzip();

        debug!(parent = %parent_id, count = payloads.len(), "Appending blocks");
        let created = self
            .service
            .append_block_children(parent_id, payloads)
            .await
            .map_err(|e| EngineError::discovery(parent_id, "append blocks", e))?;
        self.report.append_calls += 1;

        if created.len() != submitted.len() {
            return Err(EngineError::Validation(format!(
                "Append under {} returned {} blocks for {} submitted",
                parent_id,
                created.len(),
                submitted.len()
            )));
        }

        for ((old_id, nested), new_block) in submitted.into_iter().zip(created) {
            self.translation
                .record(ObjectClass::Block, old_id, new_block.id.clone());
            self.report.blocks += 1;
            if !nested.is_empty() {
                self.map_nested(&new_block.id, nested).await?;
            }
        }
        Ok(())
    }

    /// Map ids of children created inline with their container
    async fn map_nested(&mut self, new_id: &str, nested: Vec<RemoteId>) -> Result<(), EngineError> {
        let created = all_block_children(self.service, new_id)
            .await
            .map_err(|e| EngineError::discovery(new_id, "list created children", e))?;
        if created.len() != nested.len() {
            return Err(EngineError::Validation(format!(
                "Container {} has {} children after creation, expected {}",
                new_id,
                created.len(),
                nested.len()
            )));
        }
        for (old_id, new_block) in nested.into_iter().zip(created) {
            self.translation
                .record(ObjectClass::Block, old_id, new_block.id);
            self.report.blocks += 1;
        }
        Ok(())
    }

    async fn create_page(&mut self, idx: NodeIndex) -> Result<(), EngineError> {
        let node = self.tree.node(idx);
        let page = self
            .store
            .read_page(node.storage_handle())
            .map_err(|e| EngineError::persistence(node.remote_object_id(), e))?;
        let parent = self.resolve_parent(idx, &page.parent)?;
        let request = PageCreateRequest::from_page(&page, parent);

        let created = self
            .service
            .create_page(&request)
            .await
            .map_err(|e| EngineError::discovery(node.remote_object_id(), "create page", e))?;
        debug!(old = %node.remote_object_id(), new = %created.id, "Created page");
        self.translation
            .record(ObjectClass::Page, node.remote_object_id(), created.id);
        self.report.pages += 1;
        self.queue.push_back(idx);
        Ok(())
    }

    async fn create_database(&mut self, idx: NodeIndex) -> Result<(), EngineError> {
        let node = self.tree.node(idx);
        let database = self
            .store
            .read_database(node.storage_handle())
            .map_err(|e| EngineError::persistence(node.remote_object_id(), e))?;
        let parent = self.resolve_parent(idx, &database.parent)?;
        let request = DatabaseCreateRequest::from_database(&database, parent);

        let created = self
            .service
            .create_database(&request)
            .await
            .map_err(|e| EngineError::discovery(node.remote_object_id(), "create database", e))?;
        debug!(old = %node.remote_object_id(), new = %created.id, "Created database");
        self.translation
            .record(ObjectClass::Database, node.remote_object_id(), created.id);
        self.report.databases += 1;
        self.queue.push_back(idx);
        Ok(())
    }

    /// Objects directly under ROOT go under the destination page; anything
    /// else goes under the translated owner it was stored with
    fn resolve_parent(&self, idx: NodeIndex, stored: &Parent) -> Result<Parent, EngineError> {
        if self.tree.is_attached_to_root(idx) {
            return Ok(Parent::page(self.destination_page.clone()));
        }
        self.translation.resolve_parent(stored)
    }

    fn read_block(&self, node: &Node) -> Result<Block, EngineError> {
        self.store
            .read_block(node.storage_handle())
            .map_err(|e| EngineError::persistence(node.remote_object_id(), e))
    }
}
