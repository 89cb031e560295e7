//! Export Tree Builder
//!
//! Discovers remote objects, persists their content through the durable
//! store and links them into one tree, either for the whole workspace or for
//! an explicit set of page and database ids.
//!
//! Discovery is a LIFO drain of pending containers. Every page and database
//! materialized in a run is recorded by remote id, so an object met a second
//! time is never duplicated: a node still provisionally attached under ROOT
//! is moved under the container that turned out to own it, a node already
//! placed deeper is left where it is.

use crate::error::EngineError;
use crate::remote::{ContentService, Database, Page};
use crate::store::DurableStore;
use crate::tree::{Node, NodeIndex, NodeKind, Tree};
use crate::types::RemoteId;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// What to back up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportRequest {
    /// Every page and database the service exposes
    Workspace,
    /// The listed pages and databases with everything beneath them
    Objects {
        page_ids: Vec<RemoteId>,
        database_ids: Vec<RemoteId>,
    },
}

impl ExportRequest {
    pub fn objects(page_ids: Vec<RemoteId>, database_ids: Vec<RemoteId>) -> Self {
        ExportRequest::Objects {
            page_ids,
            database_ids,
        }
    }
}

/// Builds the tree for one export request.
///
/// The finished tree is kept, so calling [`build`](Self::build) again
/// returns it without any further discovery. A failed build leaves nothing
/// cached and can be retried.
pub struct ExportTreeBuilder<'a, C: ?Sized, S: ?Sized> {
    service: &'a C,
    store: &'a S,
    request: ExportRequest,
    tree: Option<Tree>,
}

impl<'a, C, S> ExportTreeBuilder<'a, C, S>
where
    C: ContentService + ?Sized,
    S: DurableStore + ?Sized,
{
    pub fn new(service: &'a C, store: &'a S, request: ExportRequest) -> Self {
        Self {
            service,
            store,
            request,
            tree: None,
        }
    }

    /// Build the tree, or return the one built by an earlier call.
    ///
    /// On failure everything persisted during this call is removed through
    /// the store's cleanup before the original error is returned.
    pub async fn build(&mut self) -> Result<&Tree, EngineError> {
        let tree = match self.tree.take() {
            Some(tree) => {
                debug!("Returning cached export tree");
                tree
            }
            None => match self.discover().await {
                Ok(tree) => tree,
                Err(err) => {
                    warn!(error = %err, "Export failed, removing persisted content");
                    if let Err(cleanup_err) = self.store.cleanup() {
                        warn!(error = %cleanup_err, "Cleanup after failed export failed");
                    }
                    return Err(err);
                }
            },
        };
        let tree: &Tree = self.tree.insert(tree);
        Ok(tree)
    }

    /// The finished tree, if a build has succeeded
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn into_tree(self) -> Option<Tree> {
        self.tree
    }

    async fn discover(&self) -> Result<Tree, EngineError> {
        let mut run = Discovery::new(self.service, self.store);
        match &self.request {
            ExportRequest::Workspace => {
                info!("Discovering whole workspace");
                run.seed_workspace().await?;
            }
            ExportRequest::Objects {
                page_ids,
                database_ids,
            } => {
                let page_ids = dedup(page_ids);
                let database_ids = dedup(database_ids);
                if page_ids.is_empty() && database_ids.is_empty() {
                    return Err(EngineError::Validation(
                        "No page or database ids requested".to_string(),
                    ));
                }
                info!(
                    pages = page_ids.len(),
                    databases = database_ids.len(),
                    "Discovering requested objects"
                );
                run.seed_objects(&page_ids, &database_ids).await?;
            }
        }
        run.drain().await?;
        run.attach_orphans().await?;

        let tree = run.tree;
        info!(nodes = tree.reachable_count(), "Export tree built");
        Ok(tree)
    }
}

/// Ids in first-seen order without repeats
fn dedup(ids: &[RemoteId]) -> Vec<RemoteId> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Object already fetched as part of a listing
enum Fetched {
    Page(Page),
    Database(Database),
}

/// State of one discovery run
struct Discovery<'a, C: ?Sized, S: ?Sized> {
    service: &'a C,
    store: &'a S,
    tree: Tree,
    /// Every page and database materialized in this run
    discovered: HashMap<RemoteId, NodeIndex>,
    /// Workspace mode: nodes created from the listings but not yet linked
    unplaced: Vec<NodeIndex>,
    /// Workspace mode: member page ids per database id, in listing order
    database_pages: HashMap<RemoteId, Vec<RemoteId>>,
    pending: Vec<NodeIndex>,
}

impl<'a, C, S> Discovery<'a, C, S>
where
    C: ContentService + ?Sized,
    S: DurableStore + ?Sized,
{
    fn new(service: &'a C, store: &'a S) -> Self {
        Self {
            service,
            store,
            tree: Tree::new(),
            discovered: HashMap::new(),
            unplaced: Vec::new(),
            database_pages: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// List every page and database; workspace-level objects go under ROOT,
    /// the rest wait for their owner to be expanded.
    async fn seed_workspace(&mut self) -> Result<(), EngineError> {
        let mut cursor = None;
        loop {
            let listing = self
                .service
                .list_pages(cursor.take())
                .await
                .map_err(|e| EngineError::discovery("workspace", "list pages", e))?;
            for page in listing.results {
                if self.discovered.contains_key(&page.id) {
                    continue;
                }
                let at_workspace = page.parent.is_workspace();
                let database = page.parent.database_id().map(str::to_string);
                let page_id = page.id.clone();
                let idx = self.materialize(NodeKind::Page, &page_id, Some(Fetched::Page(page))).await?;
                if at_workspace {
                    let root = self.tree.root();
                    self.attach(root, idx);
                } else {
                    if let Some(database) = database {
                        self.database_pages.entry(database).or_default().push(page_id);
                    }
                    self.unplaced.push(idx);
                }
            }
            match listing.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let mut cursor = None;
        loop {
            let listing = self
                .service
                .list_databases(cursor.take())
                .await
                .map_err(|e| EngineError::discovery("workspace", "list databases", e))?;
            for database in listing.results {
                if self.discovered.contains_key(&database.id) {
                    continue;
                }
                let at_workspace = database.parent.is_workspace();
                let database_id = database.id.clone();
                let idx = self
                    .materialize(NodeKind::Database, &database_id, Some(Fetched::Database(database)))
                    .await?;
                if at_workspace {
                    let root = self.tree.root();
                    self.attach(root, idx);
                } else {
                    self.unplaced.push(idx);
                }
            }
            match listing.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(
            top_level = self.pending.len(),
            cached = self.unplaced.len(),
            "Workspace listings done"
        );
        Ok(())
    }

    /// Attach every requested object under ROOT before expanding any of them
    async fn seed_objects(
        &mut self,
        page_ids: &[RemoteId],
        database_ids: &[RemoteId],
    ) -> Result<(), EngineError> {
        let root = self.tree.root();
        for id in page_ids {
            self.place(root, NodeKind::Page, id, None).await?;
        }
        for id in database_ids {
            self.place(root, NodeKind::Database, id, None).await?;
        }
        Ok(())
    }

    async fn drain(&mut self) -> Result<(), EngineError> {
        while let Some(idx) = self.pending.pop() {
            let node = self.tree.node(idx);
            let kind = node.kind();
            let remote_id = node.remote_object_id().to_string();
            debug!(node_id = %node.id(), remote_id = %remote_id, kind = %kind, "Expanding");
            match kind {
                NodeKind::Page | NodeKind::Block => self.expand_blocks(idx, &remote_id).await?,
                NodeKind::Database => self.expand_database(idx, &remote_id).await?,
                NodeKind::Root => {}
            }
        }
        Ok(())
    }

    /// Link listed objects whose owner was never reached (not shared, or
    /// outside the listings) under ROOT so their content is kept
    async fn attach_orphans(&mut self) -> Result<(), EngineError> {
        let orphans: Vec<NodeIndex> = std::mem::take(&mut self.unplaced)
            .into_iter()
            .filter(|idx| self.tree.parent(*idx).is_none())
            .collect();
        if orphans.is_empty() {
            return Ok(());
        }
        info!(count = orphans.len(), "Attaching objects with unreachable owners under ROOT");
        let root = self.tree.root();
        for idx in orphans {
            self.attach(root, idx);
        }
        self.drain().await
    }

    async fn expand_blocks(&mut self, parent: NodeIndex, remote_id: &str) -> Result<(), EngineError> {
        let mut cursor = None;
        loop {
            let listing = self
                .service
                .list_block_children(remote_id, cursor.take())
                .await
                .map_err(|e| EngineError::discovery(remote_id, "list block children", e))?;
            for block in listing.results {
                if block.is_child_page() {
                    self.place(parent, NodeKind::Page, &block.id, None).await?;
                } else if block.is_child_database() {
                    self.place(parent, NodeKind::Database, &block.id, None).await?;
                } else {
                    let handle = self
                        .store
                        .write_block(&block)
                        .map_err(|e| EngineError::persistence(block.id.as_str(), e))?;
                    let idx = self
                        .tree
                        .insert(Node::new(NodeKind::Block, block.id.clone(), handle));
                    self.tree.add_child(parent, idx);
                    if block.has_children {
                        self.pending.push(idx);
                    }
                }
            }
            match listing.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(()),
            }
        }
    }

    async fn expand_database(
        &mut self,
        parent: NodeIndex,
        database_id: &str,
    ) -> Result<(), EngineError> {
        if let Some(page_ids) = self.database_pages.remove(database_id) {
            debug!(remote_id = %database_id, pages = page_ids.len(), "Using cached database pages");
            for page_id in page_ids {
                self.place(parent, NodeKind::Page, &page_id, None).await?;
            }
            return Ok(());
        }

        let mut cursor = None;
        loop {
            let listing = self
                .service
                .query_database(database_id, cursor.take())
                .await
                .map_err(|e| EngineError::discovery(database_id, "query database", e))?;
            for page in listing.results {
                let page_id = page.id.clone();
                self.place(parent, NodeKind::Page, &page_id, Some(Fetched::Page(page)))
                    .await?;
            }
            match listing.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(()),
            }
        }
    }

    /// Put the page or database `remote_id` under `parent`, creating it on
    /// first sight and restructuring when it was only provisionally placed
    async fn place(
        &mut self,
        parent: NodeIndex,
        kind: NodeKind,
        remote_id: &str,
        prefetched: Option<Fetched>,
    ) -> Result<(), EngineError> {
        let Some(idx) = self.discovered.get(remote_id).copied() else {
            let idx = self.materialize(kind, remote_id, prefetched).await?;
            self.attach(parent, idx);
            return Ok(());
        };

        let root = self.tree.root();
        match self.tree.parent(idx) {
            None => self.attach(parent, idx),
            Some(current) if current == root && parent != root => {
                self.tree.reattach_from_root(idx, parent)?;
                debug!(
                    node_id = %self.tree.node(idx).id(),
                    remote_id = %remote_id,
                    "Moved node from ROOT under its owner"
                );
            }
            Some(_) => {
                debug!(remote_id = %remote_id, "Already placed, keeping existing position");
            }
        }
        Ok(())
    }

    fn attach(&mut self, parent: NodeIndex, idx: NodeIndex) {
        self.tree.add_child(parent, idx);
        self.pending.push(idx);
    }

    /// Fetch (unless already fetched), persist and register a page or database
    async fn materialize(
        &mut self,
        kind: NodeKind,
        remote_id: &str,
        prefetched: Option<Fetched>,
    ) -> Result<NodeIndex, EngineError> {
        let handle = match kind {
            NodeKind::Page => {
                let page = match prefetched {
                    Some(Fetched::Page(page)) => page,
                    _ => self
                        .service
                        .get_page(remote_id)
                        .await
                        .map_err(|e| EngineError::discovery(remote_id, "fetch page", e))?,
                };
                self.store
                    .write_page(&page)
                    .map_err(|e| EngineError::persistence(remote_id, e))?
            }
            NodeKind::Database => {
                let database = match prefetched {
                    Some(Fetched::Database(database)) => database,
                    _ => self
                        .service
                        .get_database(remote_id)
                        .await
                        .map_err(|e| EngineError::discovery(remote_id, "fetch database", e))?,
                };
                self.store
                    .write_database(&database)
                    .map_err(|e| EngineError::persistence(remote_id, e))?
            }
            NodeKind::Block | NodeKind::Root => {
                return Err(EngineError::Structural(format!(
                    "Cannot materialize {} {} as a container",
                    kind, remote_id
                )))
            }
        };

        let idx = self
            .tree
            .insert(Node::new(kind, remote_id.to_string(), handle));
        self.discovered.insert(remote_id.to_string(), idx);
        debug!(
            node_id = %self.tree.node(idx).id(),
            remote_id = %remote_id,
            kind = %kind,
            "Materialized"
        );
        Ok(idx)
    }
}
