//! In-memory content service and durable store used by the integration tests

use async_trait::async_trait;
use notionbackup::error::{ServiceError, StorageError};
use notionbackup::metadata::MetadataDocument;
use notionbackup::remote::{
    parent_remote_id, Block, ContentService, Database, DatabaseCreateRequest, Listing, Page,
    PageCreateRequest, Parent,
};
use notionbackup::store::{ContentCategory, DurableStore, StorageLayout};
use notionbackup::types::StorageHandle;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Text carried by a block, page or database created by the fakes
pub fn plain_text(value: &Value) -> Option<String> {
    value
        .as_array()?
        .first()?
        .get("plain_text")?
        .as_str()
        .map(str::to_string)
}

pub fn page_title(page: &Page) -> Option<String> {
    plain_text(page.field("properties")?.get("title")?.get("title")?)
}

pub fn database_title(database: &Database) -> Option<String> {
    plain_text(database.field("title")?)
}

pub fn block_text(block: &Block) -> Option<String> {
    plain_text(block.fields.get(&block.block_type)?.get("rich_text")?)
}

fn rich_text(text: &str) -> Value {
    json!([{ "type": "text", "plain_text": text, "text": { "content": text } }])
}

#[derive(Default)]
struct ServiceState {
    pages: Vec<Page>,
    databases: Vec<Database>,
    children: HashMap<String, Vec<Block>>,
    members: HashMap<String, Vec<String>>,
    calls: Vec<String>,
    failing: HashSet<String>,
    next_id: usize,
}

impl ServiceState {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check(&self, id: &str) -> Result<(), ServiceError> {
        if self.failing.contains(id) {
            return Err(ServiceError::Api {
                status: 500,
                code: "internal_server_error".to_string(),
                message: format!("injected failure for {}", id),
            });
        }
        Ok(())
    }

    fn mark_has_children(&mut self, id: &str) {
        for blocks in self.children.values_mut() {
            if let Some(block) = blocks.iter_mut().find(|b| b.id == id) {
                block.has_children = true;
            }
        }
    }

    fn push_child(&mut self, parent: &str, block: Block) {
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(block);
        self.mark_has_children(parent);
    }

    fn link_page(&mut self, page: &Page, title: &str) {
        match &page.parent {
            Parent::DatabaseId { database_id } => {
                self.members
                    .entry(database_id.clone())
                    .or_default()
                    .push(page.id.clone());
            }
            parent => {
                if let Some(owner) = parent_remote_id(parent).cloned() {
                    let mut link = Block::new(page.id.clone(), "child_page");
                    link.fields
                        .insert("child_page".to_string(), json!({ "title": title }));
                    self.push_child(&owner, link);
                }
            }
        }
    }

    fn link_database(&mut self, database: &Database, title: &str) {
        if let Some(owner) = parent_remote_id(&database.parent).cloned() {
            let mut link = Block::new(database.id.clone(), "child_database");
            link.fields
                .insert("child_database".to_string(), json!({ "title": title }));
            self.push_child(&owner, link);
        }
    }

    /// Create a block from a creation payload, embedded children included
    fn create_block(&mut self, parent: &str, payload: &Value) -> Block {
        let block_type = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("paragraph")
            .to_string();
        let mut body = payload
            .get(&block_type)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let nested = body
            .as_object_mut()
            .and_then(|b| b.remove("children"))
            .and_then(|c| c.as_array().cloned())
            .unwrap_or_default();

        let id = self.fresh_id("new-block");
        let mut block = Block::new(id.clone(), block_type.clone());
        block.fields.insert(block_type, body);
        self.push_child(parent, block.clone());
        for child in &nested {
            self.create_block(&id, child);
        }
        block.has_children = !nested.is_empty();
        block
    }
}

fn paginate<T: Clone>(items: &[T], cursor: Option<String>, page_size: usize) -> Listing<T> {
    let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
    let end = (start + page_size).min(items.len());
    let results = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    Listing {
        results,
        next_cursor: (end < items.len()).then(|| end.to_string()),
    }
}

/// Content service backed by in-memory maps.
///
/// Listings are served in pages of two so cursor handling is always
/// exercised. Creating a page or database under a page or block adds the
/// matching link block to the owner, like the real service does.
pub struct FakeService {
    state: Mutex<ServiceState>,
    page_size: usize,
}

impl Default for FakeService {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServiceState::default()),
            page_size: 2,
        }
    }

    pub fn add_page(&self, id: &str, parent: Parent, title: &str) {
        let mut page = Page::new(id, parent);
        page.fields.insert("object".to_string(), json!("page"));
        page.fields.insert(
            "properties".to_string(),
            json!({ "title": { "id": "title", "type": "title", "title": rich_text(title) } }),
        );
        page.fields
            .insert("created_time".to_string(), json!("2024-01-01T00:00:00.000Z"));
        let mut state = self.state.lock();
        state.link_page(&page, title);
        state.pages.push(page);
    }

    pub fn add_database(&self, id: &str, parent: Parent, title: &str) {
        let mut database = Database::new(id, parent);
        database
            .fields
            .insert("object".to_string(), json!("database"));
        database
            .fields
            .insert("title".to_string(), rich_text(title));
        database.fields.insert(
            "properties".to_string(),
            json!({ "Name": { "id": "title", "type": "title", "title": {} } }),
        );
        let mut state = self.state.lock();
        state.link_database(&database, title);
        state.databases.push(database);
    }

    pub fn add_block(&self, parent: &str, id: &str, block_type: &str, text: &str) {
        let mut block = Block::new(id, block_type);
        block
            .fields
            .insert(block_type.to_string(), json!({ "rich_text": rich_text(text) }));
        block
            .fields
            .insert("created_time".to_string(), json!("2024-01-01T00:00:00.000Z"));
        self.state.lock().push_child(parent, block);
    }

    /// Make every call touching `id` fail
    pub fn fail_on(&self, id: &str) {
        self.state.lock().failing.insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn page(&self, id: &str) -> Option<Page> {
        self.state.lock().pages.iter().find(|p| p.id == id).cloned()
    }

    pub fn database(&self, id: &str) -> Option<Database> {
        self.state
            .lock()
            .databases
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    pub fn children_of(&self, id: &str) -> Vec<Block> {
        self.state
            .lock()
            .children
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn members_of(&self, database_id: &str) -> Vec<String> {
        self.state
            .lock()
            .members
            .get(database_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn page_count(&self) -> usize {
        self.state.lock().pages.len()
    }

    pub fn database_count(&self) -> usize {
        self.state.lock().databases.len()
    }

    /// Nested outline of everything under `id`: one line per object, two
    /// spaces of indent per level, link blocks resolved to their target
    pub fn outline(&self, id: &str) -> Vec<String> {
        let mut lines = Vec::new();
        self.outline_into(id, 0, &mut lines);
        lines
    }

    fn outline_into(&self, id: &str, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        if let Some(database) = self.database(id) {
            for member in self.members_of(&database.id) {
                let page = self.page(&member);
                let title = page.as_ref().and_then(page_title).unwrap_or_default();
                lines.push(format!("{}page:{}", indent, title));
                self.outline_into(&member, depth + 1, lines);
            }
            return;
        }
        for block in self.children_of(id) {
            if block.is_child_page() {
                let title = self.page(&block.id).as_ref().and_then(page_title);
                lines.push(format!("{}page:{}", indent, title.unwrap_or_default()));
            } else if block.is_child_database() {
                let title = self.database(&block.id).as_ref().and_then(database_title);
                lines.push(format!("{}database:{}", indent, title.unwrap_or_default()));
            } else {
                let text = block_text(&block).unwrap_or_default();
                lines.push(format!("{}{}:{}", indent, block.block_type, text));
            }
            self.outline_into(&block.id, depth + 1, lines);
        }
    }

    fn log(&self, call: String) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl ContentService for FakeService {
    async fn list_pages(&self, cursor: Option<String>) -> Result<Listing<Page>, ServiceError> {
        self.log("list_pages".to_string());
        let state = self.state.lock();
        Ok(paginate(&state.pages, cursor, self.page_size))
    }

    async fn list_databases(
        &self,
        cursor: Option<String>,
    ) -> Result<Listing<Database>, ServiceError> {
        self.log("list_databases".to_string());
        let state = self.state.lock();
        Ok(paginate(&state.databases, cursor, self.page_size))
    }

    async fn get_page(&self, id: &str) -> Result<Page, ServiceError> {
        self.log(format!("get_page {}", id));
        let state = self.state.lock();
        state.check(id)?;
        state
            .pages
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    async fn get_database(&self, id: &str) -> Result<Database, ServiceError> {
        self.log(format!("get_database {}", id));
        let state = self.state.lock();
        state.check(id)?;
        state
            .databases
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    async fn get_block(&self, id: &str) -> Result<Block, ServiceError> {
        self.log(format!("get_block {}", id));
        let state = self.state.lock();
        state.check(id)?;
        state
            .children
            .values()
            .flatten()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    async fn list_block_children(
        &self,
        parent_id: &str,
        cursor: Option<String>,
    ) -> Result<Listing<Block>, ServiceError> {
        self.log(format!("list_block_children {}", parent_id));
        let state = self.state.lock();
        state.check(parent_id)?;
        let blocks = state.children.get(parent_id).cloned().unwrap_or_default();
        Ok(paginate(&blocks, cursor, self.page_size))
    }

    async fn query_database(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<Listing<Page>, ServiceError> {
        self.log(format!("query_database {}", database_id));
        let state = self.state.lock();
        state.check(database_id)?;
        let pages: Vec<Page> = state
            .members
            .get(database_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.pages.iter().find(|p| &p.id == id).cloned())
            .collect();
        Ok(paginate(&pages, cursor, self.page_size))
    }

    async fn create_page(&self, request: &PageCreateRequest) -> Result<Page, ServiceError> {
        let parent = parent_remote_id(&request.parent)
            .cloned()
            .unwrap_or_else(|| "workspace".to_string());
        self.log(format!("create_page {}", parent));
        let mut state = self.state.lock();
        state.check(&parent)?;

        let id = state.fresh_id("new-page");
        let mut page = Page::new(id, request.parent.clone());
        page.fields
            .insert("properties".to_string(), request.properties.clone());
        let title = page_title(&page).unwrap_or_default();
        state.link_page(&page, &title);
        state.pages.push(page.clone());
        Ok(page)
    }

    async fn create_database(
        &self,
        request: &DatabaseCreateRequest,
    ) -> Result<Database, ServiceError> {
        let parent = parent_remote_id(&request.parent)
            .cloned()
            .unwrap_or_else(|| "workspace".to_string());
        self.log(format!("create_database {}", parent));
        let mut state = self.state.lock();
        state.check(&parent)?;

        let id = state.fresh_id("new-database");
        let mut database = Database::new(id, request.parent.clone());
        database
            .fields
            .insert("title".to_string(), request.title.clone());
        database
            .fields
            .insert("properties".to_string(), request.properties.clone());
        let title = database_title(&database).unwrap_or_default();
        state.link_database(&database, &title);
        state.databases.push(database.clone());
        Ok(database)
    }

    async fn append_block_children(
        &self,
        parent_id: &str,
        children: Vec<Value>,
    ) -> Result<Vec<Block>, ServiceError> {
        self.log(format!("append {} {}", parent_id, children.len()));
        let mut state = self.state.lock();
        state.check(parent_id)?;
        Ok(children
            .iter()
            .map(|payload| state.create_block(parent_id, payload))
            .collect())
    }
}

#[derive(Default)]
struct StoreState {
    content: HashMap<String, String>,
    metadata: Vec<MetadataDocument>,
    cleanups: usize,
    fail_metadata: bool,
}

/// Durable store keeping serialized content in memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_metadata_writes(&self) {
        self.state.lock().fail_metadata = true;
    }

    pub fn content_count(&self) -> usize {
        self.state.lock().content.len()
    }

    pub fn cleanups(&self) -> usize {
        self.state.lock().cleanups
    }

    pub fn last_metadata(&self) -> Option<MetadataDocument> {
        self.state.lock().metadata.last().cloned()
    }

    fn write<T: serde::Serialize>(
        &self,
        category: ContentCategory,
        id: &str,
        value: &T,
    ) -> Result<StorageHandle, StorageError> {
        let handle = format!("{}/{}", category.dir_name(), id);
        let text = serde_json::to_string(value)?;
        self.state.lock().content.insert(handle.clone(), text);
        Ok(StorageHandle::new(handle))
    }

    fn read<T: serde::de::DeserializeOwned>(
        &self,
        category: ContentCategory,
        handle: &StorageHandle,
    ) -> Result<T, StorageError> {
        if !handle.as_str().starts_with(category.dir_name()) {
            return Err(StorageError::InvalidLayout(handle.to_string()));
        }
        let state = self.state.lock();
        let text = state
            .content
            .get(handle.as_str())
            .ok_or_else(|| StorageError::NotFound(handle.to_string()))?;
        Ok(serde_json::from_str(text)?)
    }
}

impl DurableStore for MemoryStore {
    fn write_page(&self, page: &Page) -> Result<StorageHandle, StorageError> {
        self.write(ContentCategory::Page, &page.id, page)
    }

    fn write_database(&self, database: &Database) -> Result<StorageHandle, StorageError> {
        self.write(ContentCategory::Database, &database.id, database)
    }

    fn write_block(&self, block: &Block) -> Result<StorageHandle, StorageError> {
        self.write(ContentCategory::Block, &block.id, block)
    }

    fn read_page(&self, handle: &StorageHandle) -> Result<Page, StorageError> {
        self.read(ContentCategory::Page, handle)
    }

    fn read_database(&self, handle: &StorageHandle) -> Result<Database, StorageError> {
        self.read(ContentCategory::Database, handle)
    }

    fn read_block(&self, handle: &StorageHandle) -> Result<Block, StorageError> {
        self.read(ContentCategory::Block, handle)
    }

    fn storage_layout(&self) -> StorageLayout {
        StorageLayout::local()
    }

    fn write_metadata(&self, document: &MetadataDocument) -> Result<PathBuf, StorageError> {
        let mut state = self.state.lock();
        if state.fail_metadata {
            return Err(StorageError::Serialization(
                "injected metadata failure".to_string(),
            ));
        }
        state.metadata.push(document.clone());
        Ok(PathBuf::from(format!("memory/metadata_{}.bin", state.metadata.len())))
    }

    fn cleanup(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        state.content.clear();
        state.cleanups += 1;
        Ok(())
    }
}
