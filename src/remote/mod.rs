//! Content Service
//!
//! Contract for the remote hierarchical store the engine backs up from and
//! restores into, plus the HTTP client implementing it.

pub mod model;
pub mod notion;

pub use model::{
    Block, Database, DatabaseCreateRequest, Listing, Page, PageCreateRequest, Parent,
};
pub use notion::NotionClient;

use crate::error::ServiceError;
use crate::types::RemoteId;
use async_trait::async_trait;
use serde_json::Value;

/// Remote content service.
///
/// Listings are cursor paginated: a `None` cursor starts from the
/// beginning, a `None` `next_cursor` in the response ends the listing.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// All pages the integration can see
    async fn list_pages(&self, cursor: Option<String>) -> Result<Listing<Page>, ServiceError>;

    /// All databases the integration can see
    async fn list_databases(
        &self,
        cursor: Option<String>,
    ) -> Result<Listing<Database>, ServiceError>;

    async fn get_page(&self, id: &str) -> Result<Page, ServiceError>;

    async fn get_database(&self, id: &str) -> Result<Database, ServiceError>;

    async fn get_block(&self, id: &str) -> Result<Block, ServiceError>;

    /// Direct block children of a page or block
    async fn list_block_children(
        &self,
        parent_id: &str,
        cursor: Option<String>,
    ) -> Result<Listing<Block>, ServiceError>;

    /// Member pages of a database
    async fn query_database(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<Listing<Page>, ServiceError>;

    async fn create_page(&self, request: &PageCreateRequest) -> Result<Page, ServiceError>;

    async fn create_database(
        &self,
        request: &DatabaseCreateRequest,
    ) -> Result<Database, ServiceError>;

    /// Append blocks to a page or block; the created blocks come back in
    /// request order
    async fn append_block_children(
        &self,
        parent_id: &str,
        children: Vec<Value>,
    ) -> Result<Vec<Block>, ServiceError>;
}

/// Drain a block-children listing across all cursors
pub async fn all_block_children<S>(
    service: &S,
    parent_id: &str,
) -> Result<Vec<Block>, ServiceError>
where
    S: ContentService + ?Sized,
{
    let mut blocks = Vec::new();
    let mut cursor = None;
    loop {
        let listing = service
            .list_block_children(parent_id, cursor.take())
            .await?;
        blocks.extend(listing.results);
        match listing.next_cursor {
            Some(next) => cursor = Some(next),
            None => return Ok(blocks),
        }
    }
}

/// Remote id a parent reference points at, if it is not the workspace
pub fn parent_remote_id(parent: &Parent) -> Option<&RemoteId> {
    match parent {
        Parent::Workspace { .. } => None,
        Parent::PageId { page_id } => Some(page_id),
        Parent::DatabaseId { database_id } => Some(database_id),
        Parent::BlockId { block_id } => Some(block_id),
    }
}
