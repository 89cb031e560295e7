//! Wire model for remote objects.
//!
//! Pages, databases and blocks are kept as thin typed envelopes around the
//! JSON the service returns: the fields the engine needs are typed, the rest
//! is carried verbatim in `fields` so content round-trips untouched.

use crate::types::RemoteId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Block type of the link block the service synthesizes for a sub-page
pub const BLOCK_TYPE_CHILD_PAGE: &str = "child_page";
/// Block type of the link block the service synthesizes for a sub-database
pub const BLOCK_TYPE_CHILD_DATABASE: &str = "child_database";
pub const BLOCK_TYPE_COLUMN_LIST: &str = "column_list";
pub const BLOCK_TYPE_TABLE: &str = "table";
pub const BLOCK_TYPE_UNSUPPORTED: &str = "unsupported";

/// Fields assigned by the service that must not be sent back on creation
pub const SERVER_ASSIGNED_FIELDS: &[&str] = &[
    "id",
    "created_time",
    "last_edited_time",
    "created_by",
    "last_edited_by",
    "has_children",
    "parent",
];

/// Reference to the owner of a remote object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Parent {
    Workspace {
        #[serde(default = "default_true")]
        workspace: bool,
    },
    PageId {
        page_id: RemoteId,
    },
    DatabaseId {
        database_id: RemoteId,
    },
    BlockId {
        block_id: RemoteId,
    },
}

fn default_true() -> bool {
    true
}

impl Parent {
    pub fn workspace() -> Self {
        Parent::Workspace { workspace: true }
    }

    pub fn page(id: impl Into<RemoteId>) -> Self {
        Parent::PageId { page_id: id.into() }
    }

    pub fn database(id: impl Into<RemoteId>) -> Self {
        Parent::DatabaseId {
            database_id: id.into(),
        }
    }

    pub fn block(id: impl Into<RemoteId>) -> Self {
        Parent::BlockId { block_id: id.into() }
    }

    pub fn is_workspace(&self) -> bool {
        matches!(self, Parent::Workspace { .. })
    }

    /// Database owning this object, if any
    pub fn database_id(&self) -> Option<&str> {
        match self {
            Parent::DatabaseId { database_id } => Some(database_id),
            _ => None,
        }
    }
}

/// A page as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: RemoteId,
    pub parent: Parent,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Page {
    pub fn new(id: impl Into<RemoteId>, parent: Parent) -> Self {
        Self {
            id: id.into(),
            parent,
            fields: Map::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A database as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub id: RemoteId,
    pub parent: Parent,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Database {
    pub fn new(id: impl Into<RemoteId>, parent: Parent) -> Self {
        Self {
            id: id.into(),
            parent,
            fields: Map::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A content block as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: RemoteId,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Block {
    pub fn new(id: impl Into<RemoteId>, block_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            has_children: false,
            fields: Map::new(),
        }
    }

    pub fn with_children(mut self, has_children: bool) -> Self {
        self.has_children = has_children;
        self
    }

    pub fn is_child_page(&self) -> bool {
        self.block_type == BLOCK_TYPE_CHILD_PAGE
    }

    pub fn is_child_database(&self) -> bool {
        self.block_type == BLOCK_TYPE_CHILD_DATABASE
    }

    /// Whether the block only links to a page or database living elsewhere
    pub fn is_structural(&self) -> bool {
        self.is_child_page() || self.is_child_database()
    }

    /// Whether nested children must be embedded in the block's own payload
    /// on creation (multi-column and tabular containers)
    pub fn embeds_children(&self) -> bool {
        self.block_type == BLOCK_TYPE_COLUMN_LIST || self.block_type == BLOCK_TYPE_TABLE
    }

    pub fn is_unsupported(&self) -> bool {
        self.block_type == BLOCK_TYPE_UNSUPPORTED
    }

    /// Creation payload: the block JSON without server-assigned fields
    pub fn to_payload(&self) -> Value {
        let mut payload = self.fields.clone();
        for field in SERVER_ASSIGNED_FIELDS {
            payload.remove(*field);
        }
        payload.insert("type".to_string(), Value::String(self.block_type.clone()));
        Value::Object(payload)
    }
}

/// Attach nested child payloads to a container payload under `<type>.children`
pub fn embed_children(payload: &mut Value, block_type: &str, children: Vec<Value>) {
    if let Some(object) = payload.as_object_mut() {
        let body = object
            .entry(block_type.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(body) = body.as_object_mut() {
            body.insert("children".to_string(), Value::Array(children));
        }
    }
}

/// One page of a cursor-paginated listing
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub results: Vec<T>,
    /// Cursor for the next call; `None` once the listing is exhausted
    pub next_cursor: Option<String>,
}

impl<T> Listing<T> {
    pub fn last(results: Vec<T>) -> Self {
        Self {
            results,
            next_cursor: None,
        }
    }
}

/// Request body for creating a page
#[derive(Debug, Clone, Serialize)]
pub struct PageCreateRequest {
    pub parent: Parent,
    pub properties: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<Value>,
    pub children: Vec<Value>,
}

impl PageCreateRequest {
    /// Request recreating `page` under `parent`, without its block children
    pub fn from_page(page: &Page, parent: Parent) -> Self {
        Self {
            parent,
            properties: page
                .field("properties")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
            icon: page.field("icon").filter(|v| !v.is_null()).cloned(),
            cover: page.field("cover").filter(|v| !v.is_null()).cloned(),
            children: Vec::new(),
        }
    }
}

/// Request body for creating a database
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseCreateRequest {
    pub parent: Parent,
    pub title: Value,
    pub properties: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_inline: Option<Value>,
}

impl DatabaseCreateRequest {
    /// Request recreating `database`'s schema under `parent`
    pub fn from_database(database: &Database, parent: Parent) -> Self {
        let present = |name: &str| database.field(name).filter(|v| !v.is_null()).cloned();
        Self {
            parent,
            title: database
                .field("title")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            properties: database
                .field("properties")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
            description: present("description"),
            icon: present("icon"),
            cover: present("cover"),
            is_inline: present("is_inline"),
        }
    }
}
