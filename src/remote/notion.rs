//! HTTP client for the Notion public REST API.
//!
//! One request per call: pagination is driven by the caller through the
//! cursor, and retries and rate limiting are left to the caller.

use super::model::{Block, Database, DatabaseCreateRequest, Listing, Page, PageCreateRequest};
use super::ContentService;
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com";
pub const DEFAULT_API_VERSION: &str = "2022-06-28";
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Raw paginated response envelope
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    results: Vec<T>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

impl<T> From<ListResponse<T>> for Listing<T> {
    fn from(response: ListResponse<T>) -> Self {
        let next_cursor = if response.has_more {
            response.next_cursor.filter(|c| !c.is_empty())
        } else {
            None
        };
        Listing {
            results: response.results,
            next_cursor,
        }
    }
}

/// Error body returned on non-success responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Content service backed by the Notion REST API
#[derive(Debug, Clone)]
pub struct NotionClient {
    http: Client,
    base_url: String,
    token: String,
    api_version: String,
    page_size: u32,
}

impl NotionClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Results requested per listing call, clamped to the API's 1..=100
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, 100);
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/v1/{}", self.base_url, path);
        debug!(method = %method, url = %url, "Notion request");
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.api_version)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ServiceError> {
        let response = builder.send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: Option<ApiErrorBody> = serde_json::from_str(&body).ok();
            let (code, message) = match parsed {
                Some(err) => (err.code, err.message),
                None => (String::new(), body),
            };
            return Err(ServiceError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// Search filtered to one object type ("page" or "database")
    async fn search<T: DeserializeOwned>(
        &self,
        object: &str,
        cursor: Option<String>,
    ) -> Result<Listing<T>, ServiceError> {
        let mut body = json!({
            "filter": {"property": "object", "value": object},
            "page_size": self.page_size,
        });
        if let Some(cursor) = cursor {
            body["start_cursor"] = Value::String(cursor);
        }
        let response: ListResponse<T> = self
            .send(self.request(Method::POST, "search").json(&body))
            .await?;
        Ok(response.into())
    }
}

#[async_trait]
impl ContentService for NotionClient {
    async fn list_pages(&self, cursor: Option<String>) -> Result<Listing<Page>, ServiceError> {
        self.search("page", cursor).await
    }

    async fn list_databases(
        &self,
        cursor: Option<String>,
    ) -> Result<Listing<Database>, ServiceError> {
        self.search("database", cursor).await
    }

    async fn get_page(&self, id: &str) -> Result<Page, ServiceError> {
        self.send(self.request(Method::GET, &format!("pages/{}", id)))
            .await
    }

    async fn get_database(&self, id: &str) -> Result<Database, ServiceError> {
        self.send(self.request(Method::GET, &format!("databases/{}", id)))
            .await
    }

    async fn get_block(&self, id: &str) -> Result<Block, ServiceError> {
        self.send(self.request(Method::GET, &format!("blocks/{}", id)))
            .await
    }

    async fn list_block_children(
        &self,
        parent_id: &str,
        cursor: Option<String>,
    ) -> Result<Listing<Block>, ServiceError> {
        let mut query = vec![("page_size", self.page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("start_cursor", cursor));
        }
        let response: ListResponse<Block> = self
            .send(
                self.request(Method::GET, &format!("blocks/{}/children", parent_id))
                    .query(&query),
            )
            .await?;
        Ok(response.into())
    }

    async fn query_database(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<Listing<Page>, ServiceError> {
        let mut body = json!({"page_size": self.page_size});
        if let Some(cursor) = cursor {
            body["start_cursor"] = Value::String(cursor);
        }
        let response: ListResponse<Page> = self
            .send(
                self.request(Method::POST, &format!("databases/{}/query", database_id))
                    .json(&body),
            )
            .await?;
        Ok(response.into())
    }

    async fn create_page(&self, request: &PageCreateRequest) -> Result<Page, ServiceError> {
        self.send(self.request(Method::POST, "pages").json(request))
            .await
    }

    async fn create_database(
        &self,
        request: &DatabaseCreateRequest,
    ) -> Result<Database, ServiceError> {
        self.send(self.request(Method::POST, "databases").json(request))
            .await
    }

    async fn append_block_children(
        &self,
        parent_id: &str,
        children: Vec<Value>,
    ) -> Result<Vec<Block>, ServiceError> {
        let body = json!({ "children": children });
        let response: ListResponse<Block> = self
            .send(
                self.request(Method::PATCH, &format!("blocks/{}/children", parent_id))
                    .json(&body),
            )
            .await?;
        Ok(response.results)
    }
}
