//! Configuration
//!
//! Layered settings for the service client, the backup directory and
//! logging. See [`ConfigLoader`] for the source precedence.

pub mod loader;
pub mod xdg;

pub use loader::ConfigLoader;

use crate::error::EngineError;
use crate::logging::LoggingConfig;
use crate::remote::notion::{DEFAULT_API_VERSION, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE};
use crate::remote::NotionClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotionBackupConfig {
    #[serde(default)]
    pub notion: NotionConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NotionBackupConfig {
    /// Check settings every command needs
    pub fn validate(&self) -> Result<(), EngineError> {
        self.notion.validate()
    }
}

/// Remote service settings
#[derive(Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Integration token (also read from NOTION_TOKEN)
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of the Notion-Version header
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Results per listing call (1..=100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: default_base_url(),
            api_version: default_api_version(),
            page_size: default_page_size(),
        }
    }
}

impl fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionConfig")
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl NotionConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.token.trim().is_empty() {
            return Err(EngineError::Config(
                "Notion token is not set (use NOTION_TOKEN or notion.token)".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > 100 {
            return Err(EngineError::Config(format!(
                "notion.page_size must be between 1 and 100, got {}",
                self.page_size
            )));
        }
        Ok(())
    }

    pub fn client(&self) -> NotionClient {
        NotionClient::new(self.token.clone())
            .with_base_url(self.base_url.clone())
            .with_api_version(self.api_version.clone())
            .with_page_size(self.page_size)
    }
}

/// Backup directory settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backup directory; overridden by `backup --dir`
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Create the backup directory when missing
    #[serde(default)]
    pub create_dir: bool,
}
