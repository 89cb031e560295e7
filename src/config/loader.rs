//! ConfigLoader: composes configuration sources with the `config` crate.
//!
//! Precedence, lowest to highest:
//! 1. Built-in defaults
//! 2. Global file `$XDG_CONFIG_HOME/notionbackup/config.toml` (optional)
//! 3. File passed with `--config` (required when given)
//! 4. Environment: `NOTIONBACKUP__` prefix, `__` between nested keys
//!    (e.g. `NOTIONBACKUP__NOTION__TOKEN`)
//!
//! `NOTION_TOKEN` fills the token when no source set one.

use super::{xdg, NotionBackupConfig};
use config::{Config, ConfigError, Environment, File};
use std::path::PathBuf;
use tracing::debug;

pub const ENV_PREFIX: &str = "NOTIONBACKUP";
pub const TOKEN_ENV: &str = "NOTION_TOKEN";

/// Configuration loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    explicit_file: Option<PathBuf>,
    use_global_file: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            explicit_file: None,
            use_global_file: true,
        }
    }

    /// Add a config file that must exist
    pub fn with_file(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_file = path;
        self
    }

    /// Skip the per-user global config file
    pub fn without_global_file(mut self) -> Self {
        self.use_global_file = false;
        self
    }

    pub fn load(&self) -> Result<NotionBackupConfig, ConfigError> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&NotionBackupConfig::default())?);

        if self.use_global_file {
            if let Some(path) = xdg::global_config_path() {
                debug!(path = %path.display(), "Global config source");
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        if let Some(path) = &self.explicit_file {
            debug!(path = %path.display(), "Explicit config source");
            builder = builder.add_source(File::from(path.clone()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let mut config: NotionBackupConfig = builder.build()?.try_deserialize()?;
        if config.notion.token.is_empty() {
            if let Ok(token) = std::env::var(TOKEN_ENV) {
                config.notion.token = token;
            }
        }
        Ok(config)
    }
}
