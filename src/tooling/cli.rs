//! CLI Tooling
//!
//! Command-line surface for backup and restore. Object ids are validated as
//! UUIDs here and normalized to their hyphenated form before reaching the
//! engine.

use crate::config::{ConfigLoader, NotionBackupConfig};
use crate::error::EngineError;
use crate::operations::{run_backup, run_restore};
use crate::store::FileStore;
use crate::tree::builder::ExportRequest;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// notionbackup - back up and restore Notion workspaces
#[derive(Parser, Debug)]
#[command(name = "notionbackup")]
#[command(about = "Back up a Notion workspace to local storage and restore it later")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Integration token (overrides notion.token and NOTION_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long, global = true)]
    pub log_output: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Back up the whole workspace or selected pages and databases
    #[command(group(
        ArgGroup::new("selector")
            .required(true)
            .multiple(true)
            .args(["workspace", "page", "database"])
    ))]
    Backup {
        /// Backup directory (defaults to storage.dir from config)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Create the backup directory if it does not exist
        #[arg(long)]
        create_dir: bool,

        /// Back up every page and database the integration can see
        #[arg(long, conflicts_with_all = ["page", "database"])]
        workspace: bool,

        /// Page id to back up (repeatable)
        #[arg(long = "page", value_parser = parse_object_id)]
        page: Vec<String>,

        /// Database id to back up (repeatable)
        #[arg(long = "database", value_parser = parse_object_id)]
        database: Vec<String>,
    },
    /// Restore a backup under an existing page
    Restore {
        /// Metadata file written by a backup
        #[arg(long)]
        metadata: PathBuf,

        /// Destination page id
        #[arg(long, value_parser = parse_object_id)]
        page: String,
    },
}

/// Accept a UUID with or without hyphens and return the hyphenated form
pub fn parse_object_id(value: &str) -> Result<String, String> {
    Uuid::parse_str(value.trim())
        .map(|id| id.hyphenated().to_string())
        .map_err(|e| format!("'{}' is not a valid object id: {}", value, e))
}

/// Command-line flags win over every config source
fn apply_overrides(mut config: NotionBackupConfig, cli: &Cli) -> NotionBackupConfig {
    if let Some(token) = &cli.token {
        config.notion.token = token.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.logging.output = output.clone();
    }
    config
}

/// Execution context: resolved configuration for one invocation
pub struct CliContext {
    config: NotionBackupConfig,
}

impl CliContext {
    /// Load configuration and apply the logging flags on top of it
    pub fn new(cli: &Cli) -> Result<Self, EngineError> {
        let config = ConfigLoader::new()
            .with_file(cli.config.clone())
            .load()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(Self::from_config(apply_overrides(config, cli)))
    }

    pub fn from_config(config: NotionBackupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NotionBackupConfig {
        &self.config
    }

    /// Run a command and return its one-line summary
    pub async fn execute(&self, command: &Commands) -> Result<String, EngineError> {
        self.config.validate()?;
        let client = self.config.notion.client();

        match command {
            Commands::Backup {
                dir,
                create_dir,
                workspace,
                page,
                database,
            } => {
                let dir = dir
                    .clone()
                    .or_else(|| self.config.storage.dir.clone())
                    .ok_or_else(|| {
                        EngineError::Config(
                            "No backup directory given (use --dir or storage.dir)".to_string(),
                        )
                    })?;
                let create = *create_dir || self.config.storage.create_dir;
                let store = FileStore::create(&dir, create)
                    .map_err(|e| EngineError::persistence(dir.display().to_string(), e))?;

                let request = if *workspace {
                    ExportRequest::Workspace
                } else {
                    ExportRequest::objects(page.clone(), database.clone())
                };
                info!(dir = %dir.display(), ?request, "Starting backup");

                let report = run_backup(&client, &store, request).await?;
                Ok(format!(
                    "Backed up {} objects; metadata written to {}",
                    report.node_count,
                    report.metadata_path.display()
                ))
            }
            Commands::Restore { metadata, page } => {
                let (store, document) = FileStore::open_from_metadata(metadata)
                    .map_err(|e| EngineError::persistence(metadata.display().to_string(), e))?;
                info!(metadata = %metadata.display(), destination = %page, "Starting restore");

                let report = run_restore(&client, &store, &document, page.clone()).await?;
                Ok(format!(
                    "Restored {} pages, {} databases and {} blocks ({} blocks skipped)",
                    report.pages, report.databases, report.blocks, report.skipped_blocks
                ))
            }
        }
    }
}
