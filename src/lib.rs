//! notionbackup: Backup and Restore for Notion Workspaces
//!
//! Discovers a workspace (or selected pages and databases) as an object
//! graph, persists every object to durable storage with a compact metadata
//! document describing the hierarchy, and recreates the graph under a new
//! parent page with fresh identifiers.

pub mod config;
pub mod error;
pub mod importer;
pub mod logging;
pub mod metadata;
pub mod operations;
pub mod remote;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
