//! Integration tests for backup discovery, import and full round trips

mod export_builder;
pub mod support;
