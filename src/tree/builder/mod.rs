//! Tree builders
//!
//! Two ways to obtain a [`Tree`](crate::tree::Tree): discover it from the
//! remote service at export time, or rebuild it from a metadata document at
//! restore time.

pub mod export;
pub mod metadata;

pub use export::{ExportRequest, ExportTreeBuilder};
pub use metadata::MetadataTreeBuilder;
