//! Old-to-new remote id translation, one namespace per object class.

use crate::error::EngineError;
use crate::remote::Parent;
use crate::types::RemoteId;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Page,
    Database,
    Block,
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectClass::Page => "page",
            ObjectClass::Database => "database",
            ObjectClass::Block => "block",
        })
    }
}

/// Translation table built while replaying a tree
#[derive(Debug, Default)]
pub struct IdTranslation {
    pages: HashMap<RemoteId, RemoteId>,
    databases: HashMap<RemoteId, RemoteId>,
    blocks: HashMap<RemoteId, RemoteId>,
}

impl IdTranslation {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, class: ObjectClass) -> &HashMap<RemoteId, RemoteId> {
        match class {
            ObjectClass::Page => &self.pages,
            ObjectClass::Database => &self.databases,
            ObjectClass::Block => &self.blocks,
        }
    }

    pub fn record(&mut self, class: ObjectClass, old: impl Into<RemoteId>, new: impl Into<RemoteId>) {
        let table = match class {
            ObjectClass::Page => &mut self.pages,
            ObjectClass::Database => &mut self.databases,
            ObjectClass::Block => &mut self.blocks,
        };
        table.insert(old.into(), new.into());
    }

    /// New id for `old`; a missing entry means an owner was not created first
    pub fn lookup(&self, class: ObjectClass, old: &str) -> Result<&RemoteId, EngineError> {
        self.table(class).get(old).ok_or_else(|| {
            EngineError::Structural(format!("No translated {} id for {}", class, old))
        })
    }

    /// Rewrite a stored parent reference into the destination workspace
    pub fn resolve_parent(&self, parent: &Parent) -> Result<Parent, EngineError> {
        match parent {
            Parent::PageId { page_id } => Ok(Parent::page(self.lookup(ObjectClass::Page, page_id)?.clone())),
            Parent::DatabaseId { database_id } => Ok(Parent::database(
                self.lookup(ObjectClass::Database, database_id)?.clone(),
            )),
            Parent::BlockId { block_id } => {
                Ok(Parent::block(self.lookup(ObjectClass::Block, block_id)?.clone()))
            }
            Parent::Workspace { .. } => Err(EngineError::Structural(
                "Workspace-level object found below another object".to_string(),
            )),
        }
    }

    pub fn len(&self, class: ObjectClass) -> usize {
        self.table(class).len()
    }
}
