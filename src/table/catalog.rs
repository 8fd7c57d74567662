//! Table catalog and temporary-table registry
//!
//! The catalog is the in-process registry the query layer resolves table
//! names against. Tables are handed out as shared handles so a statement
//! can keep a table in its from-list while another clause mutates it.

use super::Table;
use crate::{Result, TableError};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared handle to a table
pub type TableHandle = Arc<RwLock<Table>>;

/// Wrap a table into a shareable handle
pub fn handle(table: Table) -> TableHandle {
    Arc::new(RwLock::new(table))
}

/// Named-table registry
#[derive(Default)]
pub struct TableCatalog {
    tables: AHashMap<String, TableHandle>,
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Register a table under its own name
    pub fn insert(&mut self, table: Table) -> Result<TableHandle> {
        let name = table.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(TableError::TableExists(name));
        }
        let h = handle(table);
        self.tables.insert(name, Arc::clone(&h));
        Ok(h)
    }

    /// Register an existing handle under a name, replacing any previous one
    pub fn insert_as(&mut self, name: impl Into<String>, table: TableHandle) {
        self.tables.insert(name.into(), table);
    }

    /// Look up an open table by name
    pub fn open(&self, name: &str) -> Result<TableHandle> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| TableError::TableNotFound(name.to_string()))
    }

    /// Drop a table from the registry
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| TableError::TableNotFound(name.to_string()))
    }

    /// Rename a registered table
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if self.tables.contains_key(new) {
            return Err(TableError::TableExists(new.to_string()));
        }
        let h = self
            .tables
            .remove(old)
            .ok_or_else(|| TableError::TableNotFound(old.to_string()))?;
        h.write().rename(new);
        self.tables.insert(new.to_string(), h);
        Ok(())
    }
}
