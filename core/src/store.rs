//! Entity storage contract
//!
//! Persistence is a collaborator: the engine only needs lookup by id or FQN
//! and a conditional write keyed on the version the writer started from.

use std::collections::HashMap;
use std::sync::RwLock;
use log::debug;
use uuid::Uuid;

use crate::error::{to_state_error, CatalogError, Result};
use crate::models::{entity_types, EntityVersion, EntityVersionHistory, Table};
use crate::schema::VersionHistory;

/// Storage for tables and their version history
#[cfg_attr(test, mockall::automock)]
pub trait EntityStore: Send + Sync {
    /// Latest revision by id
    fn get(&self, id: &Uuid) -> Result<Table>;

    /// Latest revision by fully qualified name, `None` when unknown
    fn find_by_fqn(&self, fqn: &str) -> Result<Option<Table>>;

    /// Persist a revision.
    ///
    /// `expected` is the version the write was computed against; `None` means
    /// the entity must not exist yet.
    fn put(&self, table: Table, expected: Option<EntityVersion>) -> Result<Table>;

    /// Every persisted revision, newest first
    fn versions(&self, id: &Uuid) -> Result<EntityVersionHistory>;

    /// One persisted revision
    fn get_version(&self, id: &Uuid, version: EntityVersion) -> Result<Table>;

    /// Latest revision by fully qualified name
    fn get_by_fqn(&self, fqn: &str) -> Result<Table> {
        self.find_by_fqn(fqn)?
            .ok_or_else(|| CatalogError::entity_not_found(entity_types::TABLE, fqn))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    histories: HashMap<Uuid, VersionHistory>,
    fqn_index: HashMap<String, Uuid>,
}

/// Store kept in memory
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    state: RwLock<StoreState>,
}

impl InMemoryEntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities
    pub fn len(&self) -> Result<usize> {
        let state = self.state.read()
            .map_err(|e| to_state_error(format!("Failed to read entity store: {}", e)))?;
        Ok(state.histories.len())
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl EntityStore for InMemoryEntityStore {
    fn get(&self, id: &Uuid) -> Result<Table> {
        let state = self.state.read()
            .map_err(|e| to_state_error(format!("Failed to read entity store: {}", e)))?;
        state
            .histories
            .get(id)
            .and_then(VersionHistory::latest)
            .cloned()
            .ok_or_else(|| CatalogError::entity_not_found(entity_types::TABLE, id))
    }

    fn find_by_fqn(&self, fqn: &str) -> Result<Option<Table>> {
        let state = self.state.read()
            .map_err(|e| to_state_error(format!("Failed to read entity store: {}", e)))?;
        Ok(state
            .fqn_index
            .get(fqn)
            .and_then(|id| state.histories.get(id))
            .and_then(VersionHistory::latest)
            .cloned())
    }

    fn put(&self, table: Table, expected: Option<EntityVersion>) -> Result<Table> {
        let mut state = self.state.write()
            .map_err(|e| to_state_error(format!("Failed to write entity store: {}", e)))?;

        if let Some(owner) = state.fqn_index.get(&table.fully_qualified_name) {
            if *owner != table.id {
                return Err(CatalogError::EntityAlreadyExists(table.fully_qualified_name.clone()));
            }
        }

        let current = state.histories.get(&table.id).and_then(VersionHistory::latest);
        let previous_fqn = current.map(|t| t.fully_qualified_name.clone());
        match (current.map(|t| t.version), expected) {
            (None, None) => {}
            (Some(actual), Some(expected)) if actual == expected => {}
            (actual, expected) => {
                return Err(CatalogError::VersionConflict {
                    fqn: table.fully_qualified_name.clone(),
                    expected: expected.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string()),
                    actual: actual.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string()),
                });
            }
        }

        if let Some(previous_fqn) = previous_fqn {
            if previous_fqn != table.fully_qualified_name {
                state.fqn_index.remove(&previous_fqn);
            }
        }
        state.fqn_index.insert(table.fully_qualified_name.clone(), table.id);

        let stored = table.clone().without_aggregates();
        match state.histories.get_mut(&table.id) {
            Some(history) => history.record(stored),
            None => {
                state.histories.insert(table.id, VersionHistory::new(stored));
            }
        }

        debug!("Stored {} version {}", table.fully_qualified_name, table.version);
        Ok(table)
    }

    fn versions(&self, id: &Uuid) -> Result<EntityVersionHistory> {
        let state = self.state.read()
            .map_err(|e| to_state_error(format!("Failed to read entity store: {}", e)))?;
        state
            .histories
            .get(id)
            .ok_or_else(|| CatalogError::entity_not_found(entity_types::TABLE, id))?
            .to_entity_history()
    }

    fn get_version(&self, id: &Uuid, version: EntityVersion) -> Result<Table> {
        let state = self.state.read()
            .map_err(|e| to_state_error(format!("Failed to read entity store: {}", e)))?;
        state
            .histories
            .get(id)
            .and_then(|history| history.get(version))
            .cloned()
            .ok_or_else(|| {
                CatalogError::entity_not_found(entity_types::TABLE, format!("{} version {}", id, version))
            })
    }
}
