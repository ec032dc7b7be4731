//! Per-entity version history

use crate::error::Result;
use crate::models::{entity_types, EntityVersion, EntityVersionHistory, Table};

/// Every persisted revision of one table, oldest first
#[derive(Debug, Clone, Default)]
pub struct VersionHistory {
    revisions: Vec<Table>,
}

impl VersionHistory {
    /// History starting with the created revision
    pub fn new(initial: Table) -> Self {
        VersionHistory { revisions: vec![initial] }
    }

    /// Record a newly persisted revision.
    ///
    /// A write classified as no-change keeps its version; it replaces the
    /// latest entry instead of adding a duplicate.
    pub fn record(&mut self, table: Table) {
        match self.revisions.last_mut() {
            Some(last) if last.version == table.version => *last = table,
            _ => self.revisions.push(table),
        }
    }

    /// Latest revision
    pub fn latest(&self) -> Option<&Table> {
        self.revisions.last()
    }

    /// Revision with the given version
    pub fn get(&self, version: EntityVersion) -> Option<&Table> {
        self.revisions.iter().find(|t| t.version == version)
    }

    /// Number of distinct versions
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Serialized history, newest first
    pub fn to_entity_history(&self) -> Result<EntityVersionHistory> {
        let versions = self
            .revisions
            .iter()
            .rev()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(EntityVersionHistory {
            entity_type: entity_types::TABLE.to_string(),
            versions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn revision(tenths: u32, description: &str) -> Table {
        Table {
            id: Uuid::nil(),
            name: "t1".to_string(),
            fully_qualified_name: "svc.db.t1".to_string(),
            version: EntityVersion::from_tenths(tenths),
            updated_at: Utc::now(),
            updated_by: "admin".to_string(),
            description: Some(description.to_string()),
            table_type: None,
            owner: None,
            database: None,
            columns: Vec::new(),
            table_constraints: None,
            tags: Vec::new(),
            view_definition: None,
            change_description: None,
            joins: None,
            sample_data: None,
            table_profile: None,
        }
    }

    #[test]
    fn test_history_order() {
        let mut history = VersionHistory::new(revision(1, "first"));
        history.record(revision(2, "second"));
        history.record(revision(10, "third"));

        assert_eq!(history.len(), 3);
        assert_eq!(history.latest().unwrap().version, EntityVersion::from_tenths(10));
        assert_eq!(
            history.get(EntityVersion::from_tenths(2)).unwrap().description.as_deref(),
            Some("second")
        );

        let entity_history = history.to_entity_history().unwrap();
        assert_eq!(entity_history.entity_type, "table");
        assert_eq!(entity_history.versions[0]["version"], 1.0);
        assert_eq!(entity_history.versions[2]["version"], 0.1);
    }

    #[test]
    fn test_no_change_replaces_latest() {
        let mut history = VersionHistory::new(revision(1, "first"));
        history.record(revision(1, "first"));
        assert_eq!(history.len(), 1);
    }
}
