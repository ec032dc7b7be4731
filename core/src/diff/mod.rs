//! Structural diff between two revisions of a table
//!
//! The differ produces a [`ChangeSet`]: a flat list of field changes, each
//! tagged with the part of the entity it touches so the classifier can decide
//! the version bump without re-inspecting the entities.

mod columns;

pub use columns::diff_columns;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use log::debug;

use crate::error::Result;
use crate::models::{ChangeDescription, EntityVersion, TagLabel, Table};

/// How the new revision was submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Full replacement; columns may be added, removed or retyped
    Put,

    /// Partial merge; the set of columns is immutable
    Patch,
}

impl Display for WriteMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            WriteMode::Put => write!(f, "PUT"),
            WriteMode::Patch => write!(f, "PATCH"),
        }
    }
}

/// Direction of a field change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Absent before, present after
    Added,
    /// Present on both sides with different values
    Updated,
    /// Present before, absent after
    Deleted,
}

/// Part of the entity a change touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeTarget {
    /// A whole column, at any depth
    Column,
    /// One attribute of a column
    ColumnAttribute,
    /// The table constraint list
    TableConstraints,
    /// Any other table attribute
    TableAttribute,
}

/// One changed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Field identifier, e.g. `description` or `column:c2.c.tags`
    pub field: String,

    /// Direction
    pub kind: ChangeKind,

    /// What was touched
    pub target: ChangeTarget,
}

/// Field changes between two revisions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    /// Empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change
    pub fn push(&mut self, field: impl Into<String>, kind: ChangeKind, target: ChangeTarget) {
        self.changes.push(FieldChange {
            field: field.into(),
            kind,
            target,
        });
    }

    /// Compare an optional attribute and record added, updated or deleted
    pub fn compare<T: PartialEq>(
        &mut self,
        field: impl Into<String>,
        old: Option<&T>,
        new: Option<&T>,
        target: ChangeTarget,
    ) {
        let kind = match (old, new) {
            (None, Some(_)) => ChangeKind::Added,
            (Some(_), None) => ChangeKind::Deleted,
            (Some(a), Some(b)) if a != b => ChangeKind::Updated,
            _ => return,
        };
        self.push(field, kind, target);
    }

    /// Compare two tag lists as sets of tag FQNs; the whole list is one field
    pub fn compare_tags(
        &mut self,
        field: impl Into<String>,
        old: &[TagLabel],
        new: &[TagLabel],
        target: ChangeTarget,
    ) {
        let old: BTreeSet<&str> = old.iter().map(|t| t.tag_fqn.as_str()).collect();
        let new: BTreeSet<&str> = new.iter().map(|t| t.tag_fqn.as_str()).collect();
        let (old, new) = (
            if old.is_empty() { None } else { Some(&old) },
            if new.is_empty() { None } else { Some(&new) },
        );
        self.compare(field, old, new, target);
    }

    /// Whether no field changed
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of field changes
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Iterate over the changes
    pub fn iter(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter()
    }

    /// Change description against `previous_version`
    pub fn to_description(&self, previous_version: EntityVersion) -> ChangeDescription {
        let mut description = ChangeDescription::new(previous_version);
        for change in &self.changes {
            let set = match change.kind {
                ChangeKind::Added => &mut description.fields_added,
                ChangeKind::Updated => &mut description.fields_updated,
                ChangeKind::Deleted => &mut description.fields_deleted,
            };
            set.insert(change.field.clone());
        }
        description
    }
}

/// Diff two revisions of a table.
///
/// Derived and bookkeeping fields (id, FQNs, version, timestamps, read-only
/// aggregates) are not compared.
pub fn diff_tables(old: &Table, new: &Table, mode: WriteMode) -> Result<ChangeSet> {
    let mut changes = ChangeSet::new();
    use ChangeTarget::TableAttribute;

    changes.compare("name", Some(&old.name), Some(&new.name), TableAttribute);
    changes.compare("description", old.description.as_ref(), new.description.as_ref(), TableAttribute);
    changes.compare("owner", old.owner.as_ref(), new.owner.as_ref(), TableAttribute);
    changes.compare("tableType", old.table_type.as_ref(), new.table_type.as_ref(), TableAttribute);
    changes.compare(
        "viewDefinition",
        old.view_definition.as_ref(),
        new.view_definition.as_ref(),
        TableAttribute,
    );
    changes.compare(
        "tableConstraints",
        present_constraints(old),
        present_constraints(new),
        ChangeTarget::TableConstraints,
    );
    changes.compare_tags("tags", &old.tags, &new.tags, TableAttribute);

    diff_columns(&old.columns, &new.columns, mode, &mut changes)?;

    debug!(
        "{} diff of {}: {} field change(s)",
        mode,
        new.fully_qualified_name,
        changes.len()
    );
    Ok(changes)
}

fn present_constraints(table: &Table) -> Option<&Vec<crate::models::TableConstraint>> {
    table.table_constraints.as_ref().filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, ColumnDataType, ConstraintType, EntityReference, TableConstraint};
    use chrono::Utc;
    use uuid::Uuid;

    fn table() -> Table {
        Table {
            id: Uuid::nil(),
            name: "t1".to_string(),
            fully_qualified_name: "svc.db.t1".to_string(),
            version: EntityVersion::INITIAL,
            updated_at: Utc::now(),
            updated_by: "admin".to_string(),
            description: None,
            table_type: None,
            owner: None,
            database: None,
            columns: vec![Column::new("c1", ColumnDataType::Bigint)],
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
    fn test_identical_tables() {
        let t = table();
        assert!(diff_tables(&t, &t.clone(), WriteMode::Put).unwrap().is_empty());
    }

    #[test]
    fn test_table_attributes() {
        let old = table();
        let mut new = table();
        new.description = Some("orders".to_string());
        new.owner = Some(EntityReference::new(Uuid::new_v4(), "team"));
        new.tags = vec![TagLabel::new("Tier.Tier1")];
        new.table_constraints = Some(vec![TableConstraint::new(
            ConstraintType::PrimaryKey,
            vec!["c1".to_string()],
        )]);

        let changes = diff_tables(&old, &new, WriteMode::Patch).unwrap();
        let description = changes.to_description(EntityVersion::INITIAL);
        assert_eq!(
            description.fields_added.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["description", "owner", "tableConstraints", "tags"]
        );

        let reverse = diff_tables(&new, &old, WriteMode::Patch)
            .unwrap()
            .to_description(EntityVersion::INITIAL);
        assert_eq!(reverse.fields_deleted.len(), 4);
        assert!(reverse.fields_added.is_empty());
    }

    #[test]
    fn test_empty_constraint_list_is_absent() {
        let old = table();
        let mut new = table();
        new.table_constraints = Some(Vec::new());
        assert!(diff_tables(&old, &new, WriteMode::Put).unwrap().is_empty());
    }

    #[test]
    fn test_tag_order_ignored() {
        let mut old = table();
        old.tags = vec![TagLabel::new("a.b"), TagLabel::new("c.d")];
        let mut new = table();
        new.tags = vec![TagLabel::new("c.d"), TagLabel::new("a.b")];
        assert!(diff_tables(&old, &new, WriteMode::Put).unwrap().is_empty());

        new.tags.push(TagLabel::new("e.f"));
        let description = diff_tables(&old, &new, WriteMode::Put)
            .unwrap()
            .to_description(EntityVersion::INITIAL);
        assert!(description.fields_updated.contains("tags"));
    }
}
