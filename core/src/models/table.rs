//! Catalog table representation
//!
//! This module provides the versioned table entity, its table-level
//! attributes and the request used to create or replace it.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use super::change::{ChangeDescription, EntityVersion};
use super::column::Column;
use super::joins::TableJoins;
use super::profile::TableProfile;
use super::sample::SampleData;
use super::tag::TagLabel;

/// Kind of table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableType {
    /// Regular table
    Regular,
    /// External table
    External,
    /// View
    View,
    /// Secure view
    SecureView,
    /// Materialized view
    MaterializedView,
}

impl TableType {
    /// Whether a view definition may be attached
    pub fn is_view(&self) -> bool {
        matches!(
            self,
            TableType::View | TableType::SecureView | TableType::MaterializedView
        )
    }
}

/// Kind of table constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    /// Unique key
    Unique,
    /// Primary key
    PrimaryKey,
    /// Foreign key
    ForeignKey,
}

/// Constraint spanning one or more columns of a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConstraint {
    /// Constraint kind
    pub constraint_type: ConstraintType,

    /// Column names covered by the constraint
    pub columns: Vec<String>,
}

impl TableConstraint {
    /// Create a constraint over the given columns
    pub fn new(constraint_type: ConstraintType, columns: Vec<String>) -> Self {
        TableConstraint { constraint_type, columns }
    }
}

/// Reference to another catalog entity, such as an owner or a database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    /// Referenced entity id
    pub id: Uuid,

    /// Referenced entity type (`user`, `team`, `database`)
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Display name, filled in on read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EntityReference {
    /// Reference by id and type
    pub fn new(id: Uuid, entity_type: impl Into<String>) -> Self {
        EntityReference {
            id,
            entity_type: entity_type.into(),
            name: None,
        }
    }
}

// Identity of a reference is its id and type; names are presentation only.
impl PartialEq for EntityReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.entity_type == other.entity_type
    }
}

impl Eq for EntityReference {}

/// Versioned table entity
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Identity
    pub id: Uuid,

    /// Local name
    pub name: String,

    /// Database FQN + "." + name
    pub fully_qualified_name: String,

    /// Current version
    pub version: EntityVersion,

    /// Time of the last accepted write
    pub updated_at: DateTime<Utc>,

    /// Principal that made the last accepted write
    pub updated_by: String,

    /// Free text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Table kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<TableType>,

    /// Owning user or team
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<EntityReference>,

    /// Containing database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<EntityReference>,

    /// Root column sequence
    #[serde(default)]
    pub columns: Vec<Column>,

    /// Table constraints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_constraints: Option<Vec<TableConstraint>>,

    /// Table-level tag labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagLabel>,

    /// SQL of a view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_definition: Option<String>,

    /// Change applied by the last accepted write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_description: Option<ChangeDescription>,

    /// Join counts over the trailing window, populated on read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joins: Option<TableJoins>,

    /// Dated sample data, newest first, populated on read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_data: Option<Vec<SampleData>>,

    /// Dated profiles, newest first, populated on read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_profile: Option<Vec<TableProfile>>,
}

impl Debug for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("fqn", &self.fully_qualified_name)
            .field("version", &self.version.to_string())
            .field("columns", &self.columns.len())
            .field("tags", &self.tags.len())
            .finish()
    }
}

impl Table {
    /// Top-level column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Whether a top-level column with this name exists
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Drop the read-only aggregates so only persisted state remains
    pub fn without_aggregates(mut self) -> Self {
        self.joins = None;
        self.sample_data = None;
        self.table_profile = None;
        self
    }
}

/// Request to create or replace a table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTable {
    /// Local name
    pub name: String,

    /// Containing database id
    pub database: Uuid,

    /// Root columns
    pub columns: Vec<Column>,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Table kind
    #[serde(default)]
    pub table_type: Option<TableType>,

    /// Table constraints
    #[serde(default)]
    pub table_constraints: Option<Vec<TableConstraint>>,

    /// Table-level tags
    #[serde(default)]
    pub tags: Vec<TagLabel>,

    /// Owner
    #[serde(default)]
    pub owner: Option<EntityReference>,

    /// View SQL
    #[serde(default)]
    pub view_definition: Option<String>,
}

impl CreateTable {
    /// Request with a name, database and columns only
    pub fn new(name: impl Into<String>, database: Uuid, columns: Vec<Column>) -> Self {
        CreateTable {
            name: name.into(),
            database,
            columns,
            description: None,
            table_type: None,
            table_constraints: None,
            tags: Vec::new(),
            owner: None,
            view_definition: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the table type
    pub fn with_table_type(mut self, table_type: TableType) -> Self {
        self.table_type = Some(table_type);
        self
    }

    /// Replace the table constraints
    pub fn with_table_constraints(mut self, constraints: Option<Vec<TableConstraint>>) -> Self {
        self.table_constraints = constraints;
        self
    }

    /// Replace the table-level tags
    pub fn with_tags(mut self, tags: Vec<TagLabel>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the owner
    pub fn with_owner(mut self, owner: EntityReference) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set the view definition
    pub fn with_view_definition(mut self, sql: impl Into<String>) -> Self {
        self.view_definition = Some(sql.into());
        self
    }

    /// Replace the columns
    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }
}
