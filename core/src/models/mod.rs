//! Data models for the metadata catalog
//!
//! This module provides data structures for representing catalog entities
//! (tables and their column trees), tag labels, change descriptions and the
//! time-windowed aggregates attached to tables.

pub mod table;
pub mod column;
pub mod tag;
pub mod change;
pub mod joins;
pub mod profile;
pub mod sample;

pub use table::{Table, TableType, TableConstraint, ConstraintType, EntityReference, CreateTable};
pub use column::{Column, ColumnDataType, ColumnConstraint};
pub use tag::{TagLabel, LabelType, TagState};
pub use change::{ChangeDescription, EntityVersion, EntityVersionHistory, UpdateType};
pub use joins::{TableJoins, ColumnJoin, JoinedWith};
pub use profile::{TableProfile, ColumnProfile};
pub use sample::{TableData, SampleData};

/// Entity type names used in references, errors and history records
pub mod entity_types {
    /// Table entity
    pub const TABLE: &str = "table";

    /// Database entity
    pub const DATABASE: &str = "database";

    /// User principal
    pub const USER: &str = "user";

    /// Team principal
    pub const TEAM: &str = "team";

    /// Classification tag
    pub const TAG: &str = "tag";
}
