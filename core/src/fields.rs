//! Requested-field projection for read paths

use std::collections::BTreeSet;

use crate::error::{CatalogError, Result};

/// Optional table attributes a read may populate
pub const TABLE_FIELDS: &[&str] = &[
    "columns",
    "tableConstraints",
    "owner",
    "database",
    "tags",
    "joins",
    "sampleData",
    "viewDefinition",
    "tableProfile",
];

/// Set of optional fields requested by a reader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    names: BTreeSet<String>,
}

impl Fields {
    /// Parse a comma separated field list, rejecting names outside `allowed`
    pub fn parse(list: &str, allowed: &[&str]) -> Result<Self> {
        let mut names = BTreeSet::new();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if !allowed.contains(&name) {
                return Err(CatalogError::InvalidField(name.to_string()));
            }
            names.insert(name.to_string());
        }
        Ok(Fields { names })
    }

    /// Parse a field list for table reads
    pub fn table(list: &str) -> Result<Self> {
        Self::parse(list, TABLE_FIELDS)
    }

    /// Every table field
    pub fn all_table_fields() -> Self {
        Fields {
            names: TABLE_FIELDS.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// No optional fields
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether `name` was requested
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
