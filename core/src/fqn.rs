//! Fully qualified names
//!
//! Entities and columns are addressed by dotted paths: a table is
//! `<database fqn>.<table>`, a column `<table fqn>.<path>` where the path
//! walks the column tree by name.

use crate::config::FqnConfig;
use crate::error::{CatalogError, Result};
use crate::models::Column;

/// Derives and validates dotted names
#[derive(Debug, Clone, Default)]
pub struct FqnResolver {
    config: FqnConfig,
}

impl FqnResolver {
    /// Create a resolver with the given naming rules
    pub fn new(config: FqnConfig) -> Self {
        FqnResolver { config }
    }

    /// Maximum length of a single name
    pub fn max_name_length(&self) -> usize {
        self.config.max_name_length
    }

    /// Reject empty or over-long names
    pub fn validate_name(&self, name: &str) -> Result<()> {
        let length = name.chars().count();
        if length == 0 || length > self.config.max_name_length {
            return Err(CatalogError::InvalidName {
                name: name.to_string(),
                max: self.config.max_name_length,
            });
        }
        Ok(())
    }

    /// Validated FQN of `name` inside `parent_fqn`
    pub fn resolve(&self, parent_fqn: &str, name: &str) -> Result<String> {
        self.validate_name(name)?;
        Ok(self.child_fqn(parent_fqn, name))
    }

    /// Join a parent FQN and a local name without validation
    pub fn child_fqn(&self, parent_fqn: &str, local_name: &str) -> String {
        if parent_fqn.is_empty() {
            return local_name.to_string();
        }
        let mut fqn = String::with_capacity(parent_fqn.len() + local_name.len() + 1);
        fqn.push_str(parent_fqn);
        fqn.push(self.config.separator);
        fqn.push_str(local_name);
        fqn
    }

    /// Split an FQN into its segments
    pub fn split<'a>(&self, fqn: &'a str) -> Vec<&'a str> {
        fqn.split(self.config.separator).collect()
    }

    /// Inverse of [`FqnResolver::split`]
    pub fn join(&self, segments: &[&str]) -> String {
        let mut separator = [0u8; 4];
        segments.join(&*self.config.separator.encode_utf8(&mut separator))
    }

    /// Validate every column name and (re)assign the FQN of every node.
    ///
    /// Called on every accepted write so renames of the table or of any
    /// ancestor column cascade down the tree.
    pub fn assign_column_fqns(&self, table_fqn: &str, columns: &mut [Column]) -> Result<()> {
        for column in columns.iter_mut() {
            let fqn = self.resolve(table_fqn, &column.name)?;
            self.assign_column_fqns(&fqn, &mut column.children)?;
            column.fully_qualified_name = Some(fqn);
        }
        Ok(())
    }
}
