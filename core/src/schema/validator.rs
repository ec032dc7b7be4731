//! Entity validation
//!
//! Every write passes through [`SchemaValidator`] before it is diffed. All
//! checks are pure apart from the registry lookups; the first violation
//! found aborts the write.

use std::collections::HashSet;
use log::debug;

use crate::error::{CatalogError, Result};
use crate::fqn::FqnResolver;
use crate::models::entity_types;
use crate::models::{Column, ColumnDataType, EntityReference, TagLabel, Table};
use crate::registry::{PrincipalRegistry, TagRegistry};

/// Validator for tables and their column trees
pub struct SchemaValidator<'a> {
    resolver: &'a FqnResolver,
    tags: &'a dyn TagRegistry,
    principals: &'a dyn PrincipalRegistry,
}

impl<'a> SchemaValidator<'a> {
    /// Create a validator backed by the given registries
    pub fn new(
        resolver: &'a FqnResolver,
        tags: &'a dyn TagRegistry,
        principals: &'a dyn PrincipalRegistry,
    ) -> Self {
        SchemaValidator { resolver, tags, principals }
    }

    /// Validate a complete table
    pub fn validate_table(&self, table: &Table) -> Result<()> {
        self.resolver.validate_name(&table.name)?;
        self.validate_columns(&table.columns)?;

        if table.view_definition.is_some()
            && !table.table_type.map(|t| t.is_view()).unwrap_or(false)
        {
            return Err(CatalogError::InvalidViewDefinition);
        }

        if let Some(owner) = &table.owner {
            self.validate_owner(owner)?;
        }

        for constraint in table.table_constraints.iter().flatten() {
            for name in &constraint.columns {
                if !table.has_column(name) {
                    return Err(CatalogError::UnknownColumn(name.clone()));
                }
            }
        }

        self.validate_tags(&table.tags)?;
        self.validate_column_tags(&table.columns)?;

        debug!("Validated table {}", table.fully_qualified_name);
        Ok(())
    }

    /// Structural checks on a column forest: names, lengths, element types,
    /// display shapes and sibling uniqueness
    pub fn validate_columns(&self, columns: &[Column]) -> Result<()> {
        self.validate_level(columns, "")
    }

    fn validate_level(&self, columns: &[Column], prefix: &str) -> Result<()> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in columns {
            if !seen.insert(column.name.as_str()) {
                return Err(CatalogError::DuplicateColumnName(column.name.clone()));
            }
            let path = self.resolver.child_fqn(prefix, &column.name);
            self.validate_column(column, &path)?;
            self.validate_level(&column.children, &path)?;
        }
        Ok(())
    }

    fn validate_column(&self, column: &Column, path: &str) -> Result<()> {
        self.resolver.validate_name(&column.name)?;

        if column.data_type.requires_length() && column.data_length.unwrap_or(0) == 0 {
            return Err(CatalogError::MissingDataLength(path.to_string()));
        }

        if column.data_type == ColumnDataType::Array && column.array_data_type.is_none() {
            return Err(CatalogError::MissingArrayType(path.to_string()));
        }

        if column.data_type.is_complex() {
            check_display_shape(column, path)?;
        }

        Ok(())
    }

    /// Every label must name an existing tag
    pub fn validate_tags(&self, tags: &[TagLabel]) -> Result<()> {
        for label in tags {
            if !self.tags.tag_exists(&label.tag_fqn) {
                return Err(CatalogError::reference_not_found(entity_types::TAG, &label.tag_fqn));
            }
        }
        Ok(())
    }

    fn validate_column_tags(&self, columns: &[Column]) -> Result<()> {
        for column in columns {
            self.validate_tags(&column.tags)?;
            self.validate_column_tags(&column.children)?;
        }
        Ok(())
    }

    /// Owners are users or teams that exist
    pub fn validate_owner(&self, owner: &EntityReference) -> Result<()> {
        match owner.entity_type.as_str() {
            entity_types::USER | entity_types::TEAM => {}
            other => return Err(CatalogError::InvalidOwnerType(other.to_string())),
        }
        if !self.principals.principal_exists(owner) {
            return Err(CatalogError::reference_not_found(&owner.entity_type, owner.id));
        }
        Ok(())
    }
}

fn check_display_shape(column: &Column, path: &str) -> Result<()> {
    let type_name = column.data_type.display_name();
    let expected_prefix = format!("{}<", type_name);
    let valid = column
        .data_type_display
        .as_deref()
        .map(|d| d.trim().to_lowercase())
        .map(|d| d.starts_with(&expected_prefix) && d.ends_with('>'))
        .unwrap_or(false);

    if valid {
        return Ok(());
    }

    let expected = match column.data_type {
        ColumnDataType::Array => "array<arrayDataType>".to_string(),
        _ => format!("{}<...>", type_name),
    };
    Err(CatalogError::DataTypeDisplayMismatch {
        column: path.to_string(),
        data_type: type_name.to_string(),
        expected,
    })
}

/// Canonical form of a column forest: complex display types lowercased,
/// duplicate tag labels on the same column dropped
pub fn normalize_columns(columns: &mut [Column]) {
    for column in columns.iter_mut() {
        if column.data_type.is_complex() {
            if let Some(display) = column.data_type_display.as_mut() {
                *display = display.trim().to_lowercase();
            }
        }
        dedupe_tags(&mut column.tags);
        normalize_columns(&mut column.children);
    }
}

/// Drop repeated labels, keeping the first occurrence
pub fn dedupe_tags(tags: &mut Vec<TagLabel>) {
    let mut seen = HashSet::new();
    tags.retain(|label| seen.insert(label.tag_fqn.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TableConstraint, ConstraintType, TableType};
    use crate::registry::{MockPrincipalRegistry, MockTagRegistry};
    use chrono::Utc;
    use rstest::rstest;
    use uuid::Uuid;

    fn permissive_tags() -> MockTagRegistry {
        let mut tags = MockTagRegistry::new();
        tags.expect_tag_exists().returning(|_| true);
        tags
    }

    fn permissive_principals() -> MockPrincipalRegistry {
        let mut principals = MockPrincipalRegistry::new();
        principals.expect_principal_exists().returning(|_| true);
        principals
    }

    fn table(columns: Vec<Column>) -> Table {
        Table {
            id: Uuid::new_v4(),
            name: "t1".to_string(),
            fully_qualified_name: "svc.db.t1".to_string(),
            version: Default::default(),
            updated_at: Utc::now(),
            updated_by: "admin".to_string(),
            description: None,
            table_type: None,
            owner: None,
            database: None,
            columns,
            table_constraints: None,
            tags: Vec::new(),
            view_definition: None,
            change_description: None,
            joins: None,
            sample_data: None,
            table_profile: None,
        }
    }

    #[rstest]
    #[case::varchar_without_length(
        vec![Column::new("c1", ColumnDataType::Varchar)],
        "For column data types char, varchar, binary, varbinary dataLength must not be null"
    )]
    #[case::array_without_element(
        vec![Column::new("c1", ColumnDataType::Array).with_data_type_display("array<int>")],
        "For column data type array, arrayDataType must not be null"
    )]
    #[case::array_bad_display(
        vec![Column::new("c1", ColumnDataType::Array)
            .with_array_data_type(ColumnDataType::Int)
            .with_data_type_display("int")],
        "For column data type array, dataTypeDisplay must be of type array<arrayDataType>"
    )]
    #[case::struct_without_display(
        vec![Column::new("c1", ColumnDataType::Struct)
            .with_children(vec![Column::new("a", ColumnDataType::Int)])],
        "For column data type struct, dataTypeDisplay must be of type struct<...>"
    )]
    #[case::duplicate_sibling(
        vec![Column::new("c1", ColumnDataType::Int), Column::new("c1", ColumnDataType::Bigint)],
        "Column name c1 is repeated"
    )]
    #[case::duplicate_nested(
        vec![Column::new("c2", ColumnDataType::Struct)
            .with_data_type_display("struct<a:int,a:int>")
            .with_children(vec![
                Column::new("a", ColumnDataType::Int),
                Column::new("a", ColumnDataType::Int),
            ])],
        "Column name a is repeated"
    )]
    #[case::empty_name(
        vec![Column::new("", ColumnDataType::Int)],
        "[name size must be between 1 and 64]"
    )]
    fn test_invalid_columns(#[case] columns: Vec<Column>, #[case] message: &str) {
        let resolver = FqnResolver::default();
        let tags = permissive_tags();
        let principals = permissive_principals();
        let validator = SchemaValidator::new(&resolver, &tags, &principals);

        let err = validator.validate_columns(&columns).unwrap_err();
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn test_valid_complex_columns() {
        let resolver = FqnResolver::default();
        let tags = permissive_tags();
        let principals = permissive_principals();
        let validator = SchemaValidator::new(&resolver, &tags, &principals);

        let columns = vec![
            Column::new("c1", ColumnDataType::Array)
                .with_array_data_type(ColumnDataType::Int)
                .with_data_type_display("ARRAY<int>"),
            Column::new("c2", ColumnDataType::Varchar).with_data_length(10),
            Column::new("c3", ColumnDataType::Struct)
                .with_data_type_display("struct<a:char(1)>")
                .with_children(vec![Column::new("a", ColumnDataType::Char).with_data_length(1)]),
        ];
        assert!(validator.validate_columns(&columns).is_ok());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let resolver = FqnResolver::default();
        let mut tags = MockTagRegistry::new();
        tags.expect_tag_exists()
            .returning(|fqn| fqn != "PII.Missing");
        let principals = permissive_principals();
        let validator = SchemaValidator::new(&resolver, &tags, &principals);

        let columns = vec![Column::new("c1", ColumnDataType::Struct)
            .with_data_type_display("struct<a:int>")
            .with_children(vec![Column::new("a", ColumnDataType::Int)
                .with_tags(vec![TagLabel::new("PII.Missing")])])];

        let err = validator.validate_table(&table(columns)).unwrap_err();
        assert_eq!(err.to_string(), "tag instance for PII.Missing not found");
    }

    #[test]
    fn test_view_definition_requires_view() {
        let resolver = FqnResolver::default();
        let tags = permissive_tags();
        let principals = permissive_principals();
        let validator = SchemaValidator::new(&resolver, &tags, &principals);

        let mut t = table(vec![Column::new("c1", ColumnDataType::Int)]);
        t.view_definition = Some("select * from t0".to_string());
        assert!(matches!(validator.validate_table(&t), Err(CatalogError::InvalidViewDefinition)));

        t.table_type = Some(TableType::SecureView);
        assert!(validator.validate_table(&t).is_ok());
    }

    #[test]
    fn test_owner_rules() {
        let resolver = FqnResolver::default();
        let tags = permissive_tags();
        let mut principals = MockPrincipalRegistry::new();
        principals.expect_principal_exists().times(1).returning(|_| false);
        let validator = SchemaValidator::new(&resolver, &tags, &principals);

        let err = validator
            .validate_owner(&EntityReference::new(Uuid::new_v4(), "database"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidOwnerType(ref t) if t == "database"));

        let missing = EntityReference::new(Uuid::nil(), "user");
        let err = validator.validate_owner(&missing).unwrap_err();
        assert_eq!(
            err.to_string(),
            "user instance for 00000000-0000-0000-0000-000000000000 not found"
        );
    }

    #[test]
    fn test_constraint_columns_must_exist() {
        let resolver = FqnResolver::default();
        let tags = permissive_tags();
        let principals = permissive_principals();
        let validator = SchemaValidator::new(&resolver, &tags, &principals);

        let mut t = table(vec![Column::new("c1", ColumnDataType::Int)]);
        t.table_constraints = Some(vec![TableConstraint::new(
            ConstraintType::Unique,
            vec!["c1".to_string(), "c9".to_string()],
        )]);
        let err = validator.validate_table(&t).unwrap_err();
        assert_eq!(err.to_string(), "Invalid column name c9");
    }

    #[test]
    fn test_normalize_columns() {
        let mut columns = vec![Column::new("c1", ColumnDataType::Array)
            .with_array_data_type(ColumnDataType::Int)
            .with_data_type_display(" ARRAY<INT> ")
            .with_tags(vec![TagLabel::new("user.address"), TagLabel::new("user.address")])];

        normalize_columns(&mut columns);
        assert_eq!(columns[0].data_type_display.as_deref(), Some("array<int>"));
        assert_eq!(columns[0].tags.len(), 1);
    }
}
