//! Column tree differ
//!
//! Columns are matched by name at each level of the tree, never by position.
//! A matched column whose effective type changed is reported as deleted and
//! added under the same path; it is never updated in place.

use std::collections::HashMap;

use super::{ChangeKind, ChangeSet, ChangeTarget, WriteMode};
use crate::error::{CatalogError, Result};
use crate::models::Column;

/// Diff two column forests into `changes`.
///
/// In [`WriteMode::Patch`] any column addition, removal or type change fails
/// with [`CatalogError::SchemaImmutable`] naming the column path.
pub fn diff_columns(
    old: &[Column],
    new: &[Column],
    mode: WriteMode,
    changes: &mut ChangeSet,
) -> Result<()> {
    diff_level(old, new, "", mode, changes)
}

fn diff_level(
    old: &[Column],
    new: &[Column],
    prefix: &str,
    mode: WriteMode,
    changes: &mut ChangeSet,
) -> Result<()> {
    let old_by_name = index_by_name(old)?;
    let new_by_name = index_by_name(new)?;

    for old_column in old {
        let path = column_path(prefix, &old_column.name);
        match new_by_name.get(old_column.name.as_str()) {
            None => {
                reject_in_patch(mode, &path)?;
                changes.push(field(&path), ChangeKind::Deleted, ChangeTarget::Column);
            }
            Some(new_column) if !old_column.same_type(new_column) => {
                reject_in_patch(mode, &path)?;
                changes.push(field(&path), ChangeKind::Deleted, ChangeTarget::Column);
                changes.push(field(&path), ChangeKind::Added, ChangeTarget::Column);
            }
            Some(new_column) => {
                diff_attributes(old_column, new_column, &path, changes);
                diff_level(&old_column.children, &new_column.children, &path, mode, changes)?;
            }
        }
    }

    for new_column in new {
        if !old_by_name.contains_key(new_column.name.as_str()) {
            let path = column_path(prefix, &new_column.name);
            reject_in_patch(mode, &path)?;
            changes.push(field(&path), ChangeKind::Added, ChangeTarget::Column);
        }
    }

    Ok(())
}

/// Siblings by name; a repeated name cannot be matched
fn index_by_name(columns: &[Column]) -> Result<HashMap<&str, &Column>> {
    let mut by_name = HashMap::with_capacity(columns.len());
    for column in columns {
        if by_name.insert(column.name.as_str(), column).is_some() {
            return Err(CatalogError::DuplicateColumnName(column.name.clone()));
        }
    }
    Ok(by_name)
}

fn diff_attributes(old: &Column, new: &Column, path: &str, changes: &mut ChangeSet) {
    use ChangeTarget::ColumnAttribute;
    let attr = |name: &str| format!("column:{}.{}", path, name);

    changes.compare(attr("description"), old.description.as_ref(), new.description.as_ref(), ColumnAttribute);
    changes.compare(attr("constraint"), old.constraint.as_ref(), new.constraint.as_ref(), ColumnAttribute);
    changes.compare(
        attr("ordinalPosition"),
        old.ordinal_position.as_ref(),
        new.ordinal_position.as_ref(),
        ColumnAttribute,
    );
    changes.compare(
        attr("dataTypeDisplay"),
        old.data_type_display.as_ref(),
        new.data_type_display.as_ref(),
        ColumnAttribute,
    );
    changes.compare(attr("dataLength"), old.data_length.as_ref(), new.data_length.as_ref(), ColumnAttribute);
    changes.compare_tags(attr("tags"), &old.tags, &new.tags, ColumnAttribute);
}

fn reject_in_patch(mode: WriteMode, path: &str) -> Result<()> {
    match mode {
        WriteMode::Patch => Err(CatalogError::SchemaImmutable(path.to_string())),
        WriteMode::Put => Ok(()),
    }
}

fn column_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn field(path: &str) -> String {
    format!("column:{}", path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeDescription, ColumnConstraint, ColumnDataType, EntityVersion, TagLabel};

    fn describe(old: &[Column], new: &[Column], mode: WriteMode) -> Result<ChangeDescription> {
        let mut changes = ChangeSet::new();
        diff_columns(old, new, mode, &mut changes)?;
        Ok(changes.to_description(EntityVersion::INITIAL))
    }

    fn names(set: &std::collections::BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    fn struct_column(tags: Vec<TagLabel>) -> Column {
        // c2 struct<a:int,b:char,c:struct<d:int,e:struct<f:int>>>
        Column::new("c2", ColumnDataType::Struct)
            .with_data_type_display("struct<a:int,b:char,c:struct<d:int,e:struct<f:int>>>")
            .with_children(vec![
                Column::new("a", ColumnDataType::Int),
                Column::new("b", ColumnDataType::Char).with_data_length(1).with_tags(tags),
                Column::new("c", ColumnDataType::Struct)
                    .with_data_type_display("struct<d:int,e:struct<f:int>>")
                    .with_children(vec![
                        Column::new("d", ColumnDataType::Int),
                        Column::new("e", ColumnDataType::Struct)
                            .with_data_type_display("struct<f:int>")
                            .with_children(vec![Column::new("f", ColumnDataType::Int)]),
                    ]),
            ])
    }

    #[test]
    fn test_type_change_is_delete_then_add() {
        let old = vec![Column::new("c1", ColumnDataType::Array).with_array_data_type(ColumnDataType::Int)];
        let new = vec![Column::new("c1", ColumnDataType::Array).with_array_data_type(ColumnDataType::Char)];

        let description = describe(&old, &new, WriteMode::Put).unwrap();
        assert_eq!(names(&description.fields_added), vec!["column:c1"]);
        assert_eq!(names(&description.fields_deleted), vec!["column:c1"]);
        assert!(description.fields_updated.is_empty());
    }

    #[test]
    fn test_match_by_name_not_position() {
        let old = vec![
            Column::new("c1", ColumnDataType::Bigint),
            Column::new("c2", ColumnDataType::Bigint),
        ];
        let new = vec![
            Column::new("c2", ColumnDataType::Bigint),
            Column::new("c1", ColumnDataType::Bigint),
        ];
        assert!(describe(&old, &new, WriteMode::Put).unwrap().is_empty());
    }

    #[test]
    fn test_nested_tag_transitions() {
        let tag = || vec![TagLabel::new("user.address")];
        let old = vec![struct_column(Vec::new())];
        let tagged = vec![struct_column(tag())];

        let added = describe(&old, &tagged, WriteMode::Patch).unwrap();
        assert_eq!(names(&added.fields_added), vec!["column:c2.b.tags"]);

        let retagged = vec![struct_column(vec![TagLabel::new("user.bank_account")])];
        let updated = describe(&tagged, &retagged, WriteMode::Patch).unwrap();
        assert_eq!(names(&updated.fields_updated), vec!["column:c2.b.tags"]);

        let deleted = describe(&tagged, &old, WriteMode::Patch).unwrap();
        assert_eq!(names(&deleted.fields_deleted), vec!["column:c2.b.tags"]);
    }

    #[test]
    fn test_nested_column_removal_in_put() {
        let old = vec![struct_column(Vec::new())];
        let mut new = vec![struct_column(Vec::new())];
        new[0].children[2].children.pop();

        let description = describe(&old, &new, WriteMode::Put).unwrap();
        assert_eq!(names(&description.fields_deleted), vec!["column:c2.c.e"]);
    }

    #[test]
    fn test_patch_rejects_schema_change() {
        let old = vec![Column::new("c1", ColumnDataType::Bigint), struct_column(Vec::new())];

        let removed = vec![Column::new("c1", ColumnDataType::Bigint)];
        let err = describe(&old, &removed, WriteMode::Patch).unwrap_err();
        assert!(matches!(err, CatalogError::SchemaImmutable(ref p) if p == "c2"));

        let mut nested_added = old.clone();
        nested_added[1].children.push(Column::new("z", ColumnDataType::Int));
        let err = describe(&old, &nested_added, WriteMode::Patch).unwrap_err();
        assert!(matches!(err, CatalogError::SchemaImmutable(ref p) if p == "c2.z"));

        let retyped = vec![Column::new("c1", ColumnDataType::Int), struct_column(Vec::new())];
        assert!(describe(&old, &retyped, WriteMode::Patch).is_err());
    }

    #[test]
    fn test_constraint_changes() {
        let old = vec![Column::new("c1", ColumnDataType::Bigint).with_constraint(ColumnConstraint::Null)];
        let tightened = vec![Column::new("c1", ColumnDataType::Bigint).with_constraint(ColumnConstraint::NotNull)];
        let dropped = vec![Column::new("c1", ColumnDataType::Bigint)];

        let description = describe(&old, &tightened, WriteMode::Patch).unwrap();
        assert_eq!(names(&description.fields_updated), vec!["column:c1.constraint"]);

        let description = describe(&old, &dropped, WriteMode::Patch).unwrap();
        assert_eq!(names(&description.fields_deleted), vec!["column:c1.constraint"]);
    }

    #[test]
    fn test_data_length_change() {
        let old = vec![Column::new("c2", ColumnDataType::Varchar).with_data_length(10)];
        let new = vec![Column::new("c2", ColumnDataType::Varchar).with_data_length(20)];

        let description = describe(&old, &new, WriteMode::Patch).unwrap();
        assert_eq!(names(&description.fields_updated), vec!["column:c2.dataLength"]);
    }

    #[test]
    fn test_repeated_sibling_names_are_rejected() {
        let old = vec![Column::new("c1", ColumnDataType::Bigint), struct_column(Vec::new())];

        let mut repeated = old.clone();
        repeated.push(Column::new("c1", ColumnDataType::Int));
        let err = describe(&old, &repeated, WriteMode::Put).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateColumnName(ref c) if c == "c1"));

        let mut nested = old.clone();
        nested[1].children.push(Column::new("a", ColumnDataType::Int));
        let err = describe(&nested, &old, WriteMode::Put).unwrap_err();
        assert_eq!(err.to_string(), "Column name a is repeated");
    }
}
