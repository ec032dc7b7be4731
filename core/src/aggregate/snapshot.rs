//! Dated snapshot series
//!
//! At most one record per entity and calendar date. Upserting a date that is
//! already present replaces its record; lists are newest first.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use chrono::NaiveDate;
use log::debug;
use uuid::Uuid;

use crate::error::{to_state_error, CatalogError, Result};
use crate::fqn::FqnResolver;
use crate::models::column::find_column;
use crate::models::{SampleData, Table, TableData, TableProfile};

/// Records keyed by calendar date
pub trait Dated {
    /// Date the record belongs to
    fn date(&self) -> NaiveDate;
}

impl Dated for TableProfile {
    fn date(&self) -> NaiveDate {
        self.profile_date
    }
}

impl Dated for SampleData {
    fn date(&self) -> NaiveDate {
        self.sample_date
    }
}

/// Dated records per entity
#[derive(Debug)]
pub struct SnapshotSeries<T> {
    series: RwLock<HashMap<Uuid, BTreeMap<NaiveDate, T>>>,
}

impl<T> Default for SnapshotSeries<T> {
    fn default() -> Self {
        SnapshotSeries {
            series: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Dated + Clone> SnapshotSeries<T> {
    /// Create an empty series store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for its date; returns the replaced record
    pub fn upsert(&self, entity_id: Uuid, record: T) -> Result<Option<T>> {
        let mut series = self.series.write()
            .map_err(|e| to_state_error(format!("Failed to lock snapshot series: {}", e)))?;
        let date = record.date();
        let replaced = series.entry(entity_id).or_default().insert(date, record);
        debug!(
            "{} snapshot for {} on {}",
            if replaced.is_some() { "Replaced" } else { "Inserted" },
            entity_id,
            date
        );
        Ok(replaced)
    }

    /// Records of an entity, newest first
    pub fn list(&self, entity_id: &Uuid) -> Result<Vec<T>> {
        let series = self.series.read()
            .map_err(|e| to_state_error(format!("Failed to read snapshot series: {}", e)))?;
        Ok(series
            .get(entity_id)
            .map(|records| records.values().rev().cloned().collect())
            .unwrap_or_default())
    }
}

/// Sample columns must exist in the table and every row must hold one value
/// per column
pub fn validate_sample_data(resolver: &FqnResolver, table: &Table, data: &TableData) -> Result<()> {
    for name in &data.columns {
        ensure_column(resolver, table, name)?;
    }
    for row in &data.rows {
        if row.len() != data.columns.len() {
            return Err(CatalogError::RowArity {
                expected: data.columns.len(),
                actual: row.len(),
            });
        }
    }
    Ok(())
}

/// Every profiled column must exist in the table
pub fn validate_profile(resolver: &FqnResolver, table: &Table, profile: &TableProfile) -> Result<()> {
    for column in &profile.column_profile {
        ensure_column(resolver, table, &column.name)?;
    }
    Ok(())
}

fn ensure_column(resolver: &FqnResolver, table: &Table, name: &str) -> Result<()> {
    if find_column(&table.columns, &resolver.split(name)).is_none() {
        return Err(CatalogError::UnknownColumn(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, ColumnDataType, ColumnProfile, EntityVersion};
    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 9, day).unwrap()
    }

    fn table() -> Table {
        Table {
            id: Uuid::new_v4(),
            name: "t1".to_string(),
            fully_qualified_name: "svc.db.t1".to_string(),
            version: EntityVersion::INITIAL,
            updated_at: Utc::now(),
            updated_by: "admin".to_string(),
            description: None,
            table_type: None,
            owner: None,
            database: None,
            columns: vec![
                Column::new("c1", ColumnDataType::Bigint),
                Column::new("c2", ColumnDataType::Varchar).with_data_length(10),
                Column::new("c3", ColumnDataType::Bigint),
            ],
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
    fn test_upsert_by_date() {
        let series: SnapshotSeries<TableProfile> = SnapshotSeries::new();
        let id = Uuid::new_v4();

        series.upsert(id, TableProfile::new(date(8), 1.0, Vec::new())).unwrap();
        series.upsert(id, TableProfile::new(date(10), 3.0, Vec::new())).unwrap();
        series.upsert(id, TableProfile::new(date(9), 2.0, Vec::new())).unwrap();
        let replaced = series.upsert(id, TableProfile::new(date(9), 20.0, Vec::new())).unwrap();

        assert_eq!(replaced.and_then(|p| p.row_count), Some(2.0));
        let profiles = series.list(&id).unwrap();
        let dates: Vec<NaiveDate> = profiles.iter().map(|p| p.profile_date).collect();
        assert_eq!(dates, vec![date(10), date(9), date(8)]);
        assert_eq!(profiles[1].row_count, Some(20.0));
        assert!(series.list(&Uuid::new_v4()).unwrap().is_empty());
    }

    #[rstest]
    #[case::unknown_column(
        vec!["c1", "invalidColumn"],
        vec![vec![json!(1), json!("a")]],
        "Invalid column name invalidColumn"
    )]
    #[case::row_too_long(
        vec!["c1", "c2", "c3"],
        vec![vec![json!(1), json!("a"), json!(2)], vec![json!(1), json!("a"), json!(2), json!(3)]],
        "Number of columns is 3 but row has 4 sample values"
    )]
    #[case::row_too_short(
        vec!["c1", "c2"],
        vec![vec![json!(1)]],
        "Number of columns is 2 but row has 1 sample values"
    )]
    fn test_invalid_sample_data(
        #[case] columns: Vec<&str>,
        #[case] rows: Vec<Vec<serde_json::Value>>,
        #[case] message: &str,
    ) {
        let data = TableData::new(columns.into_iter().map(String::from).collect(), rows);
        let err = validate_sample_data(&FqnResolver::default(), &table(), &data).unwrap_err();
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn test_valid_sample_subset() {
        let data = TableData::new(
            vec!["c3".to_string(), "c1".to_string()],
            vec![vec![json!(1), json!(2)], vec![json!(null), json!(4)]],
        );
        assert!(validate_sample_data(&FqnResolver::default(), &table(), &data).is_ok());
    }

    #[test]
    fn test_profile_columns_must_exist() {
        let t = table();
        let resolver = FqnResolver::default();
        let good = TableProfile::new(date(1), 5.0, vec![ColumnProfile::new("c1")]);
        let bad = TableProfile::new(date(1), 5.0, vec![ColumnProfile::new("invalidColumn")]);

        assert!(validate_profile(&resolver, &t, &good).is_ok());
        assert!(matches!(
            validate_profile(&resolver, &t, &bad),
            Err(CatalogError::UnknownColumn(ref c)) if c == "invalidColumn"
        ));
    }
}
