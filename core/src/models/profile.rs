//! Table profiling statistics

use chrono::NaiveDate;
use serde::{Serialize, Deserialize};

/// Statistics of one column on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    /// Column name
    pub name: String,

    /// Number of distinct values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_count: Option<f64>,

    /// Proportion of distinct values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_proportion: Option<f64>,

    /// Number of nulls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_count: Option<f64>,

    /// Proportion of nulls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_proportion: Option<f64>,

    /// Minimum value, as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,

    /// Maximum value, as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,

    /// Mean value, as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<String>,

    /// Median value, as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<String>,

    /// Standard deviation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev: Option<f64>,
}

impl ColumnProfile {
    /// Empty profile for a column
    pub fn new(name: impl Into<String>) -> Self {
        ColumnProfile {
            name: name.into(),
            unique_count: None,
            unique_proportion: None,
            null_count: None,
            null_proportion: None,
            min: None,
            max: None,
            mean: None,
            median: None,
            stddev: None,
        }
    }
}

/// Profile of a table on one calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableProfile {
    /// Date the profile was taken
    pub profile_date: NaiveDate,

    /// Row count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<f64>,

    /// Column count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_count: Option<f64>,

    /// Per-column statistics
    #[serde(default)]
    pub column_profile: Vec<ColumnProfile>,
}

impl TableProfile {
    /// Profile for a date
    pub fn new(profile_date: NaiveDate, row_count: f64, column_profile: Vec<ColumnProfile>) -> Self {
        TableProfile {
            profile_date,
            row_count: Some(row_count),
            column_count: Some(column_profile.len() as f64),
            column_profile,
        }
    }
}
