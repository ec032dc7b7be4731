//! Tabular sample data

use chrono::NaiveDate;
use serde::{Serialize, Deserialize};
use serde_json::Value;

/// Rows of sample values for a list of columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    /// Column names, in row order
    pub columns: Vec<String>,

    /// Rows; each must hold one value per column
    pub rows: Vec<Vec<Value>>,
}

impl TableData {
    /// Sample data for columns and rows
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        TableData { columns, rows }
    }
}

/// Sample data captured on one calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleData {
    /// Capture date
    pub sample_date: NaiveDate,

    /// Samples
    #[serde(flatten)]
    pub data: TableData,
}
