//! Column join reports and their aggregated read-back form

use chrono::NaiveDate;
use serde::{Serialize, Deserialize};

/// One peer column and how often it was joined with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedWith {
    /// Peer column FQN
    pub fully_qualified_name: String,

    /// Join count
    pub join_count: u64,
}

impl JoinedWith {
    /// Peer with a count
    pub fn new(fully_qualified_name: impl Into<String>, join_count: u64) -> Self {
        JoinedWith {
            fully_qualified_name: fully_qualified_name.into(),
            join_count,
        }
    }
}

/// Joins of one local column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnJoin {
    /// Local column name (dotted path for nested columns)
    pub column_name: String,

    /// Peers
    pub joined_with: Vec<JoinedWith>,
}

impl ColumnJoin {
    /// Joins of a local column
    pub fn new(column_name: impl Into<String>, joined_with: Vec<JoinedWith>) -> Self {
        ColumnJoin {
            column_name: column_name.into(),
            joined_with,
        }
    }
}

/// Join counts covering `day_count` days ending at `start_date`.
///
/// As a report this is already aggregated by the caller; on read it holds the
/// totals over the trailing window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableJoins {
    /// Report date; on read, the day before the window opens
    pub start_date: NaiveDate,

    /// Number of days covered
    pub day_count: u32,

    /// Per-column joins
    pub column_joins: Vec<ColumnJoin>,
}

impl TableJoins {
    /// Report for a date range
    pub fn new(start_date: NaiveDate, day_count: u32, column_joins: Vec<ColumnJoin>) -> Self {
        TableJoins {
            start_date,
            day_count,
            column_joins,
        }
    }

    /// Join count of `column_name` with `peer_fqn`, zero when absent
    pub fn count(&self, column_name: &str, peer_fqn: &str) -> u64 {
        self.column_joins
            .iter()
            .filter(|j| j.column_name == column_name)
            .flat_map(|j| j.joined_with.iter())
            .filter(|w| w.fully_qualified_name == peer_fqn)
            .map(|w| w.join_count)
            .sum()
    }
}
