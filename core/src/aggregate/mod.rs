//! Time-windowed aggregates attached to tables
//!
//! Two independent policies: a rolling join-count window per column pair and
//! dated snapshot series (profiles, sample data) with upsert-by-date.

pub mod joins;
pub mod snapshot;

pub use joins::{resolve_column_fqn, ColumnRef, JoinWindow};
pub use snapshot::{validate_profile, validate_sample_data, Dated, SnapshotSeries};
