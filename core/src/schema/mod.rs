//! Entity validation and version history
//!
//! This module provides the checks every write must pass and the per-entity
//! record of persisted versions.

mod validator;
mod history;

pub use validator::{SchemaValidator, normalize_columns, dedupe_tags};
pub use history::VersionHistory;
