//! Error types for the core crate
//!
//! This module provides a consolidated error type for the revision engine.
//! Every failure aborts exactly the write that triggered it; nothing here is
//! fatal to the process.

use thiserror::Error;
use std::io;

/// Coarse classification of a [`CatalogError`], used by the request layer to
/// pick a response status without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input
    Validation,

    /// PATCH attempted a structural schema change
    ImmutabilityViolation,

    /// A referenced owner, database, tag or column does not exist
    ReferenceNotFound,

    /// Join report outside of the accepted date window
    StaleJoinReport,

    /// Concurrent write detected by storage
    VersionConflict,

    /// Target entity does not exist
    NotFound,

    /// Target entity already exists
    Conflict,

    /// Internal state or I/O failure
    Internal,
}

/// Core error type
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Entity or column name is empty or too long
    #[error("[name size must be between 1 and {max}]")]
    InvalidName {
        /// Offending name
        name: String,
        /// Maximum accepted length
        max: usize,
    },

    /// Fixed or variable length type declared without a length
    #[error("For column data types char, varchar, binary, varbinary dataLength must not be null")]
    MissingDataLength(String),

    /// ARRAY column without element type
    #[error("For column data type array, arrayDataType must not be null")]
    MissingArrayType(String),

    /// dataTypeDisplay does not match the bracketed shape for the column type
    #[error("For column data type {data_type}, dataTypeDisplay must be of type {expected}")]
    DataTypeDisplayMismatch {
        /// Column path
        column: String,
        /// Lowercase data type name
        data_type: String,
        /// Expected shape
        expected: String,
    },

    /// Two siblings share a name
    #[error("Column name {0} is repeated")]
    DuplicateColumnName(String),

    /// Sample data row does not have one value per declared column
    #[error("Number of columns is {expected} but row has {actual} sample values")]
    RowArity {
        /// Number of declared columns
        expected: usize,
        /// Number of values in the row
        actual: usize,
    },

    /// Column name not part of the table
    #[error("Invalid column name {0}")]
    UnknownColumn(String),

    /// View definition on a table type that cannot carry one
    #[error("ViewDefinition can only be set on TableType View, SecureView or MaterializedView")]
    InvalidViewDefinition,

    /// Owner reference with an unsupported type
    #[error("Invalid owner type {0}, type must be user or team")]
    InvalidOwnerType(String),

    /// Unknown field requested in a projection
    #[error("Invalid field name {0}")]
    InvalidField(String),

    /// PATCH tried to add, remove or retype a column
    #[error("Columns can't be added, deleted or have their data type changed through patch: {0}")]
    SchemaImmutable(String),

    /// Referenced entity does not exist
    #[error("{entity_type} instance for {id} not found")]
    ReferenceNotFound {
        /// Kind of the referenced entity
        entity_type: String,
        /// Identifier as supplied by the caller
        id: String,
    },

    /// Join report column does not resolve to an existing column
    #[error("Invalid fully qualified column name {0}")]
    InvalidColumnFqn(String),

    /// Join report covering no days
    #[error("Join report dayCount must be at least 1, got {0}")]
    InvalidDayCount(u32),

    /// Join report date outside of the accepted window
    #[error("Date range can only include past {window_days} days starting today")]
    StaleJoinReport {
        /// Width of the window in days
        window_days: u32,
    },

    /// Storage rejected a write because the stored version moved
    #[error("Version conflict on {fqn}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Entity fully qualified name
        fqn: String,
        /// Version the writer started from
        expected: String,
        /// Version currently stored
        actual: String,
    },

    /// Entity lookup failed
    #[error("{entity_type} instance for {id} not found")]
    EntityNotFound {
        /// Kind of the entity
        entity_type: String,
        /// Identifier used for the lookup
        id: String,
    },

    /// Create of an entity whose FQN is taken
    #[error("Entity already exists: {0}")]
    EntityAlreadyExists(String),

    /// Tag usage ledger inconsistency
    #[error("Tag usage ledger error: {0}")]
    LedgerError(String),

    /// State management error
    #[error("State management error: {0}")]
    StateError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CatalogError {
    /// Map the error onto the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::InvalidName { .. }
            | CatalogError::MissingDataLength(_)
            | CatalogError::MissingArrayType(_)
            | CatalogError::DataTypeDisplayMismatch { .. }
            | CatalogError::DuplicateColumnName(_)
            | CatalogError::RowArity { .. }
            | CatalogError::UnknownColumn(_)
            | CatalogError::InvalidViewDefinition
            | CatalogError::InvalidOwnerType(_)
            | CatalogError::InvalidField(_)
            | CatalogError::InvalidDayCount(_) => ErrorKind::Validation,
            CatalogError::SchemaImmutable(_) => ErrorKind::ImmutabilityViolation,
            CatalogError::ReferenceNotFound { .. }
            | CatalogError::InvalidColumnFqn(_) => ErrorKind::ReferenceNotFound,
            CatalogError::StaleJoinReport { .. } => ErrorKind::StaleJoinReport,
            CatalogError::VersionConflict { .. } => ErrorKind::VersionConflict,
            CatalogError::EntityNotFound { .. } => ErrorKind::NotFound,
            CatalogError::EntityAlreadyExists(_) => ErrorKind::Conflict,
            CatalogError::LedgerError(_)
            | CatalogError::StateError(_)
            | CatalogError::ConfigError(_)
            | CatalogError::IoError(_)
            | CatalogError::JsonError(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a missing referenced entity
    pub fn reference_not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        CatalogError::ReferenceNotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing target entity
    pub fn entity_not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        CatalogError::EntityNotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }
}

/// Result type for the core crate
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Convert a string error to a StateError
pub fn to_state_error<E: std::fmt::Display>(err: E) -> CatalogError {
    CatalogError::StateError(err.to_string())
}

/// Convert a string error to a LedgerError
pub fn to_ledger_error<E: std::fmt::Display>(err: E) -> CatalogError {
    CatalogError::LedgerError(err.to_string())
}

/// Convert a string error to a ConfigError
pub fn to_config_error<E: std::fmt::Display>(err: E) -> CatalogError {
    CatalogError::ConfigError(err.to_string())
}
