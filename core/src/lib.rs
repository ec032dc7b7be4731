//! # Catalog Revision Core
//!
//! Change tracking for metadata catalog tables. Every write is validated,
//! diffed against the stored revision down to nested columns, classified as a
//! major or minor version bump, and persisted together with the tag-usage
//! deltas it implies. Join counts, profiles and sample data are kept beside
//! the versioned entity as dated aggregates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod diff;
pub mod error;
pub mod fields;
pub mod fqn;
pub mod ledger;
pub mod models;
pub mod registry;
pub mod schema;
pub mod store;
pub mod utils;

/// Re-export common types for ease of use
pub use classifier::{ChangeClassifier, Classification};
pub use config::{ClassifierPolicy, EngineConfig};
pub use controller::{Collaborators, RevisionController, WriteOutcome, WriteStage};
pub use diff::{ChangeSet, WriteMode};
pub use error::{CatalogError, ErrorKind, Result};
pub use fields::Fields;
pub use ledger::TagUsageLedger;
pub use models::{Column, CreateTable, EntityVersion, Table, UpdateType};
pub use registry::InMemoryRegistry;
pub use store::{EntityStore, InMemoryEntityStore};

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the `env_logger` backend at the configured level.
///
/// `RUST_LOG` still takes precedence. Calling this more than once is harmless;
/// only the first call installs a logger.
pub fn init_logging(config: &EngineConfig) {
    let env = env_logger::Env::default().default_filter_or(config.log_level.clone());
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
