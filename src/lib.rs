/// Catalog Revisions - change tracking and versioning for metadata catalog entities
///
/// This is the root crate that provides workspace-level documentation.
/// Actual implementation is in the subcrates:
/// - `catalog-revision-core`: Column diffing, change classification, tag usage
///   accounting and time-windowed aggregates for catalog entities

/// This module is intentionally empty as the actual implementation
/// is in the subcrates.
/// Returns the version of the package.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
