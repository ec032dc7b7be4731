//! Version-bump classification
//!
//! Precedence: no change, then major, then minor. Column removals are always
//! major; the [`ClassifierPolicy`] decides whether column additions and table
//! constraint additions/removals are major too.

use log::debug;

use crate::config::ClassifierPolicy;
use crate::diff::{diff_tables, ChangeKind, ChangeSet, ChangeTarget, FieldChange, WriteMode};
use crate::error::Result;
use crate::models::{ChangeDescription, EntityVersion, Table, UpdateType};

/// Outcome of diffing and classifying one write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Fields added, updated and deleted
    pub change_description: ChangeDescription,

    /// Version-bump class
    pub update_type: UpdateType,

    /// Version after the write
    pub version: EntityVersion,
}

/// Maps change sets to version transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeClassifier {
    policy: ClassifierPolicy,
}

impl ChangeClassifier {
    /// Create a classifier with the given policy
    pub fn new(policy: ClassifierPolicy) -> Self {
        ChangeClassifier { policy }
    }

    /// Whether a single change forces a major bump
    pub fn is_major(&self, change: &FieldChange) -> bool {
        match (change.target, change.kind) {
            (ChangeTarget::Column, ChangeKind::Deleted) => true,
            (ChangeTarget::Column, ChangeKind::Added) => self.policy.column_addition_is_major,
            (ChangeTarget::TableConstraints, ChangeKind::Added | ChangeKind::Deleted) => {
                self.policy.table_constraint_presence_is_major
            }
            _ => false,
        }
    }

    /// Classify a change set against the previous version
    pub fn classify(&self, changes: &ChangeSet, previous: EntityVersion) -> (UpdateType, EntityVersion) {
        let update_type = if changes.is_empty() {
            UpdateType::NoChange
        } else if changes.iter().any(|c| self.is_major(c)) {
            UpdateType::MajorUpdate
        } else {
            UpdateType::MinorUpdate
        };
        (update_type, update_type.apply(previous))
    }

    /// Diff two revisions and classify the result
    pub fn diff_and_classify(&self, old: &Table, new: &Table, mode: WriteMode) -> Result<Classification> {
        let changes = diff_tables(old, new, mode)?;
        let (update_type, version) = self.classify(&changes, old.version);
        debug!(
            "{} {} -> {} ({})",
            new.fully_qualified_name, old.version, version, update_type
        );
        Ok(Classification {
            change_description: changes.to_description(old.version),
            update_type,
            version,
        })
    }
}
