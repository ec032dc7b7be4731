//! Entity versions and change descriptions

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};

/// Entity version in `major.minor` form.
///
/// Stored as a count of tenths so repeated minor bumps never drift. The first
/// version of an entity is `0.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct EntityVersion {
    tenths: u32,
}

impl EntityVersion {
    /// Version assigned on creation
    pub const INITIAL: EntityVersion = EntityVersion { tenths: 1 };

    /// Build a version from a number of tenths (`11` is `1.1`)
    pub fn from_tenths(tenths: u32) -> Self {
        EntityVersion { tenths }
    }

    /// Number of tenths
    pub fn tenths(&self) -> u32 {
        self.tenths
    }

    /// Previous version plus 0.1
    pub fn next_minor(&self) -> Self {
        EntityVersion { tenths: self.tenths + 1 }
    }

    /// floor(version) + 1
    pub fn next_major(&self) -> Self {
        EntityVersion { tenths: (self.tenths / 10 + 1) * 10 }
    }

    /// Decimal value
    pub fn as_f64(&self) -> f64 {
        f64::from(self.tenths) / 10.0
    }
}

impl Default for EntityVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl From<EntityVersion> for f64 {
    fn from(version: EntityVersion) -> f64 {
        version.as_f64()
    }
}

impl TryFrom<f64> for EntityVersion {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value < 0.1 - f64::EPSILON {
            return Err(format!("invalid entity version {}", value));
        }
        let tenths = (value * 10.0).round();
        if (tenths / 10.0 - value).abs() > 1e-6 {
            return Err(format!("entity version {} is not a multiple of 0.1", value));
        }
        Ok(EntityVersion { tenths: tenths as u32 })
    }
}

impl Display for EntityVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}.{}", self.tenths / 10, self.tenths % 10)
    }
}

/// Classification of an accepted write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    /// Entity did not exist before the write
    Created,

    /// No field differs; version unchanged
    NoChange,

    /// Metadata-only change; version + 0.1
    MinorUpdate,

    /// Structural change; floor(version) + 1
    MajorUpdate,
}

impl UpdateType {
    /// Version after applying this classification to `previous`
    pub fn apply(&self, previous: EntityVersion) -> EntityVersion {
        match self {
            UpdateType::Created => EntityVersion::INITIAL,
            UpdateType::NoChange => previous,
            UpdateType::MinorUpdate => previous.next_minor(),
            UpdateType::MajorUpdate => previous.next_major(),
        }
    }
}

impl Display for UpdateType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UpdateType::Created => write!(f, "created"),
            UpdateType::NoChange => write!(f, "no-change"),
            UpdateType::MinorUpdate => write!(f, "minor"),
            UpdateType::MajorUpdate => write!(f, "major"),
        }
    }
}

/// Fields added, updated and deleted between two revisions of an entity.
///
/// Top-level attributes use their plain name (`description`); column scoped
/// changes use `column:<dotted-path>` or `column:<dotted-path>.<attribute>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDescription {
    /// Fields added
    #[serde(default)]
    pub fields_added: BTreeSet<String>,

    /// Fields updated
    #[serde(default)]
    pub fields_updated: BTreeSet<String>,

    /// Fields deleted
    #[serde(default)]
    pub fields_deleted: BTreeSet<String>,

    /// Version the change was applied to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<EntityVersion>,
}

impl ChangeDescription {
    /// Empty change description against `previous_version`
    pub fn new(previous_version: EntityVersion) -> Self {
        ChangeDescription {
            previous_version: Some(previous_version),
            ..Default::default()
        }
    }

    /// Add an expected added field, builder style
    pub fn added(mut self, field: impl Into<String>) -> Self {
        self.fields_added.insert(field.into());
        self
    }

    /// Add an expected updated field, builder style
    pub fn updated(mut self, field: impl Into<String>) -> Self {
        self.fields_updated.insert(field.into());
        self
    }

    /// Add an expected deleted field, builder style
    pub fn deleted(mut self, field: impl Into<String>) -> Self {
        self.fields_deleted.insert(field.into());
        self
    }

    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.fields_added.is_empty() && self.fields_updated.is_empty() && self.fields_deleted.is_empty()
    }

    /// Total number of recorded field changes
    pub fn len(&self) -> usize {
        self.fields_added.len() + self.fields_updated.len() + self.fields_deleted.len()
    }
}

/// All persisted versions of one entity, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityVersionHistory {
    /// Entity type, such as `table`
    pub entity_type: String,

    /// Serialized entity versions
    pub versions: Vec<serde_json::Value>,
}
