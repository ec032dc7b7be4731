//! Tag labels attached to tables and columns

use std::fmt::{Display, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};

/// How a label came to be attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LabelType {
    /// Attached by a user
    #[default]
    Manual,

    /// Propagated from a related entity
    Propagated,

    /// Attached by an automated process
    Automated,

    /// Derived from another tag
    Derived,
}

/// Review state of a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TagState {
    /// Proposed but not confirmed
    Suggested,

    /// Confirmed
    #[default]
    Confirmed,
}

/// Reference to a classification tag by its `category.tag` name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagLabel {
    /// Fully qualified tag name
    #[serde(rename = "tagFQN")]
    pub tag_fqn: String,

    /// How the label was attached
    #[serde(default)]
    pub label_type: LabelType,

    /// Review state
    #[serde(default)]
    pub state: TagState,
}

impl TagLabel {
    /// Create a manually attached, confirmed label
    pub fn new(tag_fqn: impl Into<String>) -> Self {
        TagLabel {
            tag_fqn: tag_fqn.into(),
            label_type: LabelType::Manual,
            state: TagState::Confirmed,
        }
    }

    /// Category prefix of the tag (`user` for `user.address`)
    pub fn category(&self) -> &str {
        category_of(&self.tag_fqn)
    }
}

impl Display for TagLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.tag_fqn)
    }
}

/// Category prefix of a tag FQN
pub fn category_of(tag_fqn: &str) -> &str {
    tag_fqn.split('.').next().unwrap_or(tag_fqn)
}
