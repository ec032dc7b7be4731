//! Collaborator registries
//!
//! The engine validates tag labels, owners and containing databases against
//! registries it does not own. The traits are the narrow contracts; the
//! in-memory implementation backs tests and embedded use.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use log::debug;
use uuid::Uuid;

use crate::models::EntityReference;

/// Known classification tags
#[cfg_attr(test, mockall::automock)]
pub trait TagRegistry: Send + Sync {
    /// Whether a tag with this FQN exists
    fn tag_exists(&self, tag_fqn: &str) -> bool;
}

/// Known users and teams
#[cfg_attr(test, mockall::automock)]
pub trait PrincipalRegistry: Send + Sync {
    /// Whether the referenced user or team exists
    fn principal_exists(&self, reference: &EntityReference) -> bool;
}

/// Database a table can be created in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// Database id
    pub id: Uuid,

    /// Local name
    pub name: String,

    /// Fully qualified name, `<service>.<database>`
    pub fully_qualified_name: String,
}

/// Known databases
#[cfg_attr(test, mockall::automock)]
pub trait DatabaseRegistry: Send + Sync {
    /// Look up a database by id
    fn database(&self, id: &Uuid) -> Option<DatabaseInfo>;
}

/// Registry kept in memory
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    tags: RwLock<HashSet<String>>,
    principals: RwLock<HashSet<(Uuid, String)>>,
    databases: RwLock<HashMap<Uuid, DatabaseInfo>>,
}

impl InMemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag FQN such as `PII.Sensitive`
    pub fn add_tag(&self, tag_fqn: impl Into<String>) {
        let tag_fqn = tag_fqn.into();
        debug!("Registering tag {}", tag_fqn);
        if let Ok(mut tags) = self.tags.write() {
            tags.insert(tag_fqn);
        }
    }

    /// Register a user or team and return its reference
    pub fn add_principal(&self, entity_type: &str) -> EntityReference {
        let reference = EntityReference::new(Uuid::new_v4(), entity_type);
        if let Ok(mut principals) = self.principals.write() {
            principals.insert((reference.id, reference.entity_type.clone()));
        }
        reference
    }

    /// Register a database under a service and return its descriptor
    pub fn add_database(&self, service: &str, name: &str) -> DatabaseInfo {
        let info = DatabaseInfo {
            id: Uuid::new_v4(),
            name: name.to_string(),
            fully_qualified_name: format!("{}.{}", service, name),
        };
        if let Ok(mut databases) = self.databases.write() {
            databases.insert(info.id, info.clone());
        }
        info
    }
}

impl TagRegistry for InMemoryRegistry {
    fn tag_exists(&self, tag_fqn: &str) -> bool {
        self.tags
            .read()
            .map(|tags| tags.contains(tag_fqn))
            .unwrap_or(false)
    }
}

impl PrincipalRegistry for InMemoryRegistry {
    fn principal_exists(&self, reference: &EntityReference) -> bool {
        self.principals
            .read()
            .map(|p| p.contains(&(reference.id, reference.entity_type.clone())))
            .unwrap_or(false)
    }
}

impl DatabaseRegistry for InMemoryRegistry {
    fn database(&self, id: &Uuid) -> Option<DatabaseInfo> {
        self.databases.read().ok().and_then(|dbs| dbs.get(id).cloned())
    }
}
