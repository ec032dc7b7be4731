//! Revision controller
//!
//! Orchestrates one write: validation, diff, classification, then the tag
//! ledger delta and the storage write as one atomic step. Writes to the same
//! entity are serialized through a per-entity lock; writes to different
//! entities run concurrently.
//!
//! Each write moves through [`WriteStage`]s and ends either `Persisted` or
//! `Rejected`. Nothing is visible before `Persisted`.

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::{Arc, Mutex};
use chrono::Utc;
use log::{debug, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::aggregate::{
    resolve_column_fqn, validate_profile, validate_sample_data, ColumnRef, JoinWindow, SnapshotSeries,
};
use crate::classifier::{ChangeClassifier, Classification};
use crate::config::EngineConfig;
use crate::diff::{diff_tables, WriteMode};
use crate::error::{to_state_error, CatalogError, ErrorKind, Result};
use crate::fields::Fields;
use crate::fqn::FqnResolver;
use crate::ledger::{tag_deltas, TagUsageLedger};
use crate::models::column::find_column;
use crate::models::{
    entity_types, ChangeDescription, Column, CreateTable, EntityReference, EntityVersion,
    EntityVersionHistory, SampleData, Table, TableJoins, TableProfile, UpdateType,
};
use crate::registry::{DatabaseInfo, DatabaseRegistry, InMemoryRegistry, PrincipalRegistry, TagRegistry};
use crate::schema::{dedupe_tags, normalize_columns, SchemaValidator};
use crate::store::{EntityStore, InMemoryEntityStore};
use crate::utils::{Clock, StageTimer, SystemClock};

/// Stage of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteStage {
    /// Checking names, types, references
    Validating,
    /// Computing the change set
    Diffing,
    /// Deciding the version bump
    Classifying,
    /// Applying ledger deltas together with the storage write
    PersistingLedgerDelta,
    /// Write accepted and visible
    Persisted,
    /// Write refused; nothing applied
    Rejected,
}

impl Display for WriteStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            WriteStage::Validating => "validating",
            WriteStage::Diffing => "diffing",
            WriteStage::Classifying => "classifying",
            WriteStage::PersistingLedgerDelta => "persisting",
            WriteStage::Persisted => "persisted",
            WriteStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Tracks the stage of one write and times each stage
struct WriteProgress {
    stage: WriteStage,
    timer: StageTimer,
}

impl WriteProgress {
    fn advance(&mut self, next: WriteStage) {
        self.timer.stage(self.stage.to_string());
        debug!("{} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// Result of an accepted write
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// Entity as persisted
    pub table: Table,

    /// Version-bump class of the write
    pub update_type: UpdateType,

    /// Fields changed by the write
    pub change_description: ChangeDescription,
}

/// Services the controller depends on
#[derive(Clone)]
pub struct Collaborators {
    /// Entity storage
    pub store: Arc<dyn EntityStore>,
    /// Tag lookup
    pub tags: Arc<dyn TagRegistry>,
    /// Owner lookup
    pub principals: Arc<dyn PrincipalRegistry>,
    /// Database lookup
    pub databases: Arc<dyn DatabaseRegistry>,
    /// Source of "today"
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// In-memory store, one registry for tags, owners and databases, and the
    /// system clock
    pub fn in_memory(registry: Arc<InMemoryRegistry>) -> Self {
        Collaborators {
            store: Arc::new(InMemoryEntityStore::new()),
            tags: registry.clone(),
            principals: registry.clone(),
            databases: registry,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Entry point for every table write and aggregate report
pub struct RevisionController {
    config: EngineConfig,
    resolver: FqnResolver,
    classifier: ChangeClassifier,
    services: Collaborators,
    ledger: TagUsageLedger,
    joins: JoinWindow,
    profiles: SnapshotSeries<TableProfile>,
    samples: SnapshotSeries<SampleData>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RevisionController {
    /// Create a controller; fails if the configuration is unusable
    pub fn new(config: EngineConfig, services: Collaborators) -> Result<Self> {
        config.validate()?;
        Ok(RevisionController {
            resolver: FqnResolver::new(config.fqn.clone()),
            classifier: ChangeClassifier::new(config.classifier),
            joins: JoinWindow::new(config.joins.window_days),
            config,
            services,
            ledger: TagUsageLedger::new(),
            profiles: SnapshotSeries::new(),
            samples: SnapshotSeries::new(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Tag usage ledger
    pub fn ledger(&self) -> &TagUsageLedger {
        &self.ledger
    }

    /// Usage count of one tag
    pub fn tag_usage(&self, tag_fqn: &str) -> Result<u64> {
        self.ledger.count(tag_fqn)
    }

    /// Usage count summed over a tag category
    pub fn category_usage(&self, category: &str) -> Result<u64> {
        self.ledger.category_count(category)
    }

    // ---- writes ----

    /// Create a table; fails if its FQN is taken
    pub fn create(&self, request: CreateTable, user: &str) -> Result<WriteOutcome> {
        let (database, fqn) = self.table_fqn(&request)?;
        self.with_entity_lock(&format!("fqn:{}", fqn), || {
            self.run_write(&format!("create {}", fqn), |progress| {
                if self.services.store.find_by_fqn(&fqn)?.is_some() {
                    return Err(CatalogError::EntityAlreadyExists(fqn.clone()));
                }
                self.create_locked(request, &database, fqn.clone(), user, progress)
            })
        })
    }

    /// Create the table, or replace it if its FQN exists
    pub fn put(&self, request: CreateTable, user: &str) -> Result<WriteOutcome> {
        let (database, fqn) = self.table_fqn(&request)?;
        self.with_entity_lock(&format!("fqn:{}", fqn), || {
            match self.services.store.find_by_fqn(&fqn)? {
                None => self.run_write(&format!("put {}", fqn), |progress| {
                    self.create_locked(request, &database, fqn.clone(), user, progress)
                }),
                Some(existing) => self.with_entity_lock(&format!("id:{}", existing.id), || {
                    self.run_write(&format!("put {}", fqn), |progress| {
                        // Re-read under the entity lock; a rename in between
                        // means the request no longer addresses this entity
                        let old = self.services.store.get(&existing.id)?;
                        if old.fully_qualified_name != fqn {
                            return Err(CatalogError::VersionConflict {
                                fqn: fqn.clone(),
                                expected: existing.version.to_string(),
                                actual: old.version.to_string(),
                            });
                        }
                        let mut new = old.clone();
                        apply_request(&mut new, request);
                        self.update_locked(&old, new, WriteMode::Put, user, progress)
                    })
                }),
            }
        })
    }

    /// Edit a table in place. Columns may change metadata only; identity,
    /// version and containment are restored after `edit` runs.
    pub fn patch_with<F>(&self, id: &Uuid, user: &str, edit: F) -> Result<WriteOutcome>
    where
        F: FnOnce(&mut Table) -> Result<()>,
    {
        self.with_entity_lock(&format!("id:{}", id), || {
            let old = self.services.store.get(id)?;
            self.run_write(&format!("patch {}", old.fully_qualified_name), |progress| {
                let mut new = old.clone();
                edit(&mut new)?;
                self.restore_bookkeeping(&old, &mut new)?;
                self.update_locked(&old, new, WriteMode::Patch, user, progress)
            })
        })
    }

    /// Apply a JSON merge patch to a table
    pub fn patch(&self, id: &Uuid, patch: &Value, user: &str) -> Result<WriteOutcome> {
        self.patch_with(id, user, |table| {
            let mut document = serde_json::to_value(&*table)?;
            merge_patch(&mut document, patch);
            *table = serde_json::from_value(document)?;
            Ok(())
        })
    }

    // ---- reads ----

    /// Latest revision with the requested optional fields
    pub fn get(&self, id: &Uuid, fields: &Fields) -> Result<Table> {
        let table = self.services.store.get(id)?;
        self.project(table, fields)
    }

    /// Latest revision by FQN with the requested optional fields
    pub fn get_by_name(&self, fqn: &str, fields: &Fields) -> Result<Table> {
        let table = self.services.store.get_by_fqn(fqn)?;
        self.project(table, fields)
    }

    /// Every persisted revision, newest first
    pub fn versions(&self, id: &Uuid) -> Result<EntityVersionHistory> {
        self.services.store.versions(id)
    }

    /// One persisted revision
    pub fn get_version(&self, id: &Uuid, version: EntityVersion) -> Result<Table> {
        self.services.store.get_version(id, version)
    }

    // ---- engine surface ----

    /// Diff and classify two revisions without persisting anything.
    ///
    /// Both column trees must be structurally valid.
    pub fn diff_and_classify(&self, old: &Table, new: &Table, mode: WriteMode) -> Result<Classification> {
        let validator = self.validator();
        validator.validate_columns(&old.columns)?;
        validator.validate_columns(&new.columns)?;
        self.classifier.diff_and_classify(old, new, mode)
    }

    /// Apply the tag deltas between two revisions
    pub fn apply_tag_deltas(&self, old: Option<&Table>, new: Option<&Table>) -> Result<()> {
        self.ledger.commit_with(&tag_deltas(old, new), || Ok(()))
    }

    // ---- aggregates ----

    /// Add a join report for a table
    pub fn report_joins(&self, table_id: &Uuid, report: &TableJoins) -> Result<()> {
        let table = self.services.store.get(table_id)?;
        if report.day_count == 0 {
            return Err(CatalogError::InvalidDayCount(report.day_count));
        }
        let today = self.services.clock.today();
        self.joins.check_date(report.start_date, today)?;

        let mut entries = Vec::new();
        for column_join in &report.column_joins {
            let path = self.resolver.split(&column_join.column_name);
            if find_column(&table.columns, &path).is_none() {
                return Err(CatalogError::UnknownColumn(column_join.column_name.clone()));
            }
            let source = ColumnRef::new(table.id, column_join.column_name.clone());
            for peer in &column_join.joined_with {
                let target = resolve_column_fqn(&peer.fully_qualified_name, &self.resolver, |fqn| {
                    self.services.store.find_by_fqn(fqn)
                })?;
                entries.push((source.clone(), target, peer.join_count));
            }
        }

        self.joins.record(report.start_date, &entries, today)?;
        info!(
            "Recorded {} join(s) for {} on {}",
            entries.len(),
            table.fully_qualified_name,
            report.start_date
        );
        Ok(())
    }

    /// Insert or replace the profile for its date
    pub fn upsert_profile(&self, table_id: &Uuid, profile: TableProfile) -> Result<Table> {
        let table = self.services.store.get(table_id)?;
        validate_profile(&self.resolver, &table, &profile)?;
        self.profiles.upsert(*table_id, profile)?;
        self.project(table, &Fields::table("tableProfile")?)
    }

    /// Insert or replace the sample data for its date
    pub fn upsert_sample_data(&self, table_id: &Uuid, sample: SampleData) -> Result<Table> {
        let table = self.services.store.get(table_id)?;
        validate_sample_data(&self.resolver, &table, &sample.data)?;
        self.samples.upsert(*table_id, sample)?;
        self.project(table, &Fields::table("sampleData")?)
    }

    // ---- internals ----

    fn run_write<T, F>(&self, label: &str, write: F) -> Result<T>
    where
        F: FnOnce(&mut WriteProgress) -> Result<T>,
    {
        let mut progress = WriteProgress {
            stage: WriteStage::Validating,
            timer: StageTimer::new(label).with_slow_threshold(self.config.slow_write_threshold),
        };
        match write(&mut progress) {
            Ok(value) => {
                progress.advance(WriteStage::Persisted);
                Ok(value)
            }
            Err(err) => {
                warn!("{} rejected while {}: {}", label, progress.stage, err);
                progress.advance(WriteStage::Rejected);
                Err(err)
            }
        }
    }

    fn table_fqn(&self, request: &CreateTable) -> Result<(DatabaseInfo, String)> {
        let database = self.services.databases.database(&request.database)
            .ok_or_else(|| CatalogError::reference_not_found(entity_types::DATABASE, request.database))?;
        let fqn = self.resolver.resolve(&database.fully_qualified_name, &request.name)?;
        Ok((database, fqn))
    }

    fn create_locked(
        &self,
        request: CreateTable,
        database: &DatabaseInfo,
        fqn: String,
        user: &str,
        progress: &mut WriteProgress,
    ) -> Result<WriteOutcome> {
        let mut table = Table {
            id: Uuid::new_v4(),
            name: String::new(),
            fully_qualified_name: fqn,
            version: EntityVersion::INITIAL,
            updated_at: Utc::now(),
            updated_by: user.to_string(),
            description: None,
            table_type: None,
            owner: None,
            database: Some(EntityReference {
                id: database.id,
                entity_type: entity_types::DATABASE.to_string(),
                name: Some(database.fully_qualified_name.clone()),
            }),
            columns: Vec::new(),
            table_constraints: None,
            tags: Vec::new(),
            view_definition: None,
            change_description: None,
            joins: None,
            sample_data: None,
            table_profile: None,
        };
        apply_request(&mut table, request);
        self.prepare(&mut table)?;

        progress.advance(WriteStage::Diffing);
        progress.advance(WriteStage::Classifying);
        progress.advance(WriteStage::PersistingLedgerDelta);

        let deltas = tag_deltas(None, Some(&table));
        let stored = self.ledger.commit_with(&deltas, || self.services.store.put(table, None))?;

        info!(
            "Created {} version {} ({} tag attachment(s))",
            stored.fully_qualified_name,
            stored.version,
            deltas.values().sum::<i64>()
        );
        Ok(WriteOutcome {
            change_description: ChangeDescription::default(),
            update_type: UpdateType::Created,
            table: stored,
        })
    }

    fn update_locked(
        &self,
        old: &Table,
        mut new: Table,
        mode: WriteMode,
        user: &str,
        progress: &mut WriteProgress,
    ) -> Result<WriteOutcome> {
        self.prepare(&mut new)?;

        progress.advance(WriteStage::Diffing);
        let changes = diff_tables(old, &new, mode)?;

        progress.advance(WriteStage::Classifying);
        let (update_type, version) = self.classifier.classify(&changes, old.version);
        let change_description = changes.to_description(old.version);

        if update_type == UpdateType::NoChange {
            debug!("{} {} unchanged at {}", mode, old.fully_qualified_name, old.version);
            return Ok(WriteOutcome {
                table: old.clone(),
                update_type,
                change_description,
            });
        }

        progress.advance(WriteStage::PersistingLedgerDelta);
        new.version = version;
        new.updated_at = Utc::now();
        new.updated_by = user.to_string();
        new.change_description = Some(change_description.clone());

        let deltas = tag_deltas(Some(old), Some(&new));
        let stored = self
            .ledger
            .commit_with(&deltas, || self.services.store.put(new, Some(old.version)))?;

        info!(
            "{} {} {} -> {} ({}, {} field change(s))",
            mode,
            stored.fully_qualified_name,
            old.version,
            stored.version,
            update_type,
            change_description.len()
        );
        Ok(WriteOutcome {
            table: stored,
            update_type,
            change_description,
        })
    }

    /// Normalize, validate and derive FQNs for a revision about to be written
    fn prepare(&self, table: &mut Table) -> Result<()> {
        normalize_columns(&mut table.columns);
        dedupe_tags(&mut table.tags);

        self.validator().validate_table(table)?;

        self.resolver.assign_column_fqns(&table.fully_qualified_name, &mut table.columns)
    }

    fn validator(&self) -> SchemaValidator<'_> {
        SchemaValidator::new(
            &self.resolver,
            self.services.tags.as_ref(),
            self.services.principals.as_ref(),
        )
    }

    /// Keep identity and version fields out of reach of a patch and re-derive
    /// the FQN from the (possibly renamed) table name
    fn restore_bookkeeping(&self, old: &Table, new: &mut Table) -> Result<()> {
        new.id = old.id;
        new.version = old.version;
        new.updated_at = old.updated_at;
        new.updated_by = old.updated_by.clone();
        new.database = old.database.clone();
        new.change_description = old.change_description.clone();
        new.joins = None;
        new.sample_data = None;
        new.table_profile = None;

        if new.name != old.name {
            let parent = old
                .fully_qualified_name
                .strip_suffix(old.name.as_str())
                .and_then(|p| p.strip_suffix(self.config.fqn.separator))
                .unwrap_or_default();
            new.fully_qualified_name = self.resolver.resolve(parent, &new.name)?;
        } else {
            new.fully_qualified_name = old.fully_qualified_name.clone();
        }
        Ok(())
    }

    fn project(&self, mut table: Table, fields: &Fields) -> Result<Table> {
        if !fields.contains("owner") {
            table.owner = None;
        }
        if !fields.contains("tags") {
            table.tags.clear();
            clear_column_tags(&mut table.columns);
        }
        if !fields.contains("tableConstraints") {
            table.table_constraints = None;
        }
        if !fields.contains("database") {
            table.database = None;
        }
        if !fields.contains("viewDefinition") {
            table.view_definition = None;
        }
        table.joins = if fields.contains("joins") {
            let today = self.services.clock.today();
            Some(self.joins.read(&table.id, today, |peer| self.column_fqn(peer))?)
        } else {
            None
        };
        table.sample_data = if fields.contains("sampleData") {
            Some(self.samples.list(&table.id)?)
        } else {
            None
        };
        table.table_profile = if fields.contains("tableProfile") {
            Some(self.profiles.list(&table.id)?)
        } else {
            None
        };
        Ok(table)
    }

    /// Current FQN of a column, `None` once its table is gone
    fn column_fqn(&self, column: &ColumnRef) -> Result<Option<String>> {
        match self.services.store.get(&column.table_id) {
            Ok(table) => Ok(Some(self.resolver.child_fqn(&table.fully_qualified_name, &column.column_path))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Run `f` holding the lock for `key`. The lock entry is dropped again
    /// once no other writer holds or waits for it.
    fn with_entity_lock<T, F>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock = {
            let mut locks = self.locks.lock().map_err(to_state_error)?;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(err) => Err(to_state_error(err)),
        };

        let mut locks = self.locks.lock().map_err(to_state_error)?;
        drop(lock);
        if locks.get(key).map_or(false, |entry| Arc::strong_count(entry) == 1) {
            locks.remove(key);
        }
        result
    }
}

/// Copy the caller-settable attributes of a request onto a table
fn apply_request(table: &mut Table, request: CreateTable) {
    table.name = request.name;
    table.description = request.description;
    table.table_type = request.table_type;
    table.columns = request.columns;
    table.table_constraints = request.table_constraints;
    table.tags = request.tags;
    table.owner = request.owner;
    table.view_definition = request.view_definition;
}

fn clear_column_tags(columns: &mut [Column]) {
    for column in columns {
        column.tags.clear();
        clear_column_tags(&mut column.children);
    }
}

/// JSON merge patch: objects merge recursively, `null` removes a member and
/// anything else replaces the target
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_members) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(members) = target {
        for (key, value) in patch_members {
            if value.is_null() {
                members.remove(key);
            } else {
                merge_patch(members.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}
