//! Tag usage ledger
//!
//! Process-wide reference counts per tag FQN. A count equals the number of
//! (entity, attachment site) pairs currently carrying the tag, where a site is
//! the table itself or any column at any depth.
//!
//! All mutation goes through [`TagUsageLedger::commit_with`] so the deltas of
//! one write become visible together with the entity write, or not at all.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use log::{debug, warn};

use crate::error::{to_ledger_error, CatalogError, Result};
use crate::models::tag::category_of;
use crate::models::{Column, Table};

/// Signed count change per tag FQN
pub type TagDeltas = BTreeMap<String, i64>;

/// Reference counts per tag
#[derive(Debug, Default)]
pub struct TagUsageLedger {
    counts: RwLock<HashMap<String, u64>>,
}

impl TagUsageLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a single delta
    pub fn apply_delta(&self, tag_fqn: &str, delta: i64) -> Result<()> {
        let mut deltas = TagDeltas::new();
        deltas.insert(tag_fqn.to_string(), delta);
        self.commit_with(&deltas, || Ok(()))
    }

    /// Current count for a tag
    pub fn count(&self, tag_fqn: &str) -> Result<u64> {
        let counts = self.counts.read()
            .map_err(|e| to_ledger_error(format!("Failed to read tag counts: {}", e)))?;
        Ok(counts.get(tag_fqn).copied().unwrap_or(0))
    }

    /// Sum of the counts of every tag in a category
    pub fn category_count(&self, category: &str) -> Result<u64> {
        let counts = self.counts.read()
            .map_err(|e| to_ledger_error(format!("Failed to read tag counts: {}", e)))?;
        Ok(counts
            .iter()
            .filter(|(tag, _)| category_of(tag) == category)
            .map(|(_, count)| *count)
            .sum())
    }

    /// Apply `deltas` atomically with `write`.
    ///
    /// The ledger stays write-locked while `write` runs; the deltas are applied
    /// only if it succeeds. A batch that would drive any count below zero is
    /// rejected before `write` runs.
    pub fn commit_with<T, F>(&self, deltas: &TagDeltas, write: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut counts = self.counts.write()
            .map_err(|e| to_ledger_error(format!("Failed to lock tag counts: {}", e)))?;

        let mut updated = Vec::with_capacity(deltas.len());
        for (tag, delta) in deltas.iter().filter(|(_, d)| **d != 0) {
            let current = counts.get(tag).copied().unwrap_or(0) as i64;
            let next = current + delta;
            if next < 0 {
                warn!("Rejecting tag delta {} for {} at count {}", delta, tag, current);
                return Err(CatalogError::LedgerError(format!(
                    "count for {} would become {}",
                    tag, next
                )));
            }
            updated.push((tag, next as u64));
        }

        let result = write()?;

        for (tag, count) in updated {
            if count == 0 {
                counts.remove(tag);
            } else {
                counts.insert(tag.clone(), count);
            }
        }
        debug!("Applied {} tag delta(s)", deltas.len());
        Ok(result)
    }

    /// Copy of all non-zero counts
    pub fn snapshot(&self) -> Result<BTreeMap<String, u64>> {
        let counts = self.counts.read()
            .map_err(|e| to_ledger_error(format!("Failed to read tag counts: {}", e)))?;
        Ok(counts.iter().map(|(k, v)| (k.clone(), *v)).collect())
    }
}

/// Deltas turning the attachments of `old` into those of `new`.
///
/// `None` stands for an entity that does not exist on that side.
pub fn tag_deltas(old: Option<&Table>, new: Option<&Table>) -> TagDeltas {
    let mut deltas = TagDeltas::new();
    if let Some(table) = old {
        collect_attachments(table, -1, &mut deltas);
    }
    if let Some(table) = new {
        collect_attachments(table, 1, &mut deltas);
    }
    deltas.retain(|_, d| *d != 0);
    deltas
}

fn collect_attachments(table: &Table, sign: i64, deltas: &mut TagDeltas) {
    let mut seen = HashSet::new();
    for label in &table.tags {
        if seen.insert(label.tag_fqn.as_str()) {
            *deltas.entry(label.tag_fqn.clone()).or_default() += sign;
        }
    }
    collect_column_attachments(&table.columns, sign, deltas);
}

fn collect_column_attachments(columns: &[Column], sign: i64, deltas: &mut TagDeltas) {
    for column in columns {
        let mut seen = HashSet::new();
        for label in &column.tags {
            if seen.insert(label.tag_fqn.as_str()) {
                *deltas.entry(label.tag_fqn.clone()).or_default() += sign;
            }
        }
        collect_column_attachments(&column.children, sign, deltas);
    }
}
