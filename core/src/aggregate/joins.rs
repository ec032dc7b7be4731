//! Rolling join-count window
//!
//! Reports are already aggregated by the caller. Each report adds its counts
//! to the bucket of its date, in both directions, so a column sees joins it
//! reported and joins a peer reported against it. Re-reporting a date adds
//! again. Reads sum the buckets of the trailing window ending today.
//!
//! Buckets are keyed by table id and column path. Peer FQNs are resolved when
//! the window is read, so renaming a table keeps its joins.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use chrono::{Duration, NaiveDate};
use log::debug;
use uuid::Uuid;

use crate::error::{to_state_error, CatalogError, Result};
use crate::fqn::FqnResolver;
use crate::models::column::find_column;
use crate::models::{ColumnJoin, JoinedWith, Table, TableJoins};

/// A column resolved to its table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Id of the owning table
    pub table_id: Uuid,

    /// Path of the column inside the table, joined with the FQN separator
    pub column_path: String,
}

impl ColumnRef {
    /// Column reference from a table id and a local path
    pub fn new(table_id: Uuid, column_path: impl Into<String>) -> Self {
        ColumnRef {
            table_id,
            column_path: column_path.into(),
        }
    }
}

/// Resolve a column FQN against existing tables.
///
/// The longest prefix naming a table wins; the rest must be a path to an
/// existing column of that table.
pub fn resolve_column_fqn<F>(fqn: &str, resolver: &FqnResolver, mut lookup: F) -> Result<ColumnRef>
where
    F: FnMut(&str) -> Result<Option<Table>>,
{
    let segments = resolver.split(fqn);
    for split in (1..segments.len()).rev() {
        if let Some(table) = lookup(&resolver.join(&segments[..split]))? {
            let path = &segments[split..];
            if find_column(&table.columns, path).is_some() {
                return Ok(ColumnRef::new(table.id, resolver.join(path)));
            }
            break;
        }
    }
    Err(CatalogError::InvalidColumnFqn(fqn.to_string()))
}

/// Per-day counts between a local column and one peer
type DailyCounts = BTreeMap<NaiveDate, u64>;

/// (local column path, peer column)
type JoinKey = (String, ColumnRef);

/// Join counts of every table, bucketed by day
#[derive(Debug)]
pub struct JoinWindow {
    window_days: u32,
    buckets: RwLock<HashMap<Uuid, HashMap<JoinKey, DailyCounts>>>,
}

impl JoinWindow {
    /// Create a window of `window_days` days, today included
    pub fn new(window_days: u32) -> Self {
        JoinWindow {
            window_days,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Oldest date inside the window
    fn window_start(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(i64::from(self.window_days) - 1)
    }

    /// Reject report dates outside `[today - window + 1, today]`
    pub fn check_date(&self, date: NaiveDate, today: NaiveDate) -> Result<()> {
        if date < self.window_start(today) || date > today {
            return Err(CatalogError::StaleJoinReport {
                window_days: self.window_days,
            });
        }
        Ok(())
    }

    /// Add resolved `(source, target, count)` entries to the bucket of `date`.
    ///
    /// All entries are applied under one write lock; readers see all or none.
    /// Buckets of the touched tables that fell out of the window are dropped.
    pub fn record(
        &self,
        date: NaiveDate,
        entries: &[(ColumnRef, ColumnRef, u64)],
        today: NaiveDate,
    ) -> Result<()> {
        let mut buckets = self.buckets.write()
            .map_err(|e| to_state_error(format!("Failed to lock join buckets: {}", e)))?;

        let mut touched = HashSet::new();
        for (source, target, count) in entries {
            add(&mut buckets, source, target, date, *count);
            touched.insert(source.table_id);
            if source != target {
                add(&mut buckets, target, source, date, *count);
                touched.insert(target.table_id);
            }
        }

        let from = self.window_start(today);
        for table_id in touched {
            let now_empty = buckets.get_mut(&table_id).map_or(false, |joins| {
                joins.retain(|_, days| {
                    *days = days.split_off(&from);
                    !days.is_empty()
                });
                joins.is_empty()
            });
            if now_empty {
                buckets.remove(&table_id);
            }
        }

        debug!("Recorded {} join entries for {}", entries.len(), date);
        Ok(())
    }

    /// Joins of a table summed over the window ending `today`.
    ///
    /// `peer_fqn` names a peer column as of now; peers it returns `None` for
    /// are left out.
    pub fn read<F>(&self, table_id: &Uuid, today: NaiveDate, mut peer_fqn: F) -> Result<TableJoins>
    where
        F: FnMut(&ColumnRef) -> Result<Option<String>>,
    {
        let buckets = self.buckets.read()
            .map_err(|e| to_state_error(format!("Failed to read join buckets: {}", e)))?;
        let from = self.window_start(today);

        let mut by_column: BTreeMap<&str, BTreeMap<String, u64>> = BTreeMap::new();
        if let Some(table) = buckets.get(table_id) {
            for ((column, peer), days) in table {
                let total: u64 = days.range(from..=today).map(|(_, c)| *c).sum();
                if total == 0 {
                    continue;
                }
                if let Some(fqn) = peer_fqn(peer)? {
                    *by_column.entry(column.as_str()).or_default().entry(fqn).or_default() += total;
                }
            }
        }

        let column_joins = by_column
            .into_iter()
            .map(|(column, peers)| {
                ColumnJoin::new(
                    column,
                    peers
                        .into_iter()
                        .map(|(fqn, count)| JoinedWith::new(fqn, count))
                        .collect(),
                )
            })
            .collect();

        Ok(TableJoins::new(
            today - Duration::days(i64::from(self.window_days)),
            self.window_days,
            column_joins,
        ))
    }
}

fn add(
    buckets: &mut HashMap<Uuid, HashMap<JoinKey, DailyCounts>>,
    local: &ColumnRef,
    peer: &ColumnRef,
    date: NaiveDate,
    count: u64,
) {
    *buckets
        .entry(local.table_id)
        .or_default()
        .entry((local.column_path.clone(), peer.clone()))
        .or_default()
        .entry(date)
        .or_default() += count;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, ColumnDataType, EntityVersion};
    use chrono::Utc;

    const T1: Uuid = Uuid::from_u128(1);
    const T2: Uuid = Uuid::from_u128(2);

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 9, 30).unwrap()
    }

    fn table(id: Uuid, fqn: &str) -> Table {
        Table {
            id,
            name: fqn.rsplit('.').next().unwrap().to_string(),
            fully_qualified_name: fqn.to_string(),
            version: EntityVersion::INITIAL,
            updated_at: Utc::now(),
            updated_by: "admin".to_string(),
            description: None,
            table_type: None,
            owner: None,
            database: None,
            columns: vec![
                Column::new("c1", ColumnDataType::Bigint),
                Column::new("c2", ColumnDataType::Struct)
                    .with_data_type_display("struct<a:int>")
                    .with_children(vec![Column::new("a", ColumnDataType::Int)]),
            ],
            table_constraints: None,
            tags: Vec::new(),
            view_definition: None,
            change_description: None,
            joins: None,
            sample_data: None,
            table_profile: None,
        }
    }

    fn lookup(fqn: &str) -> Result<Option<Table>> {
        Ok(match fqn {
            "svc.db.t1" => Some(table(T1, fqn)),
            "svc.db.t2" => Some(table(T2, fqn)),
            _ => None,
        })
    }

    fn peer_fqn(peer: &ColumnRef) -> Result<Option<String>> {
        let table = if peer.table_id == T1 {
            "svc.db.t1"
        } else if peer.table_id == T2 {
            "svc.db.t2"
        } else {
            return Ok(None);
        };
        Ok(Some(format!("{}.{}", table, peer.column_path)))
    }

    fn bucket_count(window: &JoinWindow, table_id: &Uuid) -> usize {
        let buckets = window.buckets.read().unwrap();
        buckets
            .get(table_id)
            .map(|joins| joins.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    #[test]
    fn test_resolve_column_fqn() {
        let resolver = FqnResolver::default();
        assert_eq!(
            resolve_column_fqn("svc.db.t1.c1", &resolver, lookup).unwrap(),
            ColumnRef::new(T1, "c1")
        );
        assert_eq!(
            resolve_column_fqn("svc.db.t2.c2.a", &resolver, lookup).unwrap(),
            ColumnRef::new(T2, "c2.a")
        );

        for invalid in ["svc.db.t1.invalidColumn", "svc.db.t9.c1", "svc.db.t1", "c1"] {
            let err = resolve_column_fqn(invalid, &resolver, lookup).unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid fully qualified column name {}", invalid));
        }
    }

    #[test]
    fn test_date_window() {
        let window = JoinWindow::new(30);
        let today = today();

        assert!(window.check_date(today, today).is_ok());
        assert!(window.check_date(today - Duration::days(29), today).is_ok());

        let err = window.check_date(today - Duration::days(30), today).unwrap_err();
        assert_eq!(err.to_string(), "Date range can only include past 30 days starting today");
        assert!(window.check_date(today - Duration::days(31), today).is_err());
        assert!(window.check_date(today + Duration::days(1), today).is_err());
    }

    #[test]
    fn test_counts_accumulate_over_days() {
        let window = JoinWindow::new(30);
        let today = today();
        let t1c1 = ColumnRef::new(T1, "c1");
        let t2c1 = ColumnRef::new(T2, "c1");
        let t2a = ColumnRef::new(T2, "c2.a");

        for i in 0..30 {
            let entries = vec![(t1c1.clone(), t2c1.clone(), 10), (t1c1.clone(), t2a.clone(), 20)];
            window.record(today - Duration::days(i), &entries, today).unwrap();

            let joins = window.read(&T1, today, peer_fqn).unwrap();
            let reported = (i + 1) as u64;
            assert_eq!(joins.count("c1", "svc.db.t2.c1"), 10 * reported);
            assert_eq!(joins.count("c1", "svc.db.t2.c2.a"), 20 * reported);

            let reverse = window.read(&T2, today, peer_fqn).unwrap();
            assert_eq!(reverse.count("c1", "svc.db.t1.c1"), 10 * reported);
            assert_eq!(reverse.count("c2.a", "svc.db.t1.c1"), 20 * reported);
        }

        let joins = window.read(&T1, today, peer_fqn).unwrap();
        assert_eq!(joins.start_date, today - Duration::days(30));
        assert_eq!(joins.day_count, 30);
        assert_eq!(joins.column_joins.len(), 1);
        assert_eq!(joins.column_joins[0].joined_with[0].fully_qualified_name, "svc.db.t2.c1");
    }

    #[test]
    fn test_same_date_adds_again() {
        let window = JoinWindow::new(30);
        let today = today();
        let entries = vec![(ColumnRef::new(T1, "c1"), ColumnRef::new(T2, "c1"), 5)];

        window.record(today, &entries, today).unwrap();
        window.record(today, &entries, today).unwrap();
        assert_eq!(window.read(&T1, today, peer_fqn).unwrap().count("c1", "svc.db.t2.c1"), 10);
    }

    #[test]
    fn test_old_buckets_leave_window() {
        let window = JoinWindow::new(30);
        let today = today();
        let entries = vec![(ColumnRef::new(T1, "c1"), ColumnRef::new(T2, "c1"), 5)];

        window.record(today - Duration::days(29), &entries, today).unwrap();
        assert_eq!(window.read(&T1, today, peer_fqn).unwrap().count("c1", "svc.db.t2.c1"), 5);

        let tomorrow = today + Duration::days(1);
        assert!(window.read(&T1, tomorrow, peer_fqn).unwrap().column_joins.is_empty());
    }

    #[test]
    fn test_record_prunes_expired_buckets() {
        let window = JoinWindow::new(30);
        let start = today();
        let entries = vec![(ColumnRef::new(T1, "c1"), ColumnRef::new(T2, "c1"), 5)];

        for day in 0..90 {
            let today = start + Duration::days(day);
            window.record(today, &entries, today).unwrap();
            assert!(bucket_count(&window, &T1) <= 30);
            assert!(bucket_count(&window, &T2) <= 30);
        }

        let last = start + Duration::days(89);
        assert_eq!(bucket_count(&window, &T1), 30);
        assert_eq!(window.read(&T1, last, peer_fqn).unwrap().count("c1", "svc.db.t2.c1"), 150);
    }

    #[test]
    fn test_unknown_peers_are_skipped() {
        let window = JoinWindow::new(30);
        let today = today();
        let gone = ColumnRef::new(Uuid::from_u128(9), "c1");
        window.record(today, &[(ColumnRef::new(T1, "c1"), gone, 3)], today).unwrap();

        assert!(window.read(&T1, today, peer_fqn).unwrap().column_joins.is_empty());
    }

    #[test]
    fn test_self_join_counted_once() {
        let window = JoinWindow::new(30);
        let today = today();
        let c1 = ColumnRef::new(T1, "c1");
        window.record(today, &[(c1.clone(), c1, 4)], today).unwrap();

        assert_eq!(window.read(&T1, today, peer_fqn).unwrap().count("c1", "svc.db.t1.c1"), 4);
    }
}
