//! Monthly partition families for `edge_events` and `observations`.
//!
//! SQLite has no native list partitioning, so a partitioned table is a
//! family of physical tables: one per month (`edge_events_202608`) plus a
//! default (`edge_events_default`) that catches writes for months without
//! a partition. The maintenance routine keeps future months pre-created
//! and drains the default partition in bounded batches. Retention expiry
//! is a partition drop.

use chrono::{DateTime, Datelike, Utc};
use rusqlite::Connection;

use lattice_core::constants::PARTITION_DRAIN_BATCH;
use lattice_core::LatticeResult;

use crate::to_storage_err;

/// The two partitioned families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    EdgeEvents,
    Observations,
}

impl Family {
    pub fn base(&self) -> &'static str {
        match self {
            Family::EdgeEvents => "edge_events",
            Family::Observations => "observations",
        }
    }

    /// The timestamp column the family is partitioned on.
    pub fn ts_column(&self) -> &'static str {
        match self {
            Family::EdgeEvents => "occurred_at",
            Family::Observations => "observed_at",
        }
    }

    pub fn default_table(&self) -> String {
        format!("{}_default", self.base())
    }

    fn ddl(&self, table: &str) -> String {
        match self {
            Family::EdgeEvents => edge_events_ddl(table),
            Family::Observations => observations_ddl(table),
        }
    }
}

/// DDL for one physical edge-event partition.
pub fn edge_events_ddl(table: &str) -> String {
    format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id          TEXT PRIMARY KEY,
            source_id   TEXT NOT NULL,
            target_id   TEXT NOT NULL,
            relation    TEXT NOT NULL,
            success     INTEGER NOT NULL,
            duration_ms INTEGER,
            payload     TEXT NOT NULL DEFAULT 'null',
            occurred_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_source ON {table}(source_id);
        CREATE INDEX IF NOT EXISTS idx_{table}_target ON {table}(target_id);
        CREATE INDEX IF NOT EXISTS idx_{table}_occurred ON {table}(occurred_at);
        "
    )
}

/// DDL for one physical observation partition.
pub fn observations_ddl(table: &str) -> String {
    format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id               TEXT PRIMARY KEY,
            node_id          TEXT NOT NULL,
            observation_type TEXT NOT NULL,
            payload          TEXT NOT NULL DEFAULT '{{}}',
            observed_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_node ON {table}(node_id);
        CREATE INDEX IF NOT EXISTS idx_{table}_type ON {table}(observation_type);
        CREATE INDEX IF NOT EXISTS idx_{table}_observed ON {table}(observed_at);
        "
    )
}

/// `YYYYMM` suffix for a timestamp's month.
pub fn month_suffix(ts: DateTime<Utc>) -> String {
    format!("{:04}{:02}", ts.year(), ts.month())
}

/// The physical table a row with this timestamp belongs in.
pub fn partition_table(family: Family, ts: DateTime<Utc>) -> String {
    format!("{}_{}", family.base(), month_suffix(ts))
}

/// Create the partition for the given timestamp's month if missing.
/// Returns the table name.
pub fn ensure_partition(
    conn: &Connection,
    family: Family,
    ts: DateTime<Utc>,
) -> LatticeResult<String> {
    let table = partition_table(family, ts);
    conn.execute_batch(&family.ddl(&table))
        .map_err(|e| to_storage_err(format!("ensure partition {table}: {e}")))?;
    Ok(table)
}

/// Ensure partitions exist for the current month plus `months_ahead`
/// future months, for both families.
pub fn ensure_future_partitions(conn: &Connection, months_ahead: u32) -> LatticeResult<()> {
    let now = Utc::now();
    for family in [Family::EdgeEvents, Family::Observations] {
        for offset in 0..=months_ahead {
            let ts = add_months(now, offset);
            ensure_partition(conn, family, ts)?;
        }
    }
    Ok(())
}

/// All month partitions of a family, sorted ascending by month, with the
/// default partition appended last.
pub fn list_partitions(conn: &Connection, family: Family) -> LatticeResult<Vec<String>> {
    let pattern = format!("{}_%", family.base());
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name LIKE ?1
             ORDER BY name",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut months: Vec<String> = stmt
        .query_map([&pattern], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?
        .filter_map(Result::ok)
        .filter(|name| parse_month_suffix(family, name).is_some())
        .collect();
    months.push(family.default_table());
    Ok(months)
}

/// Month partitions overlapping `[from, to]`, plus the default partition
/// (whose rows can belong to any month until drained).
pub fn partitions_for_range(
    conn: &Connection,
    family: Family,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> LatticeResult<Vec<String>> {
    let all = list_partitions(conn, family)?;
    let from_key = from.map(|ts| month_key(ts.year(), ts.month()));
    let to_key = to.map(|ts| month_key(ts.year(), ts.month()));
    Ok(all
        .into_iter()
        .filter(|name| match parse_month_suffix(family, name) {
            None => true, // default partition
            Some(key) => {
                from_key.map_or(true, |f| key >= f) && to_key.map_or(true, |t| key <= t)
            }
        })
        .collect())
}

/// Move up to `batch` rows from the default partition into their correct
/// month partitions. Returns the number of rows relocated; callers loop
/// until this reaches zero.
pub fn drain_default(conn: &Connection, family: Family) -> LatticeResult<usize> {
    let default = family.default_table();
    let ts_col = family.ts_column();
    let mut stmt = conn
        .prepare(&format!(
            "SELECT id, {ts_col} FROM {default} ORDER BY {ts_col} LIMIT ?1"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows: Vec<(String, String)> = stmt
        .query_map([PARTITION_DRAIN_BATCH], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<_, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    drop(stmt);

    if rows.is_empty() {
        return Ok(0);
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("drain begin: {e}")))?;
    let mut moved = 0usize;
    for (id, ts_str) in &rows {
        let ts = parse_ts(ts_str)?;
        let target = ensure_partition(&tx, family, ts)?;
        tx.execute(
            &format!("INSERT OR IGNORE INTO {target} SELECT * FROM {default} WHERE id = ?1"),
            [id],
        )
        .map_err(|e| to_storage_err(format!("drain copy: {e}")))?;
        tx.execute(&format!("DELETE FROM {default} WHERE id = ?1"), [id])
            .map_err(|e| to_storage_err(format!("drain delete: {e}")))?;
        moved += 1;
    }
    tx.commit()
        .map_err(|e| to_storage_err(format!("drain commit: {e}")))?;
    Ok(moved)
}

/// Drop month partitions strictly older than `cutoff`'s month. This is the
/// retention mechanism; the default partition is never dropped.
pub fn drop_partitions_before(
    conn: &Connection,
    family: Family,
    cutoff: DateTime<Utc>,
) -> LatticeResult<usize> {
    let cutoff_key = month_key(cutoff.year(), cutoff.month());
    let mut dropped = 0usize;
    for name in list_partitions(conn, family)? {
        if let Some(key) = parse_month_suffix(family, &name) {
            if key < cutoff_key {
                conn.execute_batch(&format!("DROP TABLE IF EXISTS {name}"))
                    .map_err(|e| to_storage_err(format!("drop partition {name}: {e}")))?;
                tracing::info!(partition = %name, "dropped expired partition");
                dropped += 1;
            }
        }
    }
    Ok(dropped)
}

/// Parse the `YYYYMM` suffix of a month partition name; `None` for the
/// default partition or unrelated tables.
fn parse_month_suffix(family: Family, name: &str) -> Option<i32> {
    let suffix = name.strip_prefix(family.base())?.strip_prefix('_')?;
    if suffix.len() != 6 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = suffix[..4].parse().ok()?;
    let month: u32 = suffix[4..].parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some(month_key(year, month))
}

/// Orderable month key.
fn month_key(year: i32, month: u32) -> i32 {
    year * 12 + month as i32 - 1
}

/// Add whole months to a timestamp, for partition pre-creation only
/// (day-of-month precision is irrelevant, the suffix uses year+month).
fn add_months(ts: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let total = month_key(ts.year(), ts.month()) + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    chrono::TimeZone::with_ymd_and_hms(&Utc, year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(ts)
}

fn parse_ts(s: &str) -> LatticeResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| to_storage_err(format!("parse timestamp '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_suffix_formats() {
        let ts = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 8, 1, 0, 0, 0).unwrap();
        assert_eq!(month_suffix(ts), "202608");
        assert_eq!(partition_table(Family::EdgeEvents, ts), "edge_events_202608");
    }

    #[test]
    fn parse_month_suffix_rejects_default_and_garbage() {
        assert!(parse_month_suffix(Family::EdgeEvents, "edge_events_default").is_none());
        assert!(parse_month_suffix(Family::EdgeEvents, "edge_events_20261").is_none());
        assert!(parse_month_suffix(Family::EdgeEvents, "edge_events_202613").is_none());
        assert!(parse_month_suffix(Family::EdgeEvents, "edge_events_202608").is_some());
    }

    #[test]
    fn add_months_wraps_year() {
        let ts = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 11, 15, 0, 0, 0).unwrap();
        assert_eq!(month_suffix(add_months(ts, 3)), "202702");
    }

    #[test]
    fn ensure_and_list_partitions() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let ts = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 8, 1, 0, 0, 0).unwrap();
        ensure_partition(&conn, Family::EdgeEvents, ts).unwrap();
        let parts = list_partitions(&conn, Family::EdgeEvents).unwrap();
        assert_eq!(parts, vec!["edge_events_202608", "edge_events_default"]);
    }

    #[test]
    fn range_always_includes_default() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let aug = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 8, 1, 0, 0, 0).unwrap();
        let sep = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 9, 1, 0, 0, 0).unwrap();
        ensure_partition(&conn, Family::Observations, aug).unwrap();
        ensure_partition(&conn, Family::Observations, sep).unwrap();
        let parts =
            partitions_for_range(&conn, Family::Observations, Some(sep), None).unwrap();
        assert_eq!(parts, vec!["observations_202609", "observations_default"]);
    }
}
