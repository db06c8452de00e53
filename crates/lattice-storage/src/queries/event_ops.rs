//! Causal event writes and partition-spanning reads.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use lattice_core::graph::{EdgeEvent, EventRelation};
use lattice_core::LatticeResult;

use super::parse_dt;
use crate::partitions::{self, Family};
use crate::to_storage_err;

const EVENT_COLUMNS: &str =
    "id, source_id, target_id, relation, success, duration_ms, payload, occurred_at";

/// Write an event into its month's partition, creating it on demand.
pub fn create_edge_event(conn: &Connection, event: &EdgeEvent) -> LatticeResult<()> {
    let table = partitions::ensure_partition(conn, Family::EdgeEvents, event.occurred_at)?;
    let payload_json =
        serde_json::to_string(&event.payload).map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        &format!(
            "INSERT INTO {table}
                (id, source_id, target_id, relation, success, duration_ms, payload, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            event.id,
            event.source_id,
            event.target_id,
            event.relation.as_str(),
            event.success as i32,
            event.duration_ms,
            payload_json,
            event.occurred_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_storage_err(format!("create_edge_event: {e}")))?;
    Ok(())
}

/// `(SELECT … FROM p1 UNION ALL SELECT … FROM p2 …)` over the partitions
/// overlapping the range. Empty families yield a selectable empty set.
pub(crate) fn union_events(
    conn: &Connection,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> LatticeResult<String> {
    let parts = partitions::partitions_for_range(conn, Family::EdgeEvents, from, to)?;
    Ok(format!(
        "({})",
        parts
            .iter()
            .map(|t| format!("SELECT {EVENT_COLUMNS} FROM {t}"))
            .collect::<Vec<_>>()
            .join(" UNION ALL ")
    ))
}

/// Events originating at `source_id`, oldest first, optionally filtered by
/// relation. Used by the lineage walk.
pub fn events_from(
    conn: &Connection,
    source_id: &str,
    relation: Option<EventRelation>,
) -> LatticeResult<Vec<EdgeEvent>> {
    let union = union_events(conn, None, None)?;
    let mut args: Vec<String> = vec![source_id.to_string()];
    let clause = match relation {
        Some(rel) => {
            args.push(rel.as_str().to_string());
            "source_id = ?1 AND relation = ?2"
        }
        None => "source_id = ?1",
    };
    let sql =
        format!("SELECT {EVENT_COLUMNS} FROM {union} ev WHERE {clause} ORDER BY occurred_at");
    let params: Vec<&dyn rusqlite::ToSql> =
        args.iter().map(|a| a as &dyn rusqlite::ToSql).collect();
    query_events(conn, &sql, &params)
}

/// Events in a time range, oldest first, bounded.
pub fn events_in_range(
    conn: &Connection,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: usize,
) -> LatticeResult<Vec<EdgeEvent>> {
    let union = union_events(conn, from, to)?;
    let mut clauses = vec!["1 = 1".to_string()];
    let mut args: Vec<String> = Vec::new();
    if let Some(from) = from {
        args.push(from.to_rfc3339());
        clauses.push(format!("occurred_at >= ?{}", args.len()));
    }
    if let Some(to) = to {
        args.push(to.to_rfc3339());
        clauses.push(format!("occurred_at <= ?{}", args.len()));
    }
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM {union} ev WHERE {} ORDER BY occurred_at LIMIT {limit}",
        clauses.join(" AND ")
    );
    let params: Vec<&dyn rusqlite::ToSql> =
        args.iter().map(|a| a as &dyn rusqlite::ToSql).collect();
    query_events(conn, &sql, &params)
}

pub(crate) fn query_events(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> LatticeResult<Vec<EdgeEvent>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(args, |row| Ok(row_to_event(row)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(out)
}

pub(crate) fn row_to_event(row: &rusqlite::Row<'_>) -> LatticeResult<EdgeEvent> {
    let relation_str: String = row.get(3).map_err(|e| to_storage_err(e.to_string()))?;
    let relation = EventRelation::parse(&relation_str)
        .ok_or_else(|| to_storage_err(format!("unknown event relation '{relation_str}'")))?;
    let payload_json: String = row.get(6).map_err(|e| to_storage_err(e.to_string()))?;
    let occurred_at_str: String = row.get(7).map_err(|e| to_storage_err(e.to_string()))?;
    Ok(EdgeEvent {
        id: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        source_id: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        target_id: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
        relation,
        success: row
            .get::<_, i32>(4)
            .map_err(|e| to_storage_err(e.to_string()))?
            != 0,
        duration_ms: row.get(5).map_err(|e| to_storage_err(e.to_string()))?,
        payload: serde_json::from_str(&payload_json)
            .map_err(|e| to_storage_err(format!("parse event payload: {e}")))?,
        occurred_at: parse_dt(&occurred_at_str)?,
    })
}
