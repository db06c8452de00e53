//! Batched aggregation queries: activity enrichment for retrieval,
//! session co-occurrence, and graph stats.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use lattice_core::LatticeResult;

use super::{event_ops, parse_dt};
use crate::partitions::{self, Family};
use crate::to_storage_err;

/// Modification/observation activity for one node, from causal events.
#[derive(Debug, Clone, Default)]
pub struct ActivityStats {
    pub last_modified: Option<DateTime<Utc>>,
    pub modified_count: i64,
    pub last_observed: Option<DateTime<Utc>>,
}

/// One batched query per chunk: max `modified` timestamp, `modified`
/// count, and max `observed` timestamp for each id.
pub fn file_activity(
    conn: &Connection,
    ids: &[String],
) -> LatticeResult<HashMap<String, ActivityStats>> {
    let mut out: HashMap<String, ActivityStats> = HashMap::new();
    if ids.is_empty() {
        return Ok(out);
    }
    let union = event_ops::union_events(conn, None, None)?;
    for chunk in ids.chunks(250) {
        let placeholders = (1..=chunk.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT target_id, relation, MAX(occurred_at), COUNT(*)
             FROM {union} ev
             WHERE target_id IN ({placeholders})
               AND relation IN ('modified', 'observed')
             GROUP BY target_id, relation"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| to_storage_err(e.to_string()))?;
        let params: Vec<&dyn rusqlite::ToSql> =
            chunk.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|e| to_storage_err(e.to_string()))?;
        for row in rows {
            let (target_id, relation, max_ts, count) =
                row.map_err(|e| to_storage_err(e.to_string()))?;
            let stats = out.entry(target_id).or_default();
            let ts = parse_dt(&max_ts)?;
            match relation.as_str() {
                "modified" => {
                    stats.last_modified = Some(ts);
                    stats.modified_count = count;
                }
                "observed" => stats.last_observed = Some(ts),
                _ => {}
            }
        }
    }
    Ok(out)
}

/// For each item, the number of distinct sessions that both `triggered`
/// the task and `modified`/`observed` the item.
pub fn session_cooccurrence(
    conn: &Connection,
    task_id: &str,
    item_ids: &[String],
) -> LatticeResult<HashMap<String, i64>> {
    let mut out = HashMap::new();
    if item_ids.is_empty() {
        return Ok(out);
    }
    let union = event_ops::union_events(conn, None, None)?;
    for chunk in item_ids.chunks(250) {
        let placeholders = (2..=chunk.len() + 1)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT b.target_id, COUNT(DISTINCT a.source_id)
             FROM {union} a
             JOIN {union} b ON a.source_id = b.source_id
             WHERE a.target_id = ?1 AND a.relation = 'triggered'
               AND b.target_id IN ({placeholders})
               AND b.relation IN ('modified', 'observed')
             GROUP BY b.target_id"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| to_storage_err(e.to_string()))?;
        let mut params: Vec<&dyn rusqlite::ToSql> = vec![&task_id];
        params.extend(chunk.iter().map(|id| id as &dyn rusqlite::ToSql));
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| to_storage_err(e.to_string()))?;
        for row in rows {
            let (id, count) = row.map_err(|e| to_storage_err(e.to_string()))?;
            out.insert(id, count);
        }
    }
    Ok(out)
}

/// Coarse graph statistics for the admin surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GraphStats {
    pub nodes_total: i64,
    pub nodes_live: i64,
    pub nodes_by_layer: HashMap<String, i64>,
    pub edges_total: i64,
    pub edges_live: i64,
    pub edges_by_relation: HashMap<String, i64>,
    pub event_partitions: usize,
    pub observation_partitions: usize,
}

pub fn graph_stats(conn: &Connection) -> LatticeResult<GraphStats> {
    let count = |sql: &str| -> LatticeResult<i64> {
        conn.query_row(sql, [], |row| row.get(0))
            .map_err(|e| to_storage_err(e.to_string()))
    };
    let mut nodes_by_layer = HashMap::new();
    let mut stmt = conn
        .prepare("SELECT layer, COUNT(*) FROM nodes WHERE deleted_at IS NULL GROUP BY layer")
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    for row in rows {
        let (layer, n) = row.map_err(|e| to_storage_err(e.to_string()))?;
        nodes_by_layer.insert(layer, n);
    }

    let mut edges_by_relation = HashMap::new();
    let mut stmt = conn
        .prepare(
            "SELECT relation, COUNT(*) FROM edges WHERE deprecated_at IS NULL GROUP BY relation",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    for row in rows {
        let (relation, n) = row.map_err(|e| to_storage_err(e.to_string()))?;
        edges_by_relation.insert(relation, n);
    }

    Ok(GraphStats {
        nodes_total: count("SELECT COUNT(*) FROM nodes")?,
        nodes_live: count("SELECT COUNT(*) FROM nodes WHERE deleted_at IS NULL")?,
        nodes_by_layer,
        edges_total: count("SELECT COUNT(*) FROM edges")?,
        edges_live: count("SELECT COUNT(*) FROM edges WHERE deprecated_at IS NULL")?,
        edges_by_relation,
        event_partitions: partitions::list_partitions(conn, Family::EdgeEvents)?.len(),
        observation_partitions: partitions::list_partitions(conn, Family::Observations)?.len(),
    })
}
