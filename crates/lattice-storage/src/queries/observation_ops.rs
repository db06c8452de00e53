//! Observation writes and partition-spanning reads.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use lattice_core::graph::Observation;
use lattice_core::LatticeResult;

use super::parse_dt;
use crate::partitions::{self, Family};
use crate::to_storage_err;

const OBSERVATION_COLUMNS: &str = "id, node_id, observation_type, payload, observed_at";

/// Write an observation into its month's partition, creating it on demand.
pub fn create_observation(conn: &Connection, observation: &Observation) -> LatticeResult<()> {
    let table = partitions::ensure_partition(conn, Family::Observations, observation.observed_at)?;
    let payload_json =
        serde_json::to_string(&observation.payload).map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, node_id, observation_type, payload, observed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
        params![
            observation.id,
            observation.node_id,
            observation.observation_type,
            payload_json,
            observation.observed_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_storage_err(format!("create_observation: {e}")))?;
    Ok(())
}

pub(crate) fn union_observations(
    conn: &Connection,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> LatticeResult<String> {
    let parts = partitions::partitions_for_range(conn, Family::Observations, from, to)?;
    Ok(format!(
        "({})",
        parts
            .iter()
            .map(|t| format!("SELECT {OBSERVATION_COLUMNS} FROM {t}"))
            .collect::<Vec<_>>()
            .join(" UNION ALL ")
    ))
}

/// Bounded scan of one observation type over a time range, oldest first.
pub fn list_observations_by_type(
    conn: &Connection,
    observation_type: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: usize,
) -> LatticeResult<Vec<Observation>> {
    let union = union_observations(conn, from, to)?;
    let mut clauses = vec!["observation_type = ?1".to_string()];
    let mut args: Vec<String> = vec![observation_type.to_string()];
    if let Some(from) = from {
        args.push(from.to_rfc3339());
        clauses.push(format!("observed_at >= ?{}", args.len()));
    }
    if let Some(to) = to {
        args.push(to.to_rfc3339());
        clauses.push(format!("observed_at <= ?{}", args.len()));
    }
    let sql = format!(
        "SELECT {OBSERVATION_COLUMNS} FROM {union} obs
         WHERE {} ORDER BY observed_at LIMIT {limit}",
        clauses.join(" AND ")
    );
    query_observations(conn, &sql, &args)
}

/// All observations anchored on one node, newest first, bounded.
pub fn list_observations_for_node(
    conn: &Connection,
    node_id: &str,
    limit: usize,
) -> LatticeResult<Vec<Observation>> {
    let union = union_observations(conn, None, None)?;
    let sql = format!(
        "SELECT {OBSERVATION_COLUMNS} FROM {union} obs
         WHERE node_id = ?1 ORDER BY observed_at DESC LIMIT {limit}"
    );
    query_observations(conn, &sql, &[node_id.to_string()])
}

fn query_observations(
    conn: &Connection,
    sql: &str,
    args: &[String],
) -> LatticeResult<Vec<Observation>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let params: Vec<&dyn rusqlite::ToSql> =
        args.iter().map(|a| a as &dyn rusqlite::ToSql).collect();
    let rows = stmt
        .query_map(params.as_slice(), |row| Ok(row_to_observation(row)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(out)
}

fn row_to_observation(row: &rusqlite::Row<'_>) -> LatticeResult<Observation> {
    let payload_json: String = row.get(3).map_err(|e| to_storage_err(e.to_string()))?;
    let observed_at_str: String = row.get(4).map_err(|e| to_storage_err(e.to_string()))?;
    Ok(Observation {
        id: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        node_id: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        observation_type: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
        payload: serde_json::from_str(&payload_json)
            .map_err(|e| to_storage_err(format!("parse observation payload: {e}")))?,
        observed_at: parse_dt(&observed_at_str)?,
    })
}
