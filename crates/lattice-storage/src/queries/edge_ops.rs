//! Edge create/deprecate/list.

use rusqlite::{params, Connection};

use lattice_core::graph::{Edge, EdgeFilter, Relation};
use lattice_core::{LatticeError, LatticeResult};

use super::{parse_dt, OptionalRow};
use crate::{map_sqlite_err, to_storage_err};

const EDGE_COLUMNS: &str = "id, source_id, target_id, relation, payload, created_at, deprecated_at";

/// Create an edge. Both endpoints must be live.
pub fn create_edge(conn: &Connection, edge: &Edge) -> LatticeResult<()> {
    for endpoint in [&edge.source_id, &edge.target_id] {
        let node = super::node_crud::get_node(conn, endpoint)?
            .ok_or_else(|| LatticeError::not_found(format!("node {endpoint}")))?;
        if !node.is_live() {
            return Err(LatticeError::invalid_argument(format!(
                "cannot link deleted node {endpoint}"
            )));
        }
    }
    let payload_json =
        serde_json::to_string(&edge.payload).map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        "INSERT INTO edges (id, source_id, target_id, relation, payload, created_at, deprecated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            edge.id,
            edge.source_id,
            edge.target_id,
            edge.relation.as_str(),
            payload_json,
            edge.created_at.to_rfc3339(),
            edge.deprecated_at.map(|t| t.to_rfc3339()),
        ],
    )
    .map_err(|e| map_sqlite_err(e, "create_edge"))?;
    Ok(())
}

/// Stamp `deprecated_at` on a live edge. Idempotent for already-deprecated
/// edges; an absent id is an error.
pub fn deprecate_edge(conn: &Connection, id: &str) -> LatticeResult<()> {
    let rows = conn
        .execute(
            "UPDATE edges
                SET deprecated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
              WHERE id = ?1 AND deprecated_at IS NULL",
            params![id],
        )
        .map_err(|e| map_sqlite_err(e, "deprecate_edge"))?;
    if rows == 0 {
        let exists: bool = conn
            .query_row("SELECT 1 FROM edges WHERE id = ?1", params![id], |_| Ok(true))
            .optional()
            .map_err(|e| to_storage_err(e.to_string()))?
            .unwrap_or(false);
        if !exists {
            return Err(LatticeError::not_found(format!("edge {id}")));
        }
    }
    Ok(())
}

pub fn get_edge(conn: &Connection, id: &str) -> LatticeResult<Option<Edge>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {EDGE_COLUMNS} FROM edges WHERE id = ?1"))
        .map_err(|e| to_storage_err(e.to_string()))?;
    stmt.query_row(params![id], |row| Ok(row_to_edge(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .transpose()
}

/// List edges matching the filter, insertion order.
pub fn list_edges(conn: &Connection, filter: &EdgeFilter) -> LatticeResult<Vec<Edge>> {
    let mut clauses: Vec<String> = vec!["1 = 1".to_string()];
    let mut args: Vec<String> = Vec::new();
    if let Some(source_id) = &filter.source_id {
        args.push(source_id.clone());
        clauses.push(format!("source_id = ?{}", args.len()));
    }
    if let Some(target_id) = &filter.target_id {
        args.push(target_id.clone());
        clauses.push(format!("target_id = ?{}", args.len()));
    }
    if let Some(relation) = filter.relation {
        args.push(relation.as_str().to_string());
        clauses.push(format!("relation = ?{}", args.len()));
    }
    if filter.live_only {
        clauses.push("deprecated_at IS NULL".to_string());
    }
    let sql = format!(
        "SELECT {EDGE_COLUMNS} FROM edges WHERE {} ORDER BY rowid",
        clauses.join(" AND ")
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let params: Vec<&dyn rusqlite::ToSql> =
        args.iter().map(|a| a as &dyn rusqlite::ToSql).collect();
    let rows = stmt
        .query_map(params.as_slice(), |row| Ok(row_to_edge(row)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(out)
}

/// All live edges incident to any of `ids`, either direction, one query
/// per chunk. Used by graph expansion and proximity scoring.
pub fn live_edges_touching(conn: &Connection, ids: &[String]) -> LatticeResult<Vec<Edge>> {
    let mut out = Vec::new();
    for chunk in ids.chunks(250) {
        let placeholders = (1..=chunk.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM edges
             WHERE deprecated_at IS NULL
               AND (source_id IN ({placeholders}) OR target_id IN ({placeholders}))
             ORDER BY rowid"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| to_storage_err(e.to_string()))?;
        let params: Vec<&dyn rusqlite::ToSql> =
            chunk.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(params.as_slice(), |row| Ok(row_to_edge(row)))
            .map_err(|e| to_storage_err(e.to_string()))?;
        for row in rows {
            out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
        }
    }
    Ok(out)
}

pub(crate) fn row_to_edge(row: &rusqlite::Row<'_>) -> LatticeResult<Edge> {
    let relation_str: String = row.get(3).map_err(|e| to_storage_err(e.to_string()))?;
    let relation = Relation::parse(&relation_str)
        .ok_or_else(|| to_storage_err(format!("unknown relation '{relation_str}'")))?;
    let payload_json: String = row.get(4).map_err(|e| to_storage_err(e.to_string()))?;
    let created_at_str: String = row.get(5).map_err(|e| to_storage_err(e.to_string()))?;
    let deprecated_at_str: Option<String> =
        row.get(6).map_err(|e| to_storage_err(e.to_string()))?;
    Ok(Edge {
        id: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        source_id: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        target_id: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
        relation,
        payload: serde_json::from_str(&payload_json)
            .map_err(|e| to_storage_err(format!("parse edge payload: {e}")))?,
        created_at: parse_dt(&created_at_str)?,
        deprecated_at: deprecated_at_str.as_deref().map(parse_dt).transpose()?,
    })
}
