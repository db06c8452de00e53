//! Reads over the version log. Writes happen in the schema itself: the
//! version trigger appends a snapshot on every logical node mutation.

use rusqlite::{params, Connection};

use lattice_core::graph::{Layer, NodeVersion};
use lattice_core::{LatticeError, LatticeResult};

use crate::queries::{parse_dt, OptionalRow};
use crate::to_storage_err;

const VERSION_COLUMNS: &str =
    "node_id, version, layer, node_type, name, payload, content_hash, created_at";

/// All snapshots of a node, oldest first.
pub fn list_versions(conn: &Connection, node_id: &str) -> LatticeResult<Vec<NodeVersion>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM node_versions
             WHERE node_id = ?1 ORDER BY version"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![node_id], |row| Ok(row_to_version(row)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(out)
}

/// Point-in-time read of one snapshot.
pub fn get_version(conn: &Connection, node_id: &str, version: i64) -> LatticeResult<NodeVersion> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM node_versions
             WHERE node_id = ?1 AND version = ?2"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    stmt.query_row(params![node_id, version], |row| Ok(row_to_version(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .transpose()?
        .ok_or_else(|| LatticeError::not_found(format!("version {version} of node {node_id}")))
}

fn row_to_version(row: &rusqlite::Row<'_>) -> LatticeResult<NodeVersion> {
    let layer_str: String = row.get(2).map_err(|e| to_storage_err(e.to_string()))?;
    let layer = Layer::parse(&layer_str)
        .ok_or_else(|| to_storage_err(format!("unknown layer '{layer_str}'")))?;
    let payload_json: String = row.get(5).map_err(|e| to_storage_err(e.to_string()))?;
    let created_at_str: String = row.get(7).map_err(|e| to_storage_err(e.to_string()))?;
    Ok(NodeVersion {
        node_id: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        version: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        layer,
        node_type: row.get(3).map_err(|e| to_storage_err(e.to_string()))?,
        name: row.get(4).map_err(|e| to_storage_err(e.to_string()))?,
        payload: serde_json::from_str(&payload_json)
            .map_err(|e| to_storage_err(format!("parse version payload: {e}")))?,
        content_hash: row.get(6).map_err(|e| to_storage_err(e.to_string()))?,
        created_at: parse_dt(&created_at_str)?,
    })
}
