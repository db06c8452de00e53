//! Name, path, list and filter queries over nodes.

use rusqlite::{params, Connection};

use lattice_core::graph::{node_types, Layer, NameMatch, Node, NodeFilter};
use lattice_core::LatticeResult;

use super::node_crud::{row_to_node, NODE_COLUMNS};
use super::OptionalRow;
use crate::to_storage_err;

/// Look up a live node by its identity triple.
pub fn get_by_name(
    conn: &Connection,
    layer: Layer,
    node_type: &str,
    name: &str,
) -> LatticeResult<Option<Node>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes
             WHERE layer = ?1 AND node_type = ?2 AND name = ?3 AND deleted_at IS NULL"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    stmt.query_row(params![layer.as_str(), node_type, name], |row| {
        Ok(row_to_node(row))
    })
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))?
    .transpose()
}

/// Look up a SYSTEM.file node by path: exact name first, then a
/// basename-suffix fallback (`…/basename`), newest match wins.
pub fn get_by_path(conn: &Connection, path: &str) -> LatticeResult<Option<Node>> {
    if let Some(exact) = get_by_name(conn, Layer::System, node_types::FILE, path)? {
        return Ok(Some(exact));
    }
    let basename = path.rsplit('/').next().unwrap_or(path);
    if basename.is_empty() {
        return Ok(None);
    }
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes
             WHERE layer = 'SYSTEM' AND node_type = 'file' AND deleted_at IS NULL
               AND name LIKE ?1
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    stmt.query_row(params![format!("%/{basename}")], |row| Ok(row_to_node(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .transpose()
}

/// List live nodes, newest first.
pub fn list(conn: &Connection, limit: usize) -> LatticeResult<Vec<Node>> {
    query_nodes(
        conn,
        "deleted_at IS NULL",
        &[],
        limit.min(lattice_core::constants::MAX_LIST_LIMIT),
    )
}

pub fn list_by_layer(conn: &Connection, layer: Layer, limit: usize) -> LatticeResult<Vec<Node>> {
    query_nodes(
        conn,
        "deleted_at IS NULL AND layer = ?1",
        &[&layer.as_str()],
        limit.min(lattice_core::constants::MAX_LIST_LIMIT),
    )
}

pub fn list_by_layer_type(
    conn: &Connection,
    layer: Layer,
    node_type: &str,
    limit: usize,
) -> LatticeResult<Vec<Node>> {
    query_nodes(
        conn,
        "deleted_at IS NULL AND layer = ?1 AND node_type = ?2",
        &[&layer.as_str(), &node_type],
        limit.min(lattice_core::constants::MAX_LIST_LIMIT),
    )
}

/// Filtered search over live nodes. Scalar predicates run in SQL; the
/// payload containment predicate is applied while streaming rows so the
/// limit counts matching rows only.
pub fn search(conn: &Connection, filter: &NodeFilter) -> LatticeResult<Vec<Node>> {
    let mut clauses: Vec<String> = vec!["deleted_at IS NULL".to_string()];
    let mut args: Vec<String> = Vec::new();

    if let Some(layer) = filter.layer {
        args.push(layer.as_str().to_string());
        clauses.push(format!("layer = ?{}", args.len()));
    }
    if let Some(node_type) = &filter.node_type {
        args.push(node_type.clone());
        clauses.push(format!("node_type = ?{}", args.len()));
    }
    if let Some(pattern) = &filter.name_pattern {
        let like = match filter.name_match {
            NameMatch::Prefix => format!("{}%", escape_like(pattern)),
            NameMatch::Substring => format!("%{}%", escape_like(pattern)),
        };
        args.push(like);
        clauses.push(format!("LOWER(name) LIKE LOWER(?{}) ESCAPE '\\'", args.len()));
    }

    let sql = format!(
        "SELECT {NODE_COLUMNS} FROM nodes WHERE {} ORDER BY created_at DESC",
        clauses.join(" AND ")
    );
    let limit = filter.effective_limit();

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let params: Vec<&dyn rusqlite::ToSql> =
        args.iter().map(|a| a as &dyn rusqlite::ToSql).collect();
    let rows = stmt
        .query_map(params.as_slice(), |row| Ok(row_to_node(row)))
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut out = Vec::new();
    for row in rows {
        let node = row.map_err(|e| to_storage_err(e.to_string()))??;
        if let Some(wanted) = &filter.payload_contains {
            if !payload_contains(&node.payload, wanted) {
                continue;
            }
        }
        out.push(node);
        if out.len() >= limit {
            break;
        }
    }
    Ok(out)
}

/// Shallow containment: every key/value in `wanted` equals the payload's.
fn payload_contains(
    payload: &serde_json::Value,
    wanted: &serde_json::Map<String, serde_json::Value>,
) -> bool {
    let serde_json::Value::Object(map) = payload else {
        return wanted.is_empty();
    };
    wanted.iter().all(|(k, v)| map.get(k) == Some(v))
}

fn escape_like(pattern: &str) -> String {
    pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn query_nodes(
    conn: &Connection,
    where_clause: &str,
    args: &[&dyn rusqlite::ToSql],
    limit: usize,
) -> LatticeResult<Vec<Node>> {
    let sql = format!(
        "SELECT {NODE_COLUMNS} FROM nodes WHERE {where_clause}
         ORDER BY created_at DESC LIMIT {limit}"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(args, |row| Ok(row_to_node(row)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(out)
}

/// Batch fetch by ids, live or deleted, in one statement per chunk.
pub fn get_bulk(conn: &Connection, ids: &[String]) -> LatticeResult<Vec<Node>> {
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(500) {
        let placeholders = (1..=chunk.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id IN ({placeholders})");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| to_storage_err(e.to_string()))?;
        let params: Vec<&dyn rusqlite::ToSql> =
            chunk.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(params.as_slice(), |row| Ok(row_to_node(row)))
            .map_err(|e| to_storage_err(e.to_string()))?;
        for row in rows {
            out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
        }
    }
    Ok(out)
}
