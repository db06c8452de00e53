//! Insert, get, update, merge, soft-delete, get-or-create for nodes.

use chrono::Utc;
use rusqlite::{params, Connection};

use lattice_core::graph::{Layer, Node};
use lattice_core::{LatticeError, LatticeResult};

use super::{bytes_to_f32_vec, f32_vec_to_bytes, parse_dt, OptionalRow};
use crate::{map_sqlite_err, to_storage_err};

pub(crate) const NODE_COLUMNS: &str = "id, layer, node_type, name, payload, content_hash, \
     embedding, embedded_at, created_at, updated_at, deleted_at";

/// Insert a new node. The telemetry guard trigger is the backstop; the
/// explicit check here produces the friendlier error.
pub fn insert_node(conn: &Connection, node: &Node) -> LatticeResult<()> {
    if node.layer == Layer::Observation {
        return Err(LatticeError::invalid_argument(
            "telemetry must be written to observations, not the node table",
        ));
    }
    let payload_json =
        serde_json::to_string(&node.payload).map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        "INSERT INTO nodes (
            id, layer, node_type, name, payload, content_hash,
            embedding, embedded_at, created_at, updated_at, deleted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            node.id,
            node.layer.as_str(),
            node.node_type,
            node.name,
            payload_json,
            node.content_hash,
            node.embedding.as_deref().map(f32_vec_to_bytes),
            node.embedded_at.map(|t| t.to_rfc3339()),
            node.created_at.to_rfc3339(),
            node.updated_at.to_rfc3339(),
            node.deleted_at.map(|t| t.to_rfc3339()),
        ],
    )
    .map_err(|e| map_sqlite_err(e, "insert_node"))?;
    Ok(())
}

/// Get a node by id, deleted or not.
pub fn get_node(conn: &Connection, id: &str) -> LatticeResult<Option<Node>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1"))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let result = stmt
        .query_row(params![id], |row| Ok(row_to_node(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    result.transpose()
}

/// Get a live node by id. Soft-deleted ids report `NotFound` — they are
/// not part of any live view.
pub fn get_active(conn: &Connection, id: &str) -> LatticeResult<Node> {
    match get_node(conn, id)? {
        Some(node) if node.is_live() => Ok(node),
        Some(_) => Err(LatticeError::not_found(format!("node {id} (deleted)"))),
        None => Err(LatticeError::not_found(format!("node {id}"))),
    }
}

/// Full replacement of the mutable attributes (type, name, payload,
/// content hash) under the live-uniqueness constraint. The version-log
/// trigger appends the snapshot.
pub fn update_node(conn: &Connection, node: &Node) -> LatticeResult<()> {
    let payload_json =
        serde_json::to_string(&node.payload).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = conn
        .execute(
            "UPDATE nodes SET
                node_type = ?2, name = ?3, payload = ?4, content_hash = ?5,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?1 AND deleted_at IS NULL",
            params![
                node.id,
                node.node_type,
                node.name,
                payload_json,
                node.content_hash,
            ],
        )
        .map_err(|e| map_sqlite_err(e, "update_node"))?;
    if rows == 0 {
        return Err(LatticeError::not_found(format!("node {}", node.id)));
    }
    Ok(())
}

/// Shallow merge of payload keys: keys in `patch` overwrite, everything
/// else is preserved. Returns the updated node.
pub fn merge_update(
    conn: &Connection,
    id: &str,
    patch: &serde_json::Map<String, serde_json::Value>,
) -> LatticeResult<Node> {
    let mut node = get_active(conn, id)?;
    let mut merged = match node.payload.take() {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            // Non-object payloads have no keys to merge into; the patch
            // replaces them wholesale under a synthetic object.
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    node.payload = serde_json::Value::Object(merged);
    update_node(conn, &node)?;
    get_active(conn, id)
}

/// Stamp `deleted_at`. The cascade trigger deprecates incident edges.
/// Deleting an already-deleted node is a no-op; an absent id is an error.
pub fn soft_delete(conn: &Connection, id: &str) -> LatticeResult<()> {
    let rows = conn
        .execute(
            "UPDATE nodes
                SET deleted_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
              WHERE id = ?1 AND deleted_at IS NULL",
            params![id],
        )
        .map_err(|e| map_sqlite_err(e, "soft_delete"))?;
    if rows == 0 && get_node(conn, id)?.is_none() {
        return Err(LatticeError::not_found(format!("node {id}")));
    }
    Ok(())
}

/// Race-safe get-or-create: on a uniqueness conflict, another writer won —
/// fetch their row. Returns (node, created).
pub fn get_or_create(
    conn: &Connection,
    layer: Layer,
    node_type: &str,
    name: &str,
    payload: serde_json::Value,
) -> LatticeResult<(Node, bool)> {
    if let Some(existing) = super::node_query::get_by_name(conn, layer, node_type, name)? {
        return Ok((existing, false));
    }
    let node = Node::new(layer, node_type, name, payload);
    match insert_node(conn, &node) {
        Ok(()) => Ok((node, true)),
        Err(LatticeError::Conflict { .. }) => {
            match super::node_query::get_by_name(conn, layer, node_type, name)? {
                Some(existing) => Ok((existing, false)),
                None => Err(LatticeError::conflict(format!(
                    "{layer}.{node_type} '{name}': unique violation with no surviving row"
                ))),
            }
        }
        Err(e) => Err(e),
    }
}

/// Store the result of a background embed: the hash the vector was
/// computed from, the vector, and the embed timestamp. Deliberately does
/// not touch `updated_at` — embedding is not activity — and stays outside
/// the version-log trigger's column list.
pub fn update_embedding(
    conn: &Connection,
    id: &str,
    content_hash: &str,
    embedding: &[f32],
) -> LatticeResult<()> {
    let rows = conn
        .execute(
            "UPDATE nodes SET
                content_hash = ?2,
                embedding = ?3,
                embedded_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?1 AND deleted_at IS NULL",
            params![id, content_hash, f32_vec_to_bytes(embedding)],
        )
        .map_err(|e| map_sqlite_err(e, "update_embedding"))?;
    if rows == 0 {
        return Err(LatticeError::not_found(format!("node {id}")));
    }
    Ok(())
}

/// Parse a row in `NODE_COLUMNS` order into a Node.
pub(crate) fn row_to_node(row: &rusqlite::Row<'_>) -> LatticeResult<Node> {
    let layer_str: String = row.get(1).map_err(|e| to_storage_err(e.to_string()))?;
    let layer = Layer::parse(&layer_str)
        .ok_or_else(|| to_storage_err(format!("unknown layer '{layer_str}'")))?;
    let payload_json: String = row.get(4).map_err(|e| to_storage_err(e.to_string()))?;
    let payload = serde_json::from_str(&payload_json)
        .map_err(|e| to_storage_err(format!("parse payload: {e}")))?;
    let embedding_blob: Option<Vec<u8>> = row.get(6).map_err(|e| to_storage_err(e.to_string()))?;
    let embedded_at_str: Option<String> = row.get(7).map_err(|e| to_storage_err(e.to_string()))?;
    let created_at_str: String = row.get(8).map_err(|e| to_storage_err(e.to_string()))?;
    let updated_at_str: String = row.get(9).map_err(|e| to_storage_err(e.to_string()))?;
    let deleted_at_str: Option<String> = row.get(10).map_err(|e| to_storage_err(e.to_string()))?;

    Ok(Node {
        id: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        layer,
        node_type: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
        name: row.get(3).map_err(|e| to_storage_err(e.to_string()))?,
        payload,
        content_hash: row.get(5).map_err(|e| to_storage_err(e.to_string()))?,
        embedding: embedding_blob.map(|b| bytes_to_f32_vec(&b)),
        embedded_at: embedded_at_str.as_deref().map(parse_dt).transpose()?,
        created_at: parse_dt(&created_at_str)?,
        updated_at: parse_dt(&updated_at_str)?,
        deleted_at: deleted_at_str.as_deref().map(parse_dt).transpose()?,
    })
}

/// Touch a node's `updated_at` without changing logical state. Used by the
/// working-set trim to mark activity explicitly.
pub fn touch(conn: &Connection, id: &str) -> LatticeResult<()> {
    conn.execute(
        "UPDATE nodes SET updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        params![id, Utc::now().to_rfc3339()],
    )
    .map_err(|e| map_sqlite_err(e, "touch"))?;
    Ok(())
}
