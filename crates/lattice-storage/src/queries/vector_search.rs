//! Brute-force cosine similarity scan over stored node embeddings.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use lattice_core::graph::{Layer, Node};
use lattice_core::LatticeResult;

use super::bytes_to_f32_vec;
use super::node_crud::{row_to_node, NODE_COLUMNS};
use crate::to_storage_err;

/// A similarity hit: cosine distance in [0, 2] (0 identical, 2 antipodal)
/// and the time the stored embedding was computed.
#[derive(Debug, Clone)]
pub struct SimilarityHit {
    pub node: Node,
    pub distance: f64,
    pub embedded_at: Option<DateTime<Utc>>,
}

/// Scan live embedded nodes and return the `limit` nearest to the query
/// vector, ascending by distance. Optionally restricted to one
/// layer/node_type.
pub fn search_vector(
    conn: &Connection,
    query_embedding: &[f32],
    limit: usize,
    restrict: Option<(Layer, &str)>,
) -> LatticeResult<Vec<SimilarityHit>> {
    let query_norm_sq: f64 = query_embedding
        .iter()
        .map(|x| (*x as f64) * (*x as f64))
        .sum();
    if query_norm_sq == 0.0 {
        return Ok(vec![]);
    }
    let query_len = query_embedding.len();

    let where_clause = match restrict {
        Some(_) => {
            "deleted_at IS NULL AND embedding IS NOT NULL AND layer = ?1 AND node_type = ?2"
        }
        None => "deleted_at IS NULL AND embedding IS NOT NULL",
    };
    let sql = format!("SELECT {NODE_COLUMNS}, embedding FROM nodes WHERE {where_clause}");
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(LatticeResult<Node>, Vec<u8>)> {
        Ok((row_to_node(row), row.get(11)?))
    };
    let mut raw: Vec<(LatticeResult<Node>, Vec<u8>)> = Vec::new();
    match restrict {
        Some((layer, node_type)) => {
            let rows = stmt
                .query_map(rusqlite::params![layer.as_str(), node_type], map_row)
                .map_err(|e| to_storage_err(e.to_string()))?;
            for row in rows {
                raw.push(row.map_err(|e| to_storage_err(e.to_string()))?);
            }
        }
        None => {
            let rows = stmt
                .query_map([], map_row)
                .map_err(|e| to_storage_err(e.to_string()))?;
            for row in rows {
                raw.push(row.map_err(|e| to_storage_err(e.to_string()))?);
            }
        }
    }

    let mut scored: Vec<SimilarityHit> = Vec::new();
    for (node, blob) in raw {
        let node = node?;
        let stored = bytes_to_f32_vec(&blob);
        if stored.len() != query_len {
            continue;
        }
        let distance = 1.0 - cosine_similarity(query_embedding, &stored);
        scored.push(SimilarityHit {
            embedded_at: node.embedded_at,
            node,
            distance,
        });
    }
    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    Ok(scored)
}

/// Live nodes whose stored content hash is absent or differs — the
/// background embed candidates. Bounded.
pub fn embedding_candidates(conn: &Connection, limit: usize) -> LatticeResult<Vec<Node>> {
    let sql = format!(
        "SELECT {NODE_COLUMNS} FROM nodes
         WHERE deleted_at IS NULL
           AND layer IN ('CONTEXT', 'SYSTEM', 'AUTOMATION')
           AND (embedding IS NULL OR embedded_at IS NULL)
         ORDER BY updated_at DESC
         LIMIT {limit}"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok(row_to_node(row)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(out)
}

/// Cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [1.0f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_minus_one() {
        let a = [1.0f32, 0.0];
        let b = [-1.0f32, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_query_returns_empty() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let hits = search_vector(&conn, &[0.0, 0.0], 10, None).unwrap();
        assert!(hits.is_empty());
    }
}
