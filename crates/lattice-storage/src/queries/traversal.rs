//! Bounded graph traversal: dependency closures, causal lineage, and
//! shortest path. Every walk carries a visited set; re-entries are skipped.

use std::collections::{HashMap, HashSet, VecDeque};

use rusqlite::{params, Connection};

use lattice_core::graph::{EdgeEvent, Node};
use lattice_core::LatticeResult;

use super::node_crud::{row_to_node, NODE_COLUMNS};
use crate::to_storage_err;

/// One entity reached by a dependency/dependent closure.
#[derive(Debug, Clone)]
pub struct ClosureEntry {
    pub node: Node,
    pub depth: usize,
    /// Node ids from the root (exclusive) to this entry (inclusive).
    pub path: Vec<String>,
}

/// One step of a causal lineage walk. The event carries relation, success
/// and duration; `depth` counts hops from the root.
#[derive(Debug, Clone)]
pub struct LineageStep {
    pub event: EdgeEvent,
    pub depth: usize,
}

/// Transitive closure along `depends_on` edges, outgoing direction.
pub fn dependencies(
    conn: &Connection,
    root_id: &str,
    max_depth: usize,
) -> LatticeResult<Vec<ClosureEntry>> {
    closure(conn, root_id, max_depth, Direction::Outgoing)
}

/// Inverse closure: everything that transitively depends on the root.
pub fn dependents(
    conn: &Connection,
    root_id: &str,
    max_depth: usize,
) -> LatticeResult<Vec<ClosureEntry>> {
    closure(conn, root_id, max_depth, Direction::Incoming)
}

#[derive(Clone, Copy)]
enum Direction {
    Outgoing,
    Incoming,
}

fn closure(
    conn: &Connection,
    root_id: &str,
    max_depth: usize,
    direction: Direction,
) -> LatticeResult<Vec<ClosureEntry>> {
    let mut visited: HashSet<String> = HashSet::from([root_id.to_string()]);
    let mut queue: VecDeque<(String, usize, Vec<String>)> =
        VecDeque::from([(root_id.to_string(), 0, Vec::new())]);
    let mut out = Vec::new();

    while let Some((current, depth, path)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for next_id in depends_on_neighbours(conn, &current, direction)? {
            if !visited.insert(next_id.clone()) {
                continue;
            }
            let Some(node) = super::node_crud::get_node(conn, &next_id)? else {
                continue;
            };
            if !node.is_live() {
                continue;
            }
            let mut next_path = path.clone();
            next_path.push(next_id.clone());
            out.push(ClosureEntry {
                node,
                depth: depth + 1,
                path: next_path.clone(),
            });
            queue.push_back((next_id, depth + 1, next_path));
        }
    }
    Ok(out)
}

fn depends_on_neighbours(
    conn: &Connection,
    id: &str,
    direction: Direction,
) -> LatticeResult<Vec<String>> {
    let sql = match direction {
        Direction::Outgoing => {
            "SELECT target_id FROM edges
             WHERE source_id = ?1 AND relation = 'depends_on' AND deprecated_at IS NULL
             ORDER BY rowid"
        }
        Direction::Incoming => {
            "SELECT source_id FROM edges
             WHERE target_id = ?1 AND relation = 'depends_on' AND deprecated_at IS NULL
             ORDER BY rowid"
        }
    };
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![id], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))
}

/// Walk the causal event chain forward from a root, breadth-first.
pub fn lineage(
    conn: &Connection,
    root_id: &str,
    max_depth: usize,
) -> LatticeResult<Vec<LineageStep>> {
    let mut visited: HashSet<String> = HashSet::from([root_id.to_string()]);
    let mut queue: VecDeque<(String, usize)> = VecDeque::from([(root_id.to_string(), 0)]);
    let mut out = Vec::new();

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for event in super::event_ops::events_from(conn, &current, None)? {
            let target = event.target_id.clone();
            out.push(LineageStep {
                event,
                depth: depth + 1,
            });
            if visited.insert(target.clone()) {
                queue.push_back((target, depth + 1));
            }
        }
    }
    Ok(out)
}

/// Breadth-first shortest path over live edges, either direction. Returns
/// node ids from `from_id` to `to_id` inclusive; no path yields an empty
/// Vec, not an error. Ties break by edge insertion order.
pub fn shortest_path(
    conn: &Connection,
    from_id: &str,
    to_id: &str,
    max_depth: usize,
) -> LatticeResult<Vec<String>> {
    if from_id == to_id {
        return Ok(vec![from_id.to_string()]);
    }
    let mut parent: HashMap<String, String> = HashMap::new();
    let mut visited: HashSet<String> = HashSet::from([from_id.to_string()]);
    let mut queue: VecDeque<(String, usize)> = VecDeque::from([(from_id.to_string(), 0)]);

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for next_id in undirected_neighbours(conn, &current)? {
            if !visited.insert(next_id.clone()) {
                continue;
            }
            parent.insert(next_id.clone(), current.clone());
            if next_id == to_id {
                return Ok(reconstruct(&parent, from_id, to_id));
            }
            queue.push_back((next_id, depth + 1));
        }
    }
    Ok(Vec::new())
}

fn undirected_neighbours(conn: &Connection, id: &str) -> LatticeResult<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT CASE WHEN source_id = ?1 THEN target_id ELSE source_id END
             FROM edges
             WHERE (source_id = ?1 OR target_id = ?1) AND deprecated_at IS NULL
             ORDER BY rowid",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![id], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))
}

fn reconstruct(parent: &HashMap<String, String>, from_id: &str, to_id: &str) -> Vec<String> {
    let mut path = vec![to_id.to_string()];
    let mut current = to_id;
    while current != from_id {
        match parent.get(current) {
            Some(prev) => {
                path.push(prev.clone());
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Fetch a batch of nodes by id, preserving request order, skipping
/// missing ids. Helper for traversal consumers.
pub fn nodes_by_ids(conn: &Connection, ids: &[String]) -> LatticeResult<Vec<Node>> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let mut stmt = conn
            .prepare(&format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1"))
            .map_err(|e| to_storage_err(e.to_string()))?;
        use super::OptionalRow;
        if let Some(node) = stmt
            .query_row(params![id], |row| Ok(row_to_node(row)))
            .optional()
            .map_err(|e| to_storage_err(e.to_string()))?
            .transpose()?
        {
            out.push(node);
        }
    }
    Ok(out)
}
