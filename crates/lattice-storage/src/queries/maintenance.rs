//! Storage maintenance: partition upkeep, vacuum, checkpoint, and the
//! working-set trim.

use rusqlite::Connection;

use lattice_core::constants::{FUTURE_PARTITIONS, WORKING_SET_LIMIT};
use lattice_core::LatticeResult;

use crate::partitions::{self, Family};
use crate::to_storage_err;

/// One maintenance tick: ensure future partitions exist, then drain both
/// default partitions in batches until empty. Returns rows relocated.
/// A failed batch is recoverable — the next tick resumes where it left off.
pub fn partition_maintenance(conn: &Connection) -> LatticeResult<usize> {
    partitions::ensure_future_partitions(conn, FUTURE_PARTITIONS)?;
    let mut moved = 0usize;
    for family in [Family::EdgeEvents, Family::Observations] {
        loop {
            let batch = partitions::drain_default(conn, family)?;
            moved += batch;
            if batch == 0 {
                break;
            }
        }
    }
    if moved > 0 {
        tracing::info!(rows = moved, "drained default partitions");
    }
    Ok(moved)
}

/// Reclaim free pages.
pub fn full_vacuum(conn: &Connection) -> LatticeResult<()> {
    conn.execute_batch("VACUUM")
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Fold the WAL back into the main database file.
pub fn wal_checkpoint(conn: &Connection) -> LatticeResult<()> {
    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Trim the working set to its cardinality bound: among live CONTEXT
/// nodes flagged `working_set`, keep the most recently updated
/// `WORKING_SET_LIMIT` and clear the flag on the rest. Returns the number
/// of nodes evicted.
pub fn trim_working_set(conn: &Connection) -> LatticeResult<usize> {
    let mut stmt = conn
        .prepare(
            "SELECT id FROM nodes
             WHERE deleted_at IS NULL
               AND layer = 'CONTEXT'
               AND json_extract(payload, '$.working_set') = 1
             ORDER BY updated_at DESC",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let ids: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<_, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    drop(stmt);

    let evict = ids.iter().skip(WORKING_SET_LIMIT);
    let mut evicted = 0usize;
    for id in evict {
        conn.execute(
            "UPDATE nodes
                SET payload = json_set(payload, '$.working_set', json('false')),
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
              WHERE id = ?1",
            [id],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        evicted += 1;
    }
    if evicted > 0 {
        tracing::debug!(evicted, "trimmed working set");
    }
    Ok(evicted)
}
