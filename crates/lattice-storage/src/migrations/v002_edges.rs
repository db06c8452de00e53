//! v002: edges and the soft-delete cascade trigger.

use rusqlite::Connection;

use lattice_core::LatticeResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> LatticeResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS edges (
            id            TEXT PRIMARY KEY,
            source_id     TEXT NOT NULL REFERENCES nodes(id),
            target_id     TEXT NOT NULL REFERENCES nodes(id),
            relation      TEXT NOT NULL,
            payload       TEXT NOT NULL DEFAULT '{}',
            created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            deprecated_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
        CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
        CREATE INDEX IF NOT EXISTS idx_edges_relation ON edges(relation);

        -- Cascade: soft-deleting a node deprecates every live incident edge,
        -- keeping the both-endpoints-live invariant without touching history.
        CREATE TRIGGER IF NOT EXISTS trg_nodes_edge_cascade
        AFTER UPDATE OF deleted_at ON nodes
        WHEN NEW.deleted_at IS NOT NULL AND OLD.deleted_at IS NULL
        BEGIN
            UPDATE edges
               SET deprecated_at = NEW.deleted_at
             WHERE deprecated_at IS NULL
               AND (source_id = NEW.id OR target_id = NEW.id);
        END;
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
