//! v001: nodes, node_versions, telemetry guard, version log trigger.

use rusqlite::Connection;

use lattice_core::LatticeResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> LatticeResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS nodes (
            id           TEXT PRIMARY KEY,
            layer        TEXT NOT NULL
                         CHECK (layer IN ('CONTEXT','SYSTEM','AUTOMATION','OBSERVATION')),
            node_type    TEXT NOT NULL,
            name         TEXT NOT NULL,
            payload      TEXT NOT NULL DEFAULT '{}',
            content_hash TEXT,
            embedding    BLOB,
            embedded_at  TEXT,
            created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            deleted_at   TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_identity
            ON nodes(layer, node_type, name) WHERE deleted_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_nodes_layer_type ON nodes(layer, node_type);
        CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);
        CREATE INDEX IF NOT EXISTS idx_nodes_updated ON nodes(updated_at);

        CREATE TABLE IF NOT EXISTS node_versions (
            node_id      TEXT NOT NULL,
            version      INTEGER NOT NULL,
            layer        TEXT NOT NULL,
            node_type    TEXT NOT NULL,
            name         TEXT NOT NULL,
            payload      TEXT NOT NULL,
            content_hash TEXT,
            created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (node_id, version)
        );

        -- Telemetry guard: rows of layer OBSERVATION never enter the node
        -- table. The enum value exists only so these triggers can reject it.
        CREATE TRIGGER IF NOT EXISTS trg_nodes_telemetry_guard_insert
        BEFORE INSERT ON nodes
        WHEN NEW.layer = 'OBSERVATION'
        BEGIN
            SELECT RAISE(ABORT, 'telemetry must be written to observations');
        END;

        CREATE TRIGGER IF NOT EXISTS trg_nodes_telemetry_guard_update
        BEFORE UPDATE OF layer ON nodes
        WHEN NEW.layer = 'OBSERVATION'
        BEGIN
            SELECT RAISE(ABORT, 'telemetry must be written to observations');
        END;

        -- Version log: every logical mutation appends the new row image
        -- with the next version number. Gap-free by construction.
        -- Embedding writes are deliberately outside the trigger's column
        -- list: they track content, not logical state.
        CREATE TRIGGER IF NOT EXISTS trg_nodes_version_log
        AFTER UPDATE OF layer, node_type, name, payload, deleted_at ON nodes
        BEGIN
            INSERT INTO node_versions
                (node_id, version, layer, node_type, name, payload, content_hash)
            VALUES (
                NEW.id,
                (SELECT COALESCE(MAX(version), 0) + 1
                   FROM node_versions WHERE node_id = NEW.id),
                NEW.layer, NEW.node_type, NEW.name, NEW.payload, NEW.content_hash
            );
        END;
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
