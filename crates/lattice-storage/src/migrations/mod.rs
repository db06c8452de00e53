//! Numbered schema migrations. Each module owns one version and is applied
//! at most once, tracked in `schema_migrations`.

pub mod v001_nodes;
pub mod v002_edges;
pub mod v003_partitions;

use rusqlite::Connection;

use lattice_core::LatticeResult;

use crate::to_storage_err;

const MIGRATIONS: &[(u32, fn(&Connection) -> LatticeResult<()>)] = &[
    (1, v001_nodes::migrate),
    (2, v002_edges::migrate),
    (3, v003_partitions::migrate),
];

/// Run all pending migrations in order.
pub fn run_migrations(conn: &Connection) -> LatticeResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    for (version, migrate) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        migrate(conn)?;
        conn.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| to_storage_err(format!("record migration v{version}: {e}")))?;
        tracing::debug!(version, "applied schema migration");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let version: u32 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().0);
    }
}
