//! v003: default partitions for the two monthly-partitioned families.
//!
//! Month partitions themselves are created on demand by
//! `crate::partitions`; the defaults exist from the start so a write for
//! an unanticipated month always has somewhere to land.

use rusqlite::Connection;

use lattice_core::LatticeResult;

use crate::partitions;
use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> LatticeResult<()> {
    conn.execute_batch(&format!(
        "{}\n{}",
        partitions::edge_events_ddl("edge_events_default"),
        partitions::observations_ddl("observations_default"),
    ))
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
