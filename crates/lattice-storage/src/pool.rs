//! SQLite connection handling for the graph store.
//!
//! One writer, a few read-only companions. Every mutation funnels
//! through the single writer, which is what gives per-entity write
//! ordering without row locks; WAL keeps the readers off the writer's
//! lock entirely. In-memory databases are per-connection in SQLite, so
//! a memory pool skips readers and serves reads from the writer.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};

use lattice_core::LatticeResult;

use crate::to_storage_err;

/// Read connections opened per file-backed pool. A local SQLite file
/// gains nothing from more than a handful.
const READER_COUNT: usize = 4;

/// The connection set behind [`crate::GraphEngine`].
pub struct SqlitePool {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    cursor: AtomicUsize,
}

impl SqlitePool {
    /// Open a pool against a database file: one read-write connection
    /// and `READER_COUNT` read-only ones.
    pub fn open_file(path: &Path) -> LatticeResult<Self> {
        let writer = Connection::open(path)
            .map_err(|e| to_storage_err(format!("open {}: {e}", path.display())))?;
        configure(&writer, true)?;

        let mut readers = Vec::with_capacity(READER_COUNT);
        for _ in 0..READER_COUNT {
            let reader = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| to_storage_err(format!("open reader {}: {e}", path.display())))?;
            configure(&reader, false)?;
            readers.push(Mutex::new(reader));
        }

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Open an in-memory pool (tests). No readers: a second in-memory
    /// connection would be a different database.
    pub fn open_memory() -> LatticeResult<Self> {
        let writer =
            Connection::open_in_memory().map_err(|e| to_storage_err(format!("open memory: {e}")))?;
        configure(&writer, true)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            cursor: AtomicUsize::new(0),
        })
    }

    /// Run a mutation while holding the writer.
    pub fn write<T, F>(&self, op: F) -> LatticeResult<T>
    where
        F: FnOnce(&Connection) -> LatticeResult<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| to_storage_err(format!("writer lock poisoned: {e}")))?;
        op(&conn)
    }

    /// Run a query on the next reader in round-robin order; memory pools
    /// fall through to the writer.
    pub fn read<T, F>(&self, op: F) -> LatticeResult<T>
    where
        F: FnOnce(&Connection) -> LatticeResult<T>,
    {
        if self.readers.is_empty() {
            return self.write(op);
        }
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[slot]
            .lock()
            .map_err(|e| to_storage_err(format!("reader lock poisoned: {e}")))?;
        op(&conn)
    }

    /// Number of read connections (0 for memory pools).
    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }
}

/// Per-connection settings. The writer additionally switches the
/// database into WAL with incremental auto-vacuum; readers only need
/// the lock timeout and foreign-key enforcement.
fn configure(conn: &Connection, writes: bool) -> LatticeResult<()> {
    let pragma = |name: &str, value: &dyn rusqlite::ToSql| {
        conn.pragma_update(None, name, value)
            .map_err(|e| to_storage_err(format!("pragma {name}: {e}")))
    };
    if writes {
        pragma("journal_mode", &"WAL")?;
        pragma("synchronous", &"NORMAL")?;
        pragma("auto_vacuum", &"INCREMENTAL")?;
    }
    pragma("busy_timeout", &5000)?;
    pragma("cache_size", &-64000)?;
    pragma("foreign_keys", &true)?;
    Ok(())
}
