/// Lattice system version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default and maximum list limits for node queries.
pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 1000;

/// Similarity search limit cap.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Default traversal depth for entity closures.
pub const DEFAULT_TRAVERSAL_DEPTH: usize = 10;

/// Default traversal depth for causal lineage walks.
pub const DEFAULT_LINEAGE_DEPTH: usize = 20;

/// Working set cardinality bound.
pub const WORKING_SET_LIMIT: usize = 25;

/// Grep caps.
pub const DEFAULT_GREP_MATCH_LIMIT: usize = 100;
pub const MAX_GREP_MATCH_LIMIT: usize = 1000;
pub const MAX_GREP_FILES: usize = 10_000;

/// Largest regular file that gets a content hash on read/write (bytes).
pub const MAX_HASHABLE_FILE_BYTES: u64 = 64 * 1024;

/// Number of future monthly partitions the maintenance routine keeps ahead.
pub const FUTURE_PARTITIONS: u32 = 3;

/// Rows moved per batch when draining a default partition.
pub const PARTITION_DRAIN_BATCH: usize = 500;

/// GC retention defaults (days).
pub const SESSION_RETENTION_DAYS: i64 = 14;
pub const COMPRESSED_RETENTION_DAYS: i64 = 30;

/// Recency half-life used by the context pack assembler (days).
pub const RECENCY_HALF_LIFE_DAYS: f64 = 7.0;
