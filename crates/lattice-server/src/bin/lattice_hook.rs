//! The hook binary: best-effort ingestion of line-delimited session/tool
//! event records. Exits 0 after draining stdin; only a storage failure at
//! startup is fatal.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use lattice_server::{bootstrap, hook};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init_tracing();
    let (env, _registry, _config) = bootstrap::build()?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut ingested = 0usize;
    let mut failed = 0usize;

    while let Some(line) = lines.next_line().await.context("read stdin")? {
        if hook::ingest_line(&env, &line) {
            ingested += 1;
        } else {
            failed += 1;
        }
    }
    tracing::info!(ingested, failed, "hook ingestion complete");
    Ok(())
}
