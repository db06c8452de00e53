//! The tool-server binary: line-delimited JSON-RPC 2.0 on stdin/stdout.
//! Exits 0 on clean EOF, non-zero on fatal I/O.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use lattice_server::{bootstrap, rpc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init_tracing();
    let (env, registry, _config) = bootstrap::build()?;
    tracing::info!(tools = registry.len(), "tool server listening on stdin");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await.context("read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = rpc::handle_line(&registry, &env, &line).await {
            let mut encoded =
                serde_json::to_vec(&response).context("encode json-rpc response")?;
            encoded.push(b'\n');
            stdout.write_all(&encoded).await.context("write stdout")?;
            stdout.flush().await.context("flush stdout")?;
        }
    }
    tracing::info!("stdin closed, shutting down");
    Ok(())
}
