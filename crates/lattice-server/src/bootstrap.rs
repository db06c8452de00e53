//! Process wiring: config, tracing, engine, tool environment.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use lattice_core::LatticeConfig;
use lattice_embeddings::{create_provider, EmbeddingEngine};
use lattice_storage::GraphEngine;
use lattice_tools::{default_registry, ToolEnv, ToolRegistry};

/// Install the tracing subscriber. Logs go to stderr so stdout stays
/// protocol-clean.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LATTICE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Read config, open the store, wire the tool environment and registry.
pub fn build() -> anyhow::Result<(ToolEnv, ToolRegistry, LatticeConfig)> {
    let config = LatticeConfig::from_env();
    let store = Arc::new(
        GraphEngine::open(&config.db_path)
            .with_context(|| format!("open database at {}", config.db_path.display()))?,
    );
    let provider: Arc<dyn lattice_core::traits::IEmbedder> =
        Arc::from(create_provider(&config.embedder));
    let embeddings = EmbeddingEngine::new(store.clone(), provider, config.allowed_root.clone());
    tracing::info!(
        db = %config.db_path.display(),
        root = %config.allowed_root.display(),
        embedder = embeddings.provider_name(),
        "lattice initialised"
    );
    let env = ToolEnv::new(&config, store, embeddings);
    Ok((env, default_registry(), config))
}
