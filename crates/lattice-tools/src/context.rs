//! The shared environment handed to every tool handler.

use std::path::PathBuf;
use std::sync::Arc;

use lattice_core::LatticeConfig;
use lattice_embeddings::EmbeddingEngine;
use lattice_evolution::WorkOrderMachine;
use lattice_retrieval::PackAssembler;
use lattice_storage::GraphEngine;

/// Everything a tool can reach. Built once at process start and shared
/// across all in-flight requests; nothing here is request-scoped.
pub struct ToolEnv {
    pub store: Arc<GraphEngine>,
    pub embeddings: EmbeddingEngine,
    pub assembler: PackAssembler,
    pub work_orders: WorkOrderMachine,
    /// The single allowed filesystem root for path arguments.
    pub allowed_root: PathBuf,
    pub gc: lattice_core::config::GcPolicy,
}

impl ToolEnv {
    /// Wire the environment from config plus an opened store.
    pub fn new(
        config: &LatticeConfig,
        store: Arc<GraphEngine>,
        embeddings: EmbeddingEngine,
    ) -> Self {
        let assembler = PackAssembler::new(store.clone(), embeddings.clone());
        let work_orders = WorkOrderMachine::new(store.clone());
        Self {
            store,
            embeddings,
            assembler,
            work_orders,
            allowed_root: config.allowed_root.clone(),
            gc: config.gc.clone(),
        }
    }
}
