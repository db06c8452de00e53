//! # lattice-tools
//!
//! The tool registry and dispatcher that drive both external surfaces.
//! A tool is a named, schema-validated, tagged unit of work; the
//! dispatcher validates arguments, evaluates the challenge gate, runs the
//! handler under the caller's deadline, and records an observation.

pub mod context;
pub mod dispatcher;
pub mod fs;
pub mod graph_tools;
pub mod path_guard;
pub mod query_tool;
pub mod registry;

pub use context::ToolEnv;
pub use dispatcher::{run_tool, RunOptions, ToolOutcome, ToolResult};
pub use registry::{Tool, ToolRegistry, ToolTag};

use std::sync::Arc;

/// Build the full default registry: filesystem, graph, automation, and
/// admin tools. Registered once at process start; read-only after.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in fs::tools() {
        registry.register(tool);
    }
    for tool in graph_tools::tools() {
        registry.register(tool);
    }
    registry.register(Arc::new(query_tool::QueryTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_no_duplicate_names() {
        let registry = default_registry();
        let defs = registry.list();
        let mut names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(before, names.len());
        assert!(before > 20, "expected a full registry, got {before}");
    }
}
