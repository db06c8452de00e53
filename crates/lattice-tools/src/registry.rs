//! The tool registry: single source of truth for what the surfaces can
//! invoke. Written once at process start, lock-free reads afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use lattice_core::LatticeResult;

use crate::context::ToolEnv;

/// Capability tags a tool declares. `write` tools get their modified
/// paths recorded in the invocation observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolTag {
    Read,
    Write,
    Admin,
    Fs,
    Graph,
    Automation,
}

/// A named unit of work with a JSON-schema input contract.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON Schema for the `args` object.
    fn input_schema(&self) -> serde_json::Value;
    fn tags(&self) -> &'static [ToolTag];

    /// An optional confirmation gate. A `Some` return is handed back to
    /// the caller unexecuted unless the invocation carries `confirm`.
    fn challenge(&self, _args: &serde_json::Value) -> Option<String> {
        None
    }

    async fn run(&self, env: &ToolEnv, args: serde_json::Value)
        -> LatticeResult<serde_json::Value>;
}

/// Summary of a registered tool, as exposed by `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

pub(crate) struct RegisteredTool {
    pub tool: Arc<dyn Tool>,
    /// Validator compiled once at registration.
    pub validator: jsonschema::Validator,
}

/// Name-keyed registry. Duplicate registrations no-op, keeping the first.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. A duplicate name is ignored (first wins), a
    /// schema that fails to compile is a startup bug and panics here.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if self.tools.contains_key(name) {
            tracing::warn!(tool = name, "duplicate tool registration ignored");
            return;
        }
        let schema = tool.input_schema();
        let validator = jsonschema::validator_for(&schema)
            .unwrap_or_else(|e| panic!("tool {name} has an invalid input schema: {e}"));
        self.tools.insert(name, RegisteredTool { tool, validator });
    }

    pub(crate) fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Stable-ordered tool summaries.
    pub fn list(&self) -> Vec<ToolDef> {
        self.tools
            .values()
            .map(|registered| ToolDef {
                name: registered.tool.name().to_string(),
                description: registered.tool.description().to_string(),
                input_schema: registered.tool.input_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Probe;

    #[async_trait]
    impl Tool for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }
        fn description(&self) -> &'static str {
            "test probe"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}})
        }
        fn tags(&self) -> &'static [ToolTag] {
            &[ToolTag::Read]
        }
        async fn run(
            &self,
            _env: &ToolEnv,
            _args: serde_json::Value,
        ) -> LatticeResult<serde_json::Value> {
            Ok(json!({"ok": true}))
        }
    }

    #[test]
    fn duplicate_registration_is_a_no_op() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Probe));
        registry.register(Arc::new(Probe));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn list_exposes_input_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Probe));
        let defs = registry.list();
        assert_eq!(defs[0].name, "probe");
        assert_eq!(defs[0].input_schema["type"], "object");
    }
}
