//! The context pack: structured result plus the fixed-line human form.

use serde::{Deserialize, Serialize};

use lattice_core::graph::{Layer, Node};

use crate::profile::RetrievalProfile;
use crate::signals::Signals;

/// One ranked item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackItem {
    pub node: Node,
    /// Weighted blend of the four signals.
    pub score: f64,
    pub signals: Signals,
    /// Cosine distance the item entered the pipeline with (2.0 for
    /// expansion-added neighbours).
    pub distance: f64,
    /// English explanation of the dominant signal(s).
    pub why: String,
}

/// A live CONTEXT.constraint rendered into the annex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintNote {
    pub name: String,
    pub text: String,
}

/// The assembled pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPack {
    pub query: String,
    pub profile: RetrievalProfile,
    pub items: Vec<PackItem>,
    pub constraints: Vec<ConstraintNote>,
}

impl ContextPack {
    pub fn empty(query: &str, profile: RetrievalProfile) -> Self {
        Self {
            query: query.to_string(),
            profile,
            items: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Fixed-line human rendering: one line per item, SYSTEM.files
    /// prefixed with their path, everything else with `[layer.type] name`,
    /// score to two decimals, indented summary when present, then the
    /// constraints block.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            let prefix = if item.node.is_file() {
                item.node.name.clone()
            } else {
                format!(
                    "[{}.{}] {}",
                    layer_tag(item.node.layer),
                    item.node.node_type,
                    item.node.name
                )
            };
            out.push_str(&format!("{prefix} ({:.2}) — {}\n", item.score, item.why));
            if let Some(summary) = item.node.payload.get("summary").and_then(|v| v.as_str()) {
                for line in summary.lines() {
                    out.push_str("    ");
                    out.push_str(line.trim_start());
                    out.push('\n');
                }
            }
        }
        if !self.constraints.is_empty() {
            out.push_str("Constraints:\n");
            for constraint in &self.constraints {
                out.push_str(&format!("  - {}: {}\n", constraint.name, constraint.text));
            }
        }
        out
    }
}

fn layer_tag(layer: Layer) -> &'static str {
    match layer {
        Layer::Context => "context",
        Layer::System => "system",
        Layer::Automation => "automation",
        Layer::Observation => "observation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(node: Node, score: f64, why: &str) -> PackItem {
        PackItem {
            node,
            score,
            signals: Signals::default(),
            distance: 0.5,
            why: why.to_string(),
        }
    }

    #[test]
    fn render_prefixes_files_with_path() {
        let file = Node::new(Layer::System, "file", "/src/main.rs", json!({}));
        let task = Node::new(
            Layer::Context,
            "task",
            "ship it",
            json!({"summary": "first line\n  second line"}),
        );
        let pack = ContextPack {
            query: "q".into(),
            profile: RetrievalProfile::Default,
            items: vec![
                item(file, 0.657, "similar to the query"),
                item(task, 0.41, "recently modified"),
            ],
            constraints: vec![ConstraintNote {
                name: "no-force-push".into(),
                text: "never rewrite shared history".into(),
            }],
        };
        let rendered = pack.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "/src/main.rs (0.66) — similar to the query");
        assert_eq!(lines[1], "[context.task] ship it (0.41) — recently modified");
        assert_eq!(lines[2], "    first line");
        assert_eq!(lines[3], "    second line");
        assert_eq!(lines[4], "Constraints:");
        assert!(lines[5].contains("no-force-push"));
    }

    #[test]
    fn empty_pack_renders_empty() {
        let pack = ContextPack::empty("q", RetrievalProfile::Task);
        assert!(pack.is_empty());
        assert_eq!(pack.render(), "");
    }
}
