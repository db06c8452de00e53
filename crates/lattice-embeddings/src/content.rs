//! Canonical content for hashing and embedding.
//!
//! A SYSTEM.file node's content is its on-disk bytes; every other node's
//! content is the deterministic rendering of its name and payload.

use std::path::Path;

use lattice_core::graph::Node;
use lattice_core::{LatticeError, LatticeResult};

/// The content a node's embedding is computed from, with its SHA-256.
#[derive(Debug)]
pub struct NodeContent {
    pub text: String,
    pub hash: String,
}

/// Resolve the node's current content. Files read from disk relative to
/// the allowed root when their name is not absolute; a missing file is a
/// `NotFound`, which the background worker treats as "skip".
pub fn resolve(node: &Node, allowed_root: &Path) -> LatticeResult<NodeContent> {
    if node.is_file() {
        let path = Path::new(&node.name);
        let full = if path.is_absolute() {
            path.to_path_buf()
        } else {
            allowed_root.join(path)
        };
        let bytes = std::fs::read(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LatticeError::not_found(format!("file {}", full.display()))
            } else {
                LatticeError::storage(format!("read {}: {e}", full.display()))
            }
        })?;
        let hash = Node::hash_content(&bytes);
        Ok(NodeContent {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            hash,
        })
    } else {
        let text = node.render_content();
        let hash = Node::hash_content(text.as_bytes());
        Ok(NodeContent { text, hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::graph::Layer;
    use serde_json::json;

    #[test]
    fn payload_content_hash_is_stable() {
        let node = Node::new(Layer::Context, "task", "t", json!({"a": 1}));
        let root = Path::new("/tmp");
        let first = resolve(&node, root).unwrap();
        let second = resolve(&node, root).unwrap();
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn payload_change_changes_hash() {
        let mut node = Node::new(Layer::Context, "task", "t", json!({"a": 1}));
        let root = Path::new("/tmp");
        let before = resolve(&node, root).unwrap().hash;
        node.payload = json!({"a": 2});
        let after = resolve(&node, root).unwrap().hash;
        assert_ne!(before, after);
    }

    #[test]
    fn file_content_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), b"hello lattice").unwrap();
        let node = Node::new(Layer::System, "file", "f.txt", json!({}));
        let content = resolve(&node, dir.path()).unwrap();
        assert_eq!(content.text, "hello lattice");
        assert_eq!(content.hash, Node::hash_content(b"hello lattice"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::new(Layer::System, "file", "absent.txt", json!({}));
        assert!(resolve(&node, dir.path()).unwrap_err().is_not_found());
    }
}
