//! Filesystem path policy: one allowed root, no escapes.

use std::path::{Component, Path, PathBuf};

use lattice_core::{LatticeError, LatticeResult};

/// Resolve a caller-supplied path against the allowed root.
///
/// Relative paths join the root; absolute paths must already lie beneath
/// it. `..` components are normalised lexically before the containment
/// check, so traversal cannot escape. Violations fail with
/// `ScopeViolation` naming the offending path.
pub fn resolve(allowed_root: &Path, raw: &str) -> LatticeResult<PathBuf> {
    if raw.is_empty() {
        return Err(LatticeError::invalid_argument("empty path"));
    }
    let candidate = Path::new(raw);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        allowed_root.join(candidate)
    };
    let normalized = normalize(&joined);
    let root = normalize(allowed_root);
    if !normalized.starts_with(&root) {
        return Err(LatticeError::ScopeViolation {
            paths: vec![raw.to_string()],
        });
    }
    Ok(normalized)
}

/// Lexical normalisation: resolve `.` and `..` without touching the
/// filesystem (targets may not exist yet).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_the_root() {
        let root = Path::new("/work/project");
        let resolved = resolve(root, "src/main.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/work/project/src/main.rs"));
    }

    #[test]
    fn absolute_inside_root_is_allowed() {
        let root = Path::new("/work/project");
        let resolved = resolve(root, "/work/project/Cargo.toml").unwrap();
        assert_eq!(resolved, PathBuf::from("/work/project/Cargo.toml"));
    }

    #[test]
    fn absolute_outside_root_is_rejected() {
        let root = Path::new("/work/project");
        let err = resolve(root, "/etc/passwd").unwrap_err();
        assert!(matches!(err, LatticeError::ScopeViolation { .. }));
    }

    #[test]
    fn traversal_escape_is_rejected() {
        let root = Path::new("/work/project");
        let err = resolve(root, "../other/secret").unwrap_err();
        assert!(matches!(err, LatticeError::ScopeViolation { .. }));
        // Traversal that stays inside is fine.
        let ok = resolve(root, "src/../Cargo.toml").unwrap();
        assert_eq!(ok, PathBuf::from("/work/project/Cargo.toml"));
    }
}
