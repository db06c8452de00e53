//! The scope guard: a mutation batch is in scope iff every modified path
//! shares a prefix with some scope entry.

use serde::{Deserialize, Serialize};

use lattice_core::{LatticeError, LatticeResult};

/// The outcome of a scope check, with both partitions listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeCheck {
    pub passed: bool,
    pub in_scope: Vec<String>,
    pub out_of_scope: Vec<String>,
}

/// Partition modified paths by the scope prefixes. An empty scope puts
/// every path out of scope.
pub fn check_scope(scope: &[String], modified: &[String]) -> ScopeCheck {
    let mut in_scope = Vec::new();
    let mut out_of_scope = Vec::new();
    for path in modified {
        if scope.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            in_scope.push(path.clone());
        } else {
            out_of_scope.push(path.clone());
        }
    }
    ScopeCheck {
        passed: out_of_scope.is_empty(),
        in_scope,
        out_of_scope,
    }
}

/// Check and fail with `ScopeViolation` listing the offenders.
pub fn enforce_scope(scope: &[String], modified: &[String]) -> LatticeResult<ScopeCheck> {
    let check = check_scope(scope, modified);
    if !check.passed {
        return Err(LatticeError::ScopeViolation {
            paths: check.out_of_scope,
        });
    }
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_root_passes() {
        let check = check_scope(&strings(&["/dash/"]), &strings(&["/dash/foo.go"]));
        assert!(check.passed);
        assert_eq!(check.in_scope, strings(&["/dash/foo.go"]));
        assert!(check.out_of_scope.is_empty());
    }

    #[test]
    fn multi_root_matches_any_prefix() {
        let check = check_scope(
            &strings(&["/dash/", "/lib/"]),
            &strings(&["/lib/util.go"]),
        );
        assert!(check.passed);
        assert_eq!(check.in_scope, strings(&["/lib/util.go"]));
    }

    #[test]
    fn empty_scope_puts_everything_out() {
        let check = check_scope(&[], &strings(&["/a", "/b"]));
        assert!(!check.passed);
        assert_eq!(check.out_of_scope, strings(&["/a", "/b"]));
        assert!(check.in_scope.is_empty());
    }

    #[test]
    fn enforce_surfaces_offenders() {
        let err = enforce_scope(&strings(&["/dash/"]), &strings(&["/etc/passwd"])).unwrap_err();
        match err {
            LatticeError::ScopeViolation { paths } => {
                assert_eq!(paths, strings(&["/etc/passwd"]))
            }
            other => panic!("expected ScopeViolation, got {other}"),
        }
    }
}
