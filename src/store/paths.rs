//! Path validation and ancestry helpers
//!
//! Paths are absolute and slash-delimited. Construction is literal string
//! concatenation with no normalization of redundant separators; what the
//! caller writes is what the service sees.

use crate::errors::{CoordError, CoordResult};

/// Path for a named child directly under `root`.
pub fn node_path(root: &str, name: &str) -> String {
    format!("{}/{}", root, name)
}

/// Reject relative or empty paths. Never retried.
pub fn validate(path: &str) -> CoordResult<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(CoordError::InvalidPath(path.to_string()))
    }
}

/// Ordered ancestor prefixes of an absolute path, the path itself last:
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`. Segments are taken literally,
/// so redundant separators surface as empty segments rather than being
/// collapsed.
pub fn ancestors(path: &str) -> CoordResult<Vec<String>> {
    validate(path)?;
    let mut prefix = String::with_capacity(path.len());
    let mut prefixes = Vec::new();
    for segment in path[1..].split('/') {
        prefix.push('/');
        prefix.push_str(segment);
        prefixes.push(prefix.clone());
    }
    Ok(prefixes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_path_is_literal_concatenation() {
        assert_eq!(node_path("/registry", "member-1"), "/registry/member-1");
        // No normalization: a root of "/" yields a doubled separator.
        assert_eq!(node_path("/", "x"), "//x");
    }

    #[test]
    fn test_validate_rejects_relative_and_empty_paths() {
        assert!(validate("/a").is_ok());
        assert!(validate("/").is_ok());
        assert_eq!(
            validate("a/b").unwrap_err(),
            CoordError::InvalidPath("a/b".to_string())
        );
        assert_eq!(
            validate("").unwrap_err(),
            CoordError::InvalidPath(String::new())
        );
    }

    #[test]
    fn test_ancestors_in_order() {
        assert_eq!(
            ancestors("/a/b/c").unwrap(),
            vec!["/a".to_string(), "/a/b".to_string(), "/a/b/c".to_string()]
        );
        assert_eq!(ancestors("/a").unwrap(), vec!["/a".to_string()]);
    }

    #[test]
    fn test_ancestors_rejects_relative_paths() {
        assert!(matches!(
            ancestors("a/b/c").unwrap_err(),
            CoordError::InvalidPath(_)
        ));
    }
}
