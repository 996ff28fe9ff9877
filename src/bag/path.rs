//! Dotted path handling.

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Splits a path into its non-empty segments.
///
/// Leading, trailing and repeated separators are ignored, so `.a..b.` yields `["a", "b"]`.
pub fn segments(path: &str) -> Vec<&str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty()).collect()
}

/// Rewrites a path in its canonical form (`a..b.` becomes `a.b`).
pub fn canonical(path: &str) -> String {
    segments(path).join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_skip_empty() {
        assert_eq!(segments(""), Vec::<&str>::new());
        assert_eq!(segments("."), Vec::<&str>::new());
        assert_eq!(segments(".a"), vec!["a"]);
        assert_eq!(segments("a."), vec!["a"]);
        assert_eq!(segments("a..b"), vec!["a", "b"]);
    }

    #[test]
    fn test_canonical() {
        assert_eq!(canonical("..a...b."), "a.b");
        assert_eq!(canonical(""), "");
    }
}
