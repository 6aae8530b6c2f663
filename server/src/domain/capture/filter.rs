//! Request path exclusion list
//!
//! Pattern forms:
//! - `/health` matches that path only
//! - `/static*` matches any path starting with `/static`
//! - `/api/v1/*` matches paths below `/api/v1/`, not `/api/v1` itself

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPattern {
    Exact(String),
    Prefix(String),
    Descendants(String),
}

impl PathPattern {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(base) = raw.strip_suffix("/*") {
            return Some(Self::Descendants(format!("{}/", base)));
        }
        if let Some(prefix) = raw.strip_suffix('*') {
            return Some(Self::Prefix(prefix.to_string()));
        }
        Some(Self::Exact(raw.to_string()))
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Prefix(p) => path.starts_with(p.as_str()),
            Self::Descendants(base) => path.len() > base.len() && path.starts_with(base.as_str()),
        }
    }
}

/// Paths whose requests are never captured
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    patterns: Vec<PathPattern>,
}

impl PathFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .filter_map(|p| PathPattern::parse(p.as_ref()))
                .collect(),
        }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern() {
        let filter = PathFilter::new(["/favicon.ico"]);
        assert!(filter.is_excluded("/favicon.ico"));
        assert!(!filter.is_excluded("/favicon.ico.bak"));
    }

    #[test]
    fn test_descendants_pattern_excludes_base() {
        let filter = PathFilter::new(["/api/v1/*"]);
        assert!(filter.is_excluded("/api/v1/entries"));
        assert!(filter.is_excluded("/api/v1/entries/abc"));
        assert!(!filter.is_excluded("/api/v1"));
        assert!(!filter.is_excluded("/api/v1/"));
        assert!(!filter.is_excluded("/api/v2/entries"));
    }

    #[test]
    fn test_prefix_pattern() {
        let filter = PathFilter::new(["/static*"]);
        assert!(filter.is_excluded("/static"));
        assert!(filter.is_excluded("/static/app.js"));
        assert!(filter.is_excluded("/staticfiles"));
        assert!(!filter.is_excluded("/stat"));
    }

    #[test]
    fn test_blank_patterns_are_ignored() {
        let filter = PathFilter::new(["", "  "]);
        assert!(filter.is_empty());
        assert!(!filter.is_excluded("/"));
    }
}
