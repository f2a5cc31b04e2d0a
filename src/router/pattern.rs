use std::sync::Arc;

use regex::Regex;
use smallvec::SmallVec;

/// Maximum number of path parameters before heap allocation.
/// Most route trees bind ≤8 params across all nesting levels.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` instead of `String` because names come from
/// the static route table (known at registration) and `Arc::clone()` is an
/// O(1) atomic increment. Values remain `String` as they are per-request
/// data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// A compiled route pattern.
///
/// `:name` segments compile to one `([^/]+)` capture each; literal
/// segments are escaped verbatim. Anchored patterns (leaf handlers) must
/// consume the whole path; open patterns (mounted routers) may consume a
/// prefix ending at a path-segment boundary.
#[derive(Debug, Clone)]
pub struct PathPattern {
    regex: Regex,
    params: Vec<Arc<str>>,
    anchored: bool,
}

/// A successful pattern match: the consumed portion of the path and the
/// parameters it bound, in segment order.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub matched: String,
    pub params: ParamVec,
}

impl PathPattern {
    pub fn compile(pattern: &str, anchored: bool) -> Self {
        if pattern == "/" {
            #[allow(clippy::expect_used)]
            let regex = Regex::new("^/").expect("failed to compile route pattern");
            return Self {
                regex,
                params: Vec::new(),
                anchored,
            };
        }

        let mut source = String::with_capacity(pattern.len() + 8);
        source.push('^');
        let mut params = Vec::with_capacity(pattern.matches(':').count());

        for segment in pattern.split('/') {
            if let Some(name) = segment.strip_prefix(':') {
                source.push_str("/([^/]+)");
                params.push(Arc::from(name));
            } else if !segment.is_empty() {
                source.push('/');
                source.push_str(&regex::escape(segment));
            }
        }

        #[allow(clippy::expect_used)]
        let regex = Regex::new(&source).expect("failed to compile route pattern");
        Self {
            regex,
            params,
            anchored,
        }
    }

    /// Match `path` against the pattern, honoring the anchoring mode.
    ///
    /// Anchored patterns tolerate one trailing slash. Open patterns accept
    /// any match that ends at a segment boundary; the root pattern `/`
    /// consumes only the leading slash.
    pub fn matches(&self, path: &str) -> Option<PatternMatch> {
        let caps = self.regex.captures(path)?;
        let end = caps.get(0)?.end();
        let tail = &path[end..];

        if self.anchored {
            if !(tail.is_empty() || tail == "/") {
                return None;
            }
        } else if !(tail.is_empty() || tail.starts_with('/') || end == 1) {
            return None;
        }

        let mut params = ParamVec::new();
        for (i, name) in self.params.iter().enumerate() {
            if let Some(value) = caps.get(i + 1) {
                params.push((Arc::clone(name), value.as_str().to_string()));
            }
        }

        Some(PatternMatch {
            matched: path[..end].to_string(),
            params,
        })
    }

    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern_anchored() {
        let pattern = PathPattern::compile("/test", true);
        assert!(pattern.matches("/test").is_some());
        assert!(pattern.matches("/test/").is_some());
        assert!(pattern.matches("/test/extra").is_none());
        assert!(pattern.matches("/testing").is_none());
    }

    #[test]
    fn test_param_pattern_extracts_values() {
        let pattern = PathPattern::compile("/users/:id", true);
        let matched = pattern.matches("/users/42").unwrap();
        assert_eq!(matched.matched, "/users/42");
        assert_eq!(matched.params.len(), 1);
        assert_eq!(matched.params[0].0.as_ref(), "id");
        assert_eq!(matched.params[0].1, "42");
    }

    #[test]
    fn test_open_pattern_matches_prefix_at_boundary() {
        let pattern = PathPattern::compile("/users", false);
        let matched = pattern.matches("/users/42").unwrap();
        assert_eq!(matched.matched, "/users");
        // boundary rule: "/usersX" is not a prefix match
        assert!(pattern.matches("/usersX").is_none());
    }

    #[test]
    fn test_open_root_pattern_consumes_leading_slash() {
        let pattern = PathPattern::compile("/", false);
        let matched = pattern.matches("/data").unwrap();
        assert_eq!(matched.matched, "/");
    }

    #[test]
    fn test_anchored_root_pattern() {
        let pattern = PathPattern::compile("/", true);
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/data").is_none());
    }

    #[test]
    fn test_open_param_pattern() {
        let pattern = PathPattern::compile("/test/:name", false);
        let matched = pattern.matches("/test/john/test/25").unwrap();
        assert_eq!(matched.matched, "/test/john");
        assert_eq!(matched.params[0].1, "john");
    }
}
