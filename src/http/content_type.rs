//! Content-type override for known JSON endpoints.
//!
//! # Design Decisions
//! - Path prefix matching is case-sensitive
//! - No regex to guarantee O(n) matching

/// Route prefixes of the task-queue/system-info API and the plugin namespace.
const DEFAULT_JSON_PREFIXES: &[&str] = &[
    "/system_stats",
    "/object_info",
    "/prompt",
    "/queue",
    "/history",
    "/interrupt",
    "/api/etn/",
];

/// Returns true if `path` belongs to the default allow-list.
pub fn is_known_json_path(path: &str) -> bool {
    DEFAULT_JSON_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Decides which responses are relabelled `application/json`.
///
/// `Builtin` is the fixed allow-list of [`is_known_json_path`]; `Custom`
/// replaces it with prefixes from the configuration.
#[derive(Debug, Clone, Default)]
pub enum JsonPathMatcher {
    #[default]
    Builtin,
    Custom(Vec<String>),
}

impl JsonPathMatcher {
    /// `None` keeps the built-in allow-list.
    pub fn new(prefixes: Option<Vec<String>>) -> Self {
        match prefixes {
            Some(prefixes) => JsonPathMatcher::Custom(prefixes),
            None => JsonPathMatcher::Builtin,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            JsonPathMatcher::Builtin => is_known_json_path(path),
            JsonPathMatcher::Custom(prefixes) => {
                prefixes.iter().any(|p| path.starts_with(p.as_str()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_api_paths() {
        assert!(is_known_json_path("/object_info"));
        assert!(is_known_json_path("/object_info/KSampler"));
        assert!(is_known_json_path("/queue"));
        assert!(is_known_json_path("/history?max_items=64"));
        assert!(is_known_json_path("/api/etn/foo"));
    }

    #[test]
    fn other_paths() {
        assert!(!is_known_json_path("/static/app.js"));
        assert!(!is_known_json_path("/"));
        assert!(!is_known_json_path("/api/etn"));
        assert!(!is_known_json_path("/QUEUE"));
        assert!(!is_known_json_path("/view?filename=a.png"));
    }

    #[test]
    fn unconfigured_matcher_uses_allow_list() {
        let matcher = JsonPathMatcher::new(None);
        for path in ["/queue", "/api/etn/foo", "/static/app.js", "/prompt"] {
            assert_eq!(matcher.matches(path), is_known_json_path(path));
        }
    }

    #[test]
    fn custom_prefixes_replace_allow_list() {
        let matcher = JsonPathMatcher::new(Some(vec!["/v1/".to_string()]));
        assert!(matcher.matches("/v1/models"));
        assert!(!matcher.matches("/queue"));
    }
}
