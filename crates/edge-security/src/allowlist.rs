//! Origin host filtering.

use edge_core::AllowlistConfig;
use url::Url;

/// Result type for allowlist operations.
pub type AllowlistResult<T> = Result<T, AllowlistError>;

/// Errors from allowlist checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllowlistError {
    #[error("host not allowed: {0}")]
    HostNotAllowed(String),

    #[error("scheme not allowed: {0}")]
    SchemeNotAllowed(String),

    #[error("origin URL has no host: {0}")]
    MissingHost(String),
}

/// Decides which origins the proxy may forward to.
///
/// Exact hosts and `*` patterns are checked first; hosts matching no rule
/// fall back to the default policy.
#[derive(Debug, Clone)]
pub struct OriginAllowlist {
    hosts: Vec<String>,
    patterns: Vec<String>,
    schemes: Vec<String>,
    default_allow: bool,
}

impl Default for OriginAllowlist {
    fn default() -> Self {
        Self::permissive()
    }
}

impl OriginAllowlist {
    /// Deny every host not explicitly allowed, HTTPS only.
    pub fn new() -> Self {
        Self {
            hosts: Vec::new(),
            patterns: Vec::new(),
            schemes: vec!["https".to_string()],
            default_allow: false,
        }
    }

    /// Allow any host over HTTP or HTTPS.
    pub fn permissive() -> Self {
        Self {
            hosts: Vec::new(),
            patterns: Vec::new(),
            schemes: vec!["http".to_string(), "https".to_string()],
            default_allow: true,
        }
    }

    /// Build from configuration.
    pub fn from_config(config: &AllowlistConfig) -> Self {
        Self {
            hosts: config.hosts.iter().map(|h| h.to_lowercase()).collect(),
            patterns: config.patterns.iter().map(|p| p.to_lowercase()).collect(),
            schemes: config.schemes.iter().map(|s| s.to_lowercase()).collect(),
            default_allow: config.default_allow,
        }
    }

    /// Allow a specific host.
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into().to_lowercase());
        self
    }

    /// Allow a host pattern (supports * as wildcard).
    ///
    /// Examples:
    /// - `*.example.com` - matches `api.example.com`, `cdn.example.com`
    /// - `api.*.example.com` - matches `api.v1.example.com`
    pub fn allow_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into().to_lowercase());
        self
    }

    /// Set default policy (allow or deny when no rules match).
    pub fn default_allow(mut self, allow: bool) -> Self {
        self.default_allow = allow;
        self
    }

    /// Check an origin URL.
    pub fn check(&self, url: &Url) -> AllowlistResult<()> {
        let scheme = url.scheme().to_lowercase();
        if !self.schemes.is_empty() && !self.schemes.contains(&scheme) {
            return Err(AllowlistError::SchemeNotAllowed(scheme));
        }

        let host = url
            .host_str()
            .ok_or_else(|| AllowlistError::MissingHost(url.to_string()))?;
        self.check_host(host)
    }

    /// Check a host name.
    pub fn check_host(&self, host: &str) -> AllowlistResult<()> {
        let host = host.to_lowercase();

        if self.hosts.contains(&host) || self.patterns.iter().any(|p| matches_pattern(&host, p)) {
            return Ok(());
        }

        if self.default_allow {
            Ok(())
        } else {
            Err(AllowlistError::HostNotAllowed(host))
        }
    }
}

/// Glob match where `*` stands for any run of characters.
fn matches_pattern(host: &str, pattern: &str) -> bool {
    if !pattern.contains('*') {
        return host == pattern;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return false,
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return host == *first,
    };

    if host.len() < first.len() + last.len() || !host.starts_with(first) || !host.ends_with(last) {
        return false;
    }
    let mut remaining = &host[first.len()..host.len() - last.len()];

    for part in middle {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    // === Pattern Tests ===

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("api.example.com", "*.example.com"));
        assert!(!matches_pattern("example.com", "*.example.com"));
        assert!(matches_pattern("api.v1.example.com", "api.*.example.com"));
        assert!(matches_pattern("api.internal", "api.*"));
        assert!(matches_pattern("a.b.c.example.com", "a.*.c.*.com"));
        assert!(!matches_pattern("a.b.example.org", "a.*.com"));
        assert!(matches_pattern("exact.com", "exact.com"));
    }

    // === Allowlist Tests ===

    #[test]
    fn test_permissive_allows_everything_http() {
        let allowlist = OriginAllowlist::permissive();
        assert!(allowlist.check(&url("http://localhost:8080/")).is_ok());
        assert!(allowlist.check(&url("https://api.example.com/graphql")).is_ok());
        assert_eq!(
            allowlist.check(&url("ftp://files.example.com/")),
            Err(AllowlistError::SchemeNotAllowed("ftp".to_string()))
        );
    }

    #[test]
    fn test_strict_allowlist() {
        let allowlist = OriginAllowlist::new()
            .allow_host("API.example.com")
            .allow_pattern("*.cdn.example.com");

        assert!(allowlist.check(&url("https://api.example.com/")).is_ok());
        assert!(allowlist.check(&url("https://img.cdn.example.com/")).is_ok());
        assert_eq!(
            allowlist.check(&url("https://evil.com/")),
            Err(AllowlistError::HostNotAllowed("evil.com".to_string()))
        );
        assert!(allowlist.check(&url("http://api.example.com/")).is_err());
    }

    #[test]
    fn test_from_config() {
        let config = AllowlistConfig {
            hosts: vec!["origin.internal".to_string()],
            patterns: Vec::new(),
            schemes: vec!["http".to_string()],
            default_allow: false,
        };
        let allowlist = OriginAllowlist::from_config(&config);

        assert!(allowlist.check(&url("http://origin.internal/api")).is_ok());
        assert!(allowlist.check(&url("http://other.internal/api")).is_err());
    }

    #[test]
    fn test_missing_host() {
        let allowlist = OriginAllowlist {
            schemes: Vec::new(),
            ..OriginAllowlist::permissive()
        };
        assert!(matches!(
            allowlist.check(&url("data:text/plain,hello")),
            Err(AllowlistError::MissingHost(_))
        ));
    }
}
