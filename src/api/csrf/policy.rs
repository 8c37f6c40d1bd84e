//! Declarative path exemptions for the CSRF guard.
//!
//! The policy is plain data (an exact-match set plus an ordered prefix list)
//! so it can be tested and swapped independently of the middleware. A third
//! list names the exempt paths that still receive a fresh token on `POST`
//! (login and registration hand the first token of a session to clients that
//! cannot yet pass the double-submit check).

use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ExemptionPolicy {
    exact: HashSet<String>,
    prefixes: Vec<String>,
    issuing: HashSet<String>,
}

impl ExemptionPolicy {
    #[must_use]
    pub fn new(exact: Vec<String>, prefixes: Vec<String>, issuing: Vec<String>) -> Self {
        Self {
            exact: exact.into_iter().collect(),
            prefixes,
            issuing: issuing.into_iter().collect(),
        }
    }

    /// Exemptions for the stock route table: auth entry points, service
    /// endpoints, and the documentation/static roots.
    #[must_use]
    pub fn defaults() -> Self {
        Self::new(
            vec![
                "/api/auth/login".to_string(),
                "/api/auth/register".to_string(),
                "/docs".to_string(),
                "/openapi.json".to_string(),
                "/health".to_string(),
                "/".to_string(),
            ],
            vec![
                "/docs".to_string(),
                "/redoc".to_string(),
                "/openapi".to_string(),
                "/static".to_string(),
            ],
            vec![
                "/api/auth/login".to_string(),
                "/api/auth/register".to_string(),
            ],
        )
    }

    /// Whether `path` bypasses CSRF validation entirely.
    #[must_use]
    pub fn is_exempt(&self, path: &str) -> bool {
        if self.exact.contains(path) {
            return true;
        }
        self.prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Whether an exempt `path` still hands out a fresh token on success.
    #[must_use]
    pub fn issues_token(&self, path: &str) -> bool {
        self.issuing.contains(path)
    }
}
