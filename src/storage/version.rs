//! # Version Tokens
//!
//! Opaque row-revision markers used as compare-and-swap preconditions.
//! Tokens originate in the store (Postgres exposes them via `xmin`) and are
//! round-tripped by clients, often through HTTP validator headers, so the
//! normalizer strips ETag-style decoration before comparison.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque version token. Equality is the only meaningful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Normalize raw client input: trim whitespace, drop a weak-validator
    /// `W/` prefix, and drop surrounding double quotes.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
        let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_token_is_unchanged() {
        assert_eq!(VersionToken::new("4211").as_str(), "4211");
    }

    #[test]
    fn weak_validator_and_quotes_are_stripped() {
        assert_eq!(VersionToken::new("W/\"4211\""), VersionToken::new("4211"));
        assert_eq!(VersionToken::new("\"4211\""), VersionToken::new("4211"));
        assert_eq!(VersionToken::new("  4211 "), VersionToken::new("4211"));
    }

    #[test]
    fn distinct_tokens_differ() {
        assert_ne!(VersionToken::new("4211"), VersionToken::new("4212"));
    }

    #[test]
    fn empty_and_blank_are_empty() {
        assert!(VersionToken::new("").is_empty());
        assert!(VersionToken::new("  ").is_empty());
        assert!(VersionToken::new("\"\"").is_empty());
    }
}
