// ABOUTME: Scope set parsing and subset checks for authorization and refresh requests
// ABOUTME: Scopes are space-delimited tokens restricted to the [a-z0-9._:-] alphabet
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Why a scope string was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeParseError {
    /// No scope tokens at all
    #[error("scope must contain at least one value")]
    Empty,
    /// A token contains characters outside `[a-z0-9._:-]`
    #[error("scope value '{0}' is malformed")]
    Malformed(String),
}

/// Ordered, de-duplicated set of scope tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Parse a space-delimited scope string into a non-empty set
    ///
    /// # Errors
    /// Returns `ScopeParseError::Empty` when no tokens are present and
    /// `ScopeParseError::Malformed` when a token uses a forbidden character.
    pub fn parse(raw: &str) -> Result<Self, ScopeParseError> {
        let mut scopes = BTreeSet::new();
        for token in raw.split(' ').filter(|token| !token.is_empty()) {
            if !is_well_formed(token) {
                return Err(ScopeParseError::Malformed(token.to_owned()));
            }
            scopes.insert(token.to_owned());
        }
        if scopes.is_empty() {
            return Err(ScopeParseError::Empty);
        }
        Ok(Self(scopes))
    }

    /// Build a set from tokens that were validated when they were stored
    pub fn from_trusted<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// Whether the set contains `scope`
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Whether every scope in `self` is also in `other`
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Scopes of `self` that are missing from `other`
    #[must_use]
    pub fn difference<'a>(&'a self, other: &'a Self) -> Vec<&'a str> {
        self.0.difference(&other.0).map(String::as_str).collect()
    }

    /// Number of scopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over scopes in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn is_well_formed(token: &str) -> bool {
    token.bytes().all(|byte| {
        matches!(byte,
            b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b':' | b'-'
        )
    })
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(scope)?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for ScopeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScopeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deduplicates_and_sorts() {
        let scopes = ScopeSet::parse("profile openid  email openid").unwrap_or_default();

        assert_eq!(scopes.len(), 3);
        assert_eq!(scopes.to_string(), "email openid profile");
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert_eq!(ScopeParseError::Empty, ScopeSet::parse("   ").unwrap_err());
        assert_eq!(
            ScopeParseError::Malformed("Email".to_owned()),
            ScopeSet::parse("openid Email").unwrap_err()
        );
        assert!(ScopeSet::parse("read/write").is_err());
        assert!(ScopeSet::parse("api:read files.write user_info-v2").is_ok());
    }

    #[test]
    fn test_subset_and_difference() {
        let granted = ScopeSet::from_trusted(["a", "b"]);
        let narrow = ScopeSet::from_trusted(["a"]);
        let wide = ScopeSet::from_trusted(["a", "c"]);

        assert!(narrow.is_subset(&granted));
        assert!(!wide.is_subset(&granted));
        assert_eq!(wide.difference(&granted), vec!["c"]);
    }
}
