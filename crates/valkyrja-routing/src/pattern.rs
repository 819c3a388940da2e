//! Parameter pattern registry.
//!
//! Maps the symbolic types used in `{name:type}` placeholders to regex
//! fragments. The builtin table is shared process-wide and never mutated;
//! applications that need more types build an extended copy before any route
//! is compiled.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, RouterError};

/// Fragment used for `{name}` placeholders without a type: one path segment.
pub const DEFAULT_PATTERN: &str = "[^/]+";

/// Fragment used for `{*name}` catch-all placeholders.
pub const CATCH_ALL_PATTERN: &str = ".+";

const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("num", "[0-9]+"),
    ("id", "[0-9]+"),
    ("slug", "[a-zA-Z0-9-]+"),
    (
        "uuid",
        "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    ),
    ("ulid", "[0-7][0-9A-HJKMNP-TV-Za-hjkmnp-tv-z]{25}"),
    ("alpha", "[a-zA-Z]+"),
    ("alpha-lowercase", "[a-z]+"),
    ("alpha-uppercase", "[A-Z]+"),
    ("alpha-num", "[a-zA-Z0-9]+"),
    ("alpha-num-underscore", "[a-zA-Z0-9_]+"),
    ("any", DEFAULT_PATTERN),
    ("path", CATCH_ALL_PATTERN),
];

static GLOBAL: LazyLock<PatternRegistry> = LazyLock::new(PatternRegistry::builtin);

/// Symbolic parameter types and their regex fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRegistry {
    patterns: BTreeMap<String, String>,
}

impl PatternRegistry {
    /// Creates a registry holding only the builtin types.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            patterns: BUILTIN_PATTERNS
                .iter()
                .map(|(name, fragment)| ((*name).to_string(), (*fragment).to_string()))
                .collect(),
        }
    }

    /// Returns the shared builtin registry.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Returns a copy extended with a custom type.
    ///
    /// The fragment must compile and must not contain capture groups:
    /// parameter values are extracted by group position.
    ///
    /// # Example
    ///
    /// ```
    /// use valkyrja_routing::PatternRegistry;
    ///
    /// let registry = PatternRegistry::builtin()
    ///     .with_pattern("year", "[0-9]{4}")
    ///     .unwrap();
    /// assert_eq!(registry.get("year"), Some("[0-9]{4}"));
    /// ```
    pub fn with_pattern(
        mut self,
        name: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let fragment = fragment.into();

        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(RouterError::InvalidPatternFragment {
                name,
                reason: "type names may only contain letters, digits, `-` and `_`".to_string(),
            });
        }

        // must stand alone so splicing it into a group keeps the route anchored
        let regex = Regex::new(&fragment).map_err(|e| {
            RouterError::InvalidPatternFragment {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;

        if regex.captures_len() > 1 {
            return Err(RouterError::InvalidPatternFragment {
                name,
                reason: "capture groups are not allowed, use `(?:...)`".to_string(),
            });
        }

        self.patterns.insert(name, fragment);
        Ok(self)
    }

    /// Extends the registry with several types at once.
    pub fn with_patterns<I, K, V>(self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        patterns
            .into_iter()
            .try_fold(self, |registry, (name, fragment)| {
                registry.with_pattern(name, fragment)
            })
    }

    /// Looks up the fragment for a type.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.patterns.get(name).map(String::as_str)
    }

    /// Returns whether the type is known.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// Returns the known type names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let registry = PatternRegistry::global();
        for name in ["num", "id", "slug", "uuid", "alpha", "alpha-num", "alpha-num-underscore"] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
        assert_eq!(registry.get("num"), Some("[0-9]+"));
        assert_eq!(registry.get("nope"), None);
    }

    #[test]
    fn test_builtin_fragments_have_no_captures() {
        for (name, fragment) in BUILTIN_PATTERNS {
            let regex = Regex::new(fragment).unwrap();
            assert_eq!(regex.captures_len(), 1, "{name} has a capture group");
        }
    }

    #[test]
    fn test_with_pattern() {
        let registry = PatternRegistry::builtin()
            .with_pattern("year", "[0-9]{4}")
            .unwrap();
        assert_eq!(registry.get("year"), Some("[0-9]{4}"));
        assert!(!PatternRegistry::global().contains("year"));
    }

    #[test]
    fn test_with_pattern_rejects_capture_group() {
        let err = PatternRegistry::builtin()
            .with_pattern("choice", "(a|b)")
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidPatternFragment { .. }));

        assert!(PatternRegistry::builtin()
            .with_pattern("choice", "(?:a|b)")
            .is_ok());
    }

    #[test]
    fn test_with_pattern_rejects_bad_input() {
        assert!(PatternRegistry::builtin().with_pattern("broken", "[").is_err());
        assert!(PatternRegistry::builtin().with_pattern("", "a").is_err());
        assert!(PatternRegistry::builtin().with_pattern("a b", "a").is_err());
    }

    #[test]
    fn test_with_pattern_rejects_unbalanced_group() {
        let err = PatternRegistry::builtin()
            .with_pattern("escape", "[0-9]+)|(?:.*")
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidPatternFragment { ref name, .. } if name == "escape"));
    }

    #[test]
    fn test_with_patterns() {
        let registry = PatternRegistry::builtin()
            .with_patterns([("year", "[0-9]{4}"), ("month", "[0-9]{2}")])
            .unwrap();
        assert!(registry.contains("year"));
        assert!(registry.contains("month"));
    }
}
