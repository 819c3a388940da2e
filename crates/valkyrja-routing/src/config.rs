//! Router configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pattern::PatternRegistry;

/// Settings applied when a router is built.
///
/// ```json
/// {
///     "strict": false,
///     "debug": true,
///     "patterns": { "year": "[0-9]{4}" },
///     "cache_path": "storage/routes.json",
///     "use_cache": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Reject duplicate route names instead of replacing the earlier route.
    #[serde(default = "default_true")]
    pub strict: bool,

    /// Put the error message in the body of the default 500 response.
    #[serde(default)]
    pub debug: bool,

    /// Extra parameter types, name to regex fragment.
    #[serde(default)]
    pub patterns: BTreeMap<String, String>,

    /// Location of the route cache file.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    /// Load routes from `cache_path` when it exists.
    #[serde(default)]
    pub use_cache: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strict: true,
            debug: false,
            patterns: BTreeMap::new(),
            cache_path: None,
            use_cache: false,
        }
    }
}

impl RouterConfig {
    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Returns the builtin registry extended with `patterns`.
    pub fn pattern_registry(&self) -> Result<PatternRegistry> {
        PatternRegistry::builtin().with_patterns(&self.patterns)
    }

    /// Returns the cache path if the cache should be read.
    #[must_use]
    pub fn active_cache(&self) -> Option<&Path> {
        self.cache_path
            .as_deref()
            .filter(|path| self.use_cache && path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouterError;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RouterConfig::default());
        assert!(config.strict);
        assert!(!config.debug);
        assert!(config.active_cache().is_none());
    }

    #[test]
    fn test_full_config() {
        let config = RouterConfig::from_json_str(
            r#"{
                "strict": false,
                "debug": true,
                "patterns": { "year": "[0-9]{4}" },
                "cache_path": "routes.json",
                "use_cache": true
            }"#,
        )
        .unwrap();
        assert!(!config.strict);
        assert!(config.debug);
        assert_eq!(config.cache_path.as_deref(), Some(Path::new("routes.json")));

        let registry = config.pattern_registry().unwrap();
        assert_eq!(registry.get("year"), Some("[0-9]{4}"));
        assert!(registry.contains("num"));
    }

    #[test]
    fn test_bad_pattern() {
        let config = RouterConfig::from_json_str(r#"{ "patterns": { "bad": "(" } }"#).unwrap();
        assert!(matches!(
            config.pattern_registry(),
            Err(RouterError::InvalidPatternFragment { .. })
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            RouterConfig::from_json_str("{ strict: "),
            Err(RouterError::Json(_))
        ));
    }

    #[test]
    fn test_from_file_and_active_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("routes.json");
        let config_path = dir.path().join("router.json");

        let mut file = fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"{{ "cache_path": {}, "use_cache": true }}"#,
            serde_json::to_string(&cache).unwrap()
        )
        .unwrap();

        let config = RouterConfig::from_file(&config_path).unwrap();
        assert!(config.active_cache().is_none());

        fs::write(&cache, "[]").unwrap();
        assert_eq!(config.active_cache(), Some(cache.as_path()));

        assert!(matches!(
            RouterConfig::from_file(dir.path().join("missing.json")),
            Err(RouterError::Io(_))
        ));
    }
}
