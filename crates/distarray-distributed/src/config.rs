//! Config - Runtime Configuration
//!
//! Handles loading and validation of the runtime defaults used when arrays
//! are created without explicit options.
//!
//! ```toml
//! root = 0
//! distribution = "(b, *)"
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use serde::{Deserialize, Serialize};
use std::path::Path;

use distarray_core::error::{Error, Result};

use crate::creation::CreationOptions;
use crate::distribution::Distribution;

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Runtime defaults (distarray.toml)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Rank whose creation arguments are authoritative
    pub root: usize,

    /// Default distribution specifier, e.g. `"b"`, `"u"` or `"(b, *)"`
    pub distribution: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root: 0,
            distribution: default_distribution(),
        }
    }
}

fn default_distribution() -> String {
    "b".to_string()
}

impl RuntimeConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Saves the configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::serialization(e.to_string()))?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::config(format!("{}: {e}", path.as_ref().display())))
    }

    /// Parses the distribution specifier.
    pub fn validate(&self) -> Result<Distribution> {
        self.distribution.parse()
    }

    /// Converts into creation options.
    pub fn to_creation_options(&self) -> Result<CreationOptions> {
        Ok(CreationOptions::new()
            .root(self.root)
            .distribution(self.validate()?))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use distarray_core::ErrorKind;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.root, 0);
        assert_eq!(config.validate().unwrap(), Distribution::block());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RuntimeConfig::from_toml_str("root = 2").unwrap();
        assert_eq!(config.root, 2);
        assert_eq!(config.distribution, "b");

        let opts = RuntimeConfig::from_toml_str("distribution = \"(b, *)\"")
            .unwrap()
            .to_creation_options()
            .unwrap();
        assert_eq!(opts.root, 0);
        assert_eq!(opts.distribution.to_string(), "(b,*)");
    }

    #[test]
    fn test_invalid_distribution_rejected() {
        let err = RuntimeConfig::from_toml_str("distribution = \"bananas\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDistribution);

        let err = RuntimeConfig::from_toml_str("root = \"zero\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distarray.toml");

        let config = RuntimeConfig {
            root: 1,
            distribution: "u".to_string(),
        };
        config.save(&path).unwrap();
        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.validate().unwrap().is_undistributed());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuntimeConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
