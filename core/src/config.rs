//! Toolkit configuration.
//!
//! Behaviour switches for the version calculator and for draft
//! materialization, loaded from YAML. Missing sections and fields take their
//! defaults.
//!
//! # Example YAML
//!
//! ```yaml
//! versioning:
//!   bump_initial_version_without_changes: true
//! drafts:
//!   auto_create_collection_item: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings for [`PatternVersioningHistory`](crate::PatternVersioningHistory).
///
/// # Examples
///
/// ```
/// # use pattern_toolkit_core::VersioningPolicy;
/// let policy = VersioningPolicy::default();
/// assert!(policy.bump_initial_version_without_changes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningPolicy {
    /// Estimate a minor bump for a pattern still at `0.0.0` even when no
    /// change has been recorded, so the first release is `0.1.0`.
    pub bump_initial_version_without_changes: bool,
}

impl Default for VersioningPolicy {
    fn default() -> Self {
        Self {
            bump_initial_version_without_changes: true,
        }
    }
}

/// Settings for draft materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftPolicy {
    /// When an auto-created element is a `OneOrMany` collection, also create
    /// its first item.
    pub auto_create_collection_item: bool,
}

impl Default for DraftPolicy {
    fn default() -> Self {
        Self {
            auto_create_collection_item: true,
        }
    }
}

/// Top-level toolkit configuration.
///
/// # Examples
///
/// ```no_run
/// use pattern_toolkit_core::ToolkitConfig;
///
/// let config = ToolkitConfig::load("toolkit.yml").unwrap();
/// if config.versioning.bump_initial_version_without_changes {
///     println!("first release will be 0.1.0");
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub versioning: VersioningPolicy,
    pub drafts: DraftPolicy,
}

impl ToolkitConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::ToolkitError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::ToolkitError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::ToolkitError::Io) if the file cannot be written,
    /// or [`Yaml`](crate::ToolkitError::Yaml) if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolkit.yml");

        let config = ToolkitConfig {
            versioning: VersioningPolicy {
                bump_initial_version_without_changes: false,
            },
            drafts: DraftPolicy::default(),
        };
        config.save(&path).unwrap();

        assert_eq!(ToolkitConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "drafts:\n  auto_create_collection_item: false\n";
        let config: ToolkitConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.versioning.bump_initial_version_without_changes);
        assert!(!config.drafts.auto_create_collection_item);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolkitConfig::load(dir.path().join("missing.yml")).unwrap_err();
        assert!(matches!(err, crate::ToolkitError::Io(_)));
    }
}
