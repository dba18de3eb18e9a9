//! Sync configuration.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for drift detection and merging, usually `.wfsync.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Configuration version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Header field names.
    #[serde(default)]
    pub fields: FieldSettings,

    /// Merge tool settings.
    #[serde(default)]
    pub merge: MergeSettings,

    /// Import expansion settings.
    #[serde(default)]
    pub imports: ImportSettings,
}

const fn default_version() -> u32 {
    1
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            fields: FieldSettings::default(),
            merge: MergeSettings::default(),
            imports: ImportSettings::default(),
        }
    }
}

impl SyncConfig {
    /// Parse a YAML document; missing keys take their defaults.
    ///
    /// # Errors
    /// Returns an error if the YAML is malformed.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load configuration from `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CoreError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
}

/// Names of the header fields the engine reads or rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldSettings {
    /// Provenance field holding the source spec.
    #[serde(default = "default_source_field")]
    pub source: String,

    /// Section holding trigger configuration.
    #[serde(default = "default_trigger_section")]
    pub trigger_section: String,

    /// Deployment-only field inside the trigger section, ignored for drift.
    #[serde(default = "default_deployment_field")]
    pub deployment: String,
}

fn default_source_field() -> String {
    "source".to_string()
}

fn default_trigger_section() -> String {
    "on".to_string()
}

fn default_deployment_field() -> String {
    "stop-after".to_string()
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            source: default_source_field(),
            trigger_section: default_trigger_section(),
            deployment: default_deployment_field(),
        }
    }
}

/// External merge primitive settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MergeSettings {
    /// Program providing `merge-file`.
    #[serde(default = "default_program")]
    pub program: String,

    /// Conflict labels.
    #[serde(default)]
    pub labels: MergeLabels,

    /// Parent directory for per-merge scratch directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

fn default_program() -> String {
    "git".to_string()
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            labels: MergeLabels::default(),
            scratch_dir: None,
        }
    }
}

/// Labels printed after the conflict markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeLabels {
    #[serde(default = "default_current_label")]
    pub current: String,
    #[serde(default = "default_base_label")]
    pub base: String,
    #[serde(default = "default_new_label")]
    pub new: String,
}

fn default_current_label() -> String {
    "current (local changes)".to_string()
}

fn default_base_label() -> String {
    "base (original)".to_string()
}

fn default_new_label() -> String {
    "new (upstream)".to_string()
}

impl Default for MergeLabels {
    fn default() -> Self {
        Self {
            current: default_current_label(),
            base: default_base_label(),
            new: default_new_label(),
        }
    }
}

/// Import expansion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImportSettings {
    /// Maximum nesting for inlined imports.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

const fn default_max_depth() -> usize {
    crate::imports::DEFAULT_MAX_DEPTH
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.fields.source, "source");
        assert_eq!(config.fields.trigger_section, "on");
        assert_eq!(config.fields.deployment, "stop-after");
        assert_eq!(config.merge.program, "git");
        assert_eq!(config.merge.labels.current, "current (local changes)");
        assert_eq!(config.merge.labels.base, "base (original)");
        assert_eq!(config.merge.labels.new, "new (upstream)");
        assert!(config.merge.scratch_dir.is_none());
        assert_eq!(config.imports.max_depth, 10);
    }

    #[test]
    fn test_partial_yaml() {
        let config = SyncConfig::from_yaml_str(
            "merge:\n  program: /usr/local/bin/git\n  labels:\n    new: theirs\nfields:\n  deployment: expires\n",
        )
        .unwrap();
        assert_eq!(config.merge.program, "/usr/local/bin/git");
        assert_eq!(config.merge.labels.new, "theirs");
        assert_eq!(config.merge.labels.base, "base (original)");
        assert_eq!(config.fields.deployment, "expires");
        assert_eq!(config.fields.source, "source");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(SyncConfig::from_yaml_str("").unwrap(), SyncConfig::default());
    }

    #[test]
    fn test_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".wfsync.yml");
        std::fs::write(&path, "version: 1\nimports:\n  max-depth: 3\n").unwrap();
        assert_eq!(SyncConfig::load(&path).unwrap().imports.max_depth, 3);

        let missing = SyncConfig::load(tmp.path().join("nope.yml"));
        assert!(matches!(missing, Err(CoreError::Config { .. })));
    }
}
