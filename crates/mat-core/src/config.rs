//! Engine configuration
//!
//! Loaded from `mat.toml`, `mat.json`, `mat.yaml` or `mat.yml` at the project
//! root; the first file found wins and every field has a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use mat_fs::{ConfigStore, NormalizedPath, RobustnessConfig};
use mat_pragma::{DEFAULT_CHUNK_SIZE, MergeOptions, Pragma, PragmaSyntax};

use crate::matcher::{DEFAULT_ALLOWED_PACKAGES, DefaultIgnore};
use crate::sync::EngineOptions;
use crate::{Error, Result};

/// Config file names probed by [`EngineConfig::load`], in order.
pub const CONFIG_FILES: &[&str] = &["mat.toml", "mat.json", "mat.yaml", "mat.yml"];

/// Write robustness as it appears in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustnessSettings {
    pub lock_timeout_ms: u64,
    pub enable_fsync: bool,
}

impl Default for RobustnessSettings {
    fn default() -> Self {
        let defaults = RobustnessConfig::default();
        Self {
            lock_timeout_ms: defaults.lock_timeout.as_millis() as u64,
            enable_fsync: defaults.enable_fsync,
        }
    }
}

impl From<RobustnessSettings> for RobustnessConfig {
    fn from(settings: RobustnessSettings) -> Self {
        RobustnessConfig {
            lock_timeout: Duration::from_millis(settings.lock_timeout_ms),
            enable_fsync: settings.enable_fsync,
        }
    }
}

/// Project-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Destination directory, relative to the project root.
    pub dest: String,
    /// Generator directory, relative to the project root.
    pub generator: String,
    /// Rewrite existing files on the first cycle instead of merging regions.
    pub clean: bool,
    /// Update bookkeeping only; never touch the destination tree.
    pub dry_run: bool,
    /// Files and directories starting with this prefix are never generated
    /// or mounted.
    pub private_prefix: String,
    /// Directory names ignored in addition to `node_modules` and `.git`.
    pub ignore: Vec<String>,
    /// Packages beneath `node_modules` that stay visible to the watcher.
    pub packages: Vec<String>,
    pub pragma: PragmaSyntax,
    /// Read size for region scans of existing files.
    pub scan_chunk_size: usize,
    pub robustness: RobustnessSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dest: "src".to_string(),
            generator: "generators".to_string(),
            clean: false,
            dry_run: false,
            private_prefix: "_".to_string(),
            ignore: Vec::new(),
            packages: DEFAULT_ALLOWED_PACKAGES.iter().map(|p| p.to_string()).collect(),
            pragma: PragmaSyntax::default(),
            scan_chunk_size: DEFAULT_CHUNK_SIZE,
            robustness: RobustnessSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load the first config file found under `root`, or the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if
    /// the loaded values are invalid.
    pub fn load(root: &NormalizedPath) -> Result<Self> {
        let candidates: Vec<NormalizedPath> =
            CONFIG_FILES.iter().map(|name| root.join(name)).collect();

        let config = match ConfigStore::new().load_first::<EngineConfig>(&candidates)? {
            Some((path, config)) => {
                tracing::info!(path = %path, "Configuration loaded");
                config
            }
            None => {
                tracing::debug!(root = %root, "No configuration file; using defaults");
                EngineConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.dest.trim().is_empty() {
            return Err(Error::Config {
                message: "dest must not be empty".to_string(),
            });
        }
        if !self.dest_path().is_confined() {
            return Err(Error::Config {
                message: format!("dest '{}' must stay inside the project root", self.dest),
            });
        }
        if NormalizedPath::new(&self.dest) == NormalizedPath::new(&self.generator) {
            return Err(Error::Config {
                message: format!("dest and generator both point at '{}'", self.dest),
            });
        }
        if self.scan_chunk_size == 0 {
            return Err(Error::Config {
                message: "scan_chunk_size must be greater than zero".to_string(),
            });
        }
        if self.private_prefix.is_empty() {
            return Err(Error::Config {
                message: "private_prefix must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn dest_path(&self) -> NormalizedPath {
        NormalizedPath::new(&self.dest)
    }

    pub fn generator_path(&self) -> NormalizedPath {
        NormalizedPath::new(&self.generator)
    }

    /// Compile the marker syntax.
    pub fn pragma(&self) -> Result<Pragma> {
        Ok(Pragma::new(self.pragma.clone())?)
    }

    pub fn ignore_matcher(&self) -> Result<DefaultIgnore> {
        DefaultIgnore::new(&self.packages, self.ignore.iter().cloned())
    }

    /// Sync engine options derived from this config.
    pub fn engine_options(&self) -> Result<EngineOptions> {
        Ok(EngineOptions {
            dry_run: self.dry_run,
            private_prefix: self.private_prefix.clone(),
            pragma: self.pragma()?,
            merge: MergeOptions {
                chunk_size: self.scan_chunk_size,
                robustness: self.robustness.into(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_config_file() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::load(&NormalizedPath::new(temp.path())).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.dest, "src");
        assert_eq!(config.generator, "generators");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("mat.toml"),
            "dest = \"out\"\nclean = true\n\n[pragma]\nopen = \"// mat\"\nclose = \"\"\n",
        )
        .unwrap();

        let config = EngineConfig::load(&NormalizedPath::new(temp.path())).unwrap();
        assert_eq!(config.dest, "out");
        assert!(config.clean);
        assert_eq!(config.generator, "generators");
        assert_eq!(config.pragma.open, "// mat");
        assert_eq!(config.pragma.start_label, "start");
        assert_eq!(config.pragma().unwrap().start("x"), "// mat x [start] ");
    }

    #[test]
    fn toml_wins_over_json() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("mat.toml"), "dest = \"from-toml\"\n").unwrap();
        fs::write(temp.path().join("mat.json"), r#"{"dest": "from-json"}"#).unwrap();

        let config = EngineConfig::load(&NormalizedPath::new(temp.path())).unwrap();
        assert_eq!(config.dest, "from-toml");
    }

    #[test]
    fn yaml_robustness_settings() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("mat.yml"),
            "robustness:\n  lock_timeout_ms: 250\n  enable_fsync: false\n",
        )
        .unwrap();

        let config = EngineConfig::load(&NormalizedPath::new(temp.path())).unwrap();
        let robustness: RobustnessConfig = config.robustness.into();
        assert_eq!(robustness.lock_timeout, Duration::from_millis(250));
        assert!(!robustness.enable_fsync);
    }

    #[test]
    fn rejects_dest_equal_to_generator() {
        let config = EngineConfig {
            dest: "gen".into(),
            generator: "./gen/".into(),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn rejects_dest_outside_root() {
        for dest in ["../elsewhere", "/tmp/out", "src/../.."] {
            let config = EngineConfig {
                dest: dest.into(),
                ..EngineConfig::default()
            };
            assert!(matches!(config.validate(), Err(Error::Config { .. })), "{dest}");
        }
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("mat.json"), "{ not json").unwrap();
        let result = EngineConfig::load(&NormalizedPath::new(temp.path()));
        assert!(matches!(result, Err(Error::Fs(_))));
    }
}
