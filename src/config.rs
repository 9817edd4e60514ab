//! Configuration for the Hearth memory engine
//!
//! A `Config` is built from defaults, optionally overlaid with a partial
//! TOML file (`~/.config/hearth/config.toml` or an explicit path). All file
//! fields are optional.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::{Error, Result};

/// Hearth engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database, exports)
    pub data_dir: PathBuf,

    /// Conversation store tuning
    pub store: StoreConfig,

    /// Device registry tuning
    pub registry: RegistryConfig,

    /// Profile analyzer tuning
    pub analyzer: AnalyzerConfig,

    /// Personalization composer tuning
    pub composer: ComposerConfig,
}

/// Conversation store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum retained exchanges per device; oldest evicted first
    pub max_history_per_device: usize,

    /// Trailing window treated as short-term memory, in minutes
    pub short_term_minutes: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_history_per_device: 50,
            short_term_minutes: 30,
        }
    }
}

/// Device registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum retained connection events; oldest dropped
    pub connection_history_cap: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            connection_history_cap: 1000,
        }
    }
}

/// Profile analyzer configuration
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Age after which a cached profile is considered stale, in minutes
    pub staleness_minutes: i64,

    /// Interval for the full-population refresh sweep, in minutes
    pub full_refresh_minutes: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            staleness_minutes: 30,
            full_refresh_minutes: 60,
        }
    }
}

/// Personalization composer configuration
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Exchange count above which a device counts as a regular
    pub regular_threshold: usize,

    /// Exchange count above which a device counts as familiar
    pub familiar_threshold: usize,

    /// Per-message character budget for quoted history snippets
    pub snippet_chars: usize,

    /// Maximum short-term exchanges quoted verbatim
    pub max_recent_exchanges: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            regular_threshold: 20,
            familiar_threshold: 5,
            snippet_chars: 50,
            max_recent_exchanges: 3,
        }
    }
}

impl Config {
    /// Build configuration from defaults, an optional TOML file, and env
    ///
    /// Resolution order: explicit file path, then `HEARTH_DATA_DIR`, then
    /// the platform data directory.
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly given config file cannot be read or
    /// parsed
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let overlay = match file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            None => Self::default_config_path()
                .filter(|p| p.exists())
                .and_then(|p| std::fs::read_to_string(p).ok())
                .and_then(|raw| toml::from_str(&raw).ok())
                .unwrap_or_default(),
        };

        Self::from_overlay(overlay)
    }

    fn from_overlay(file: ConfigFile) -> Result<Self> {
        let data_dir = std::env::var("HEARTH_DATA_DIR")
            .ok()
            .map(PathBuf::from)
            .or(file.data_dir)
            .or_else(|| {
                ProjectDirs::from("", "", "hearth").map(|d| d.data_dir().to_path_buf())
            })
            .ok_or_else(|| Error::Config("no data directory available".to_string()))?;

        let mut store = StoreConfig::default();
        if let Some(cap) = file.store.max_history_per_device {
            store.max_history_per_device = cap;
        }
        if let Some(minutes) = file.store.short_term_minutes {
            store.short_term_minutes = minutes;
        }

        let mut registry = RegistryConfig::default();
        if let Some(cap) = file.registry.connection_history_cap {
            registry.connection_history_cap = cap;
        }

        let mut analyzer = AnalyzerConfig::default();
        if let Some(minutes) = file.analyzer.staleness_minutes {
            analyzer.staleness_minutes = minutes;
        }
        if let Some(minutes) = file.analyzer.full_refresh_minutes {
            analyzer.full_refresh_minutes = minutes;
        }

        let mut composer = ComposerConfig::default();
        if let Some(n) = file.composer.regular_threshold {
            composer.regular_threshold = n;
        }
        if let Some(n) = file.composer.familiar_threshold {
            composer.familiar_threshold = n;
        }
        if let Some(n) = file.composer.snippet_chars {
            composer.snippet_chars = n;
        }
        if let Some(n) = file.composer.max_recent_exchanges {
            composer.max_recent_exchanges = n;
        }

        Ok(Self {
            data_dir,
            store,
            registry,
            analyzer,
            composer,
        })
    }

    /// Path to the SQLite database inside the data directory
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("hearth.db")
    }

    /// Default config file location
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "hearth").map(|d| d.config_dir().join("config.toml"))
    }
}

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    data_dir: Option<PathBuf>,

    #[serde(default)]
    store: StoreFileConfig,

    #[serde(default)]
    registry: RegistryFileConfig,

    #[serde(default)]
    analyzer: AnalyzerFileConfig,

    #[serde(default)]
    composer: ComposerFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct StoreFileConfig {
    max_history_per_device: Option<usize>,
    short_term_minutes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFileConfig {
    connection_history_cap: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzerFileConfig {
    staleness_minutes: Option<i64>,
    full_refresh_minutes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ComposerFileConfig {
    regular_threshold: Option<usize>,
    familiar_threshold: Option<usize>,
    snippet_chars: Option<usize>,
    max_recent_exchanges: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_overlay(ConfigFile {
            data_dir: Some(PathBuf::from("/tmp/hearth-test")),
            ..ConfigFile::default()
        })
        .unwrap();

        assert_eq!(config.store.max_history_per_device, 50);
        assert_eq!(config.store.short_term_minutes, 30);
        assert_eq!(config.registry.connection_history_cap, 1000);
        assert_eq!(config.analyzer.staleness_minutes, 30);
        assert_eq!(config.composer.regular_threshold, 20);
    }

    #[test]
    fn test_partial_overlay() {
        let file: ConfigFile = toml::from_str(
            r#"
            data_dir = "/tmp/hearth-test"

            [store]
            max_history_per_device = 10

            [composer]
            snippet_chars = 80
            "#,
        )
        .unwrap();

        let config = Config::from_overlay(file).unwrap();
        assert_eq!(config.store.max_history_per_device, 10);
        assert_eq!(config.store.short_term_minutes, 30);
        assert_eq!(config.composer.snippet_chars, 80);
        assert_eq!(config.composer.max_recent_exchanges, 3);
    }

    #[test]
    fn test_db_path() {
        let config = Config::from_overlay(ConfigFile {
            data_dir: Some(PathBuf::from("/tmp/hearth-test")),
            ..ConfigFile::default()
        })
        .unwrap();
        assert!(config.db_path().ends_with("hearth.db"));
    }
}
