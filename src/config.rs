//! # Renderer Configuration
//!
//! Everything the renderer needs to know about its surroundings: where
//! uploaded assets live, where temp files go, how remote images are fetched,
//! which fonts to try, and how aggressively orphaned temp files are swept.
//!
//! All sections have working defaults, so an empty JSON object (or no config
//! file at all) is a valid configuration.
//!
//! ```
//! use flotilla::config::RenderConfig;
//!
//! let config: RenderConfig = serde_json::from_str(r#"{"http": {"timeout_secs": 5}}"#).unwrap();
//! assert_eq!(config.http.timeout_secs, 5);
//! assert_eq!(config.storage_root.to_str(), Some("./data/uploads"));
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FlotillaError;

/// Browser-like user agent; some image hosts reject obvious bots.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Top-level renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Canonical root of uploaded assets (logos, flags, silhouettes).
    pub storage_root: PathBuf,

    /// Path prefixes from older deployments that map onto `storage_root`.
    pub legacy_prefixes: Vec<String>,

    /// Subfolders of `storage_root` probed by basename when a path is stale.
    pub asset_subfolders: Vec<String>,

    /// Directory for decoded and downloaded images.
    pub temp_dir: PathBuf,

    /// Remote image fetching.
    pub http: HttpConfig,

    /// Font discovery.
    pub fonts: FontConfig,

    /// Orphaned temp-file cleanup.
    pub sweep: SweepConfig,

    /// Logging output.
    pub logging: LoggingConfig,
}

/// Remote fetch settings. There is deliberately no retry count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

/// Font discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Load the fonts installed on the host.
    pub system_fonts: bool,
    /// Extra directories scanned for font files.
    pub font_dirs: Vec<PathBuf>,
    /// Families tried, in order, when the requested family is missing.
    pub fallback_families: Vec<String>,
}

/// Temp sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Files older than this are considered orphaned.
    pub max_age_secs: u64,
    /// How often the background sweeper runs.
    pub interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "flotilla=debug,warn").
    pub level: String,
    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./data/uploads"),
            legacy_prefixes: vec![
                "/uploads/".to_string(),
                "/api/static/".to_string(),
                "../data/uploads/".to_string(),
            ],
            asset_subfolders: vec![
                "silhouettes".to_string(),
                "logos".to_string(),
                "flags".to_string(),
            ],
            temp_dir: PathBuf::from("./data/temp"),
            http: HttpConfig::default(),
            fonts: FontConfig::default(),
            sweep: SweepConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            system_fonts: true,
            font_dirs: Vec::new(),
            fallback_families: [
                "Arial",
                "Calibri",
                "Verdana",
                "Tahoma",
                "DejaVu Sans",
                "Liberation Sans",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 2 * 60 * 60,
            interval_secs: 10 * 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RenderConfig {
    /// Load a configuration from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, FlotillaError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FlotillaError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            FlotillaError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Configuration rooted in a single directory, with host fonts disabled.
    ///
    /// Used by tests and one-off tools that must not depend on the machine
    /// they run on.
    pub fn isolated(root: &Path) -> Self {
        Self {
            storage_root: root.join("uploads"),
            temp_dir: root.join("temp"),
            fonts: FontConfig {
                system_fonts: false,
                font_dirs: Vec::new(),
                fallback_families: Vec::new(),
            },
            ..Self::default()
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn sweep_max_age(&self) -> Duration {
        Duration::from_secs(self.sweep.max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: RenderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.sweep.max_age_secs, 7200);
        assert_eq!(config.asset_subfolders, vec!["silhouettes", "logos", "flags"]);
        assert!(config.fonts.system_fonts);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"fonts": {"system_fonts": false}}"#).unwrap();
        assert!(!config.fonts.system_fonts);
        assert_eq!(config.fonts.fallback_families[0], "Arial");
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = RenderConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, FlotillaError::Config(_)));
    }

    #[test]
    fn test_isolated_roots_everything_in_one_dir() {
        let config = RenderConfig::isolated(Path::new("/tmp/x"));
        assert_eq!(config.storage_root, PathBuf::from("/tmp/x/uploads"));
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/x/temp"));
        assert!(!config.fonts.system_fonts);
    }
}
