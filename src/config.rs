use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const ENV_PREFIX: &str = "SITESMITH";
const DEFAULT_CONFIG_FILE: &str = "sitesmith";

/// Layered settings: built-in defaults, then an optional TOML file, then
/// `SITESMITH_*` environment variables, with `__` between nested keys as in
/// `SITESMITH_THRESHOLDS__SECTION_MIN_WIDTH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub thresholds: Thresholds,
    pub retry: RetrySettings,
    pub build: BuildSettings,
    pub design_api: DesignApiSettings,
}

/// Empirically tuned size and font thresholds used by the classifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub section_min_width: f64,
    pub section_min_height: f64,
    pub page_min_width: f64,
    pub page_min_height: f64,
    pub repeat_tolerance: f64,
    pub hero_min_height: f64,
    pub cta_max_height: f64,
    pub large_image_ratio: f64,
    pub heading_min_size: f64,
    pub subheading_min_size: f64,
    pub body_min_size: f64,
    pub body_min_chars: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            section_min_width: 100.0,
            section_min_height: 50.0,
            page_min_width: 300.0,
            page_min_height: 400.0,
            repeat_tolerance: 50.0,
            hero_min_height: 500.0,
            cta_max_height: 300.0,
            large_image_ratio: 0.2,
            heading_min_size: 24.0,
            subheading_min_size: 18.0,
            body_min_size: 12.0,
            body_min_chars: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub default_backoff_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_retries: 2,
            default_backoff_secs: 5,
            max_wait_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub sites_root: PathBuf,
    pub session_db: PathBuf,
    pub storage_wait_secs: u64,
    pub storage_poll_ms: u64,
    pub signal_timeout_secs: u64,
    pub cli_tool: String,
    pub completion_marker: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        BuildSettings {
            sites_root: PathBuf::from("sites"),
            session_db: PathBuf::from("data/sessions.sqlite"),
            storage_wait_secs: 10,
            storage_poll_ms: 250,
            signal_timeout_secs: 120,
            cli_tool: "wp".to_string(),
            completion_marker: crate::response::DEFAULT_MARKER.to_string(),
        }
    }
}

impl BuildSettings {
    pub fn storage_wait(&self) -> Duration {
        Duration::from_secs(self.storage_wait_secs)
    }

    pub fn storage_poll(&self) -> Duration {
        Duration::from_millis(self.storage_poll_ms.max(1))
    }

    pub fn signal_timeout(&self) -> Duration {
        Duration::from_secs(self.signal_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignApiSettings {
    pub base_url: String,
    pub token: Option<String>,
}

impl Default for DesignApiSettings {
    fn default() -> Self {
        DesignApiSettings {
            base_url: "https://api.figma.com".to_string(),
            token: None,
        }
    }
}

impl Settings {
    /// Load settings from `path` (or `./sitesmith.toml` when absent) and the
    /// environment. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let file = match path {
            Some(p) => File::from(p.to_path_buf()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
