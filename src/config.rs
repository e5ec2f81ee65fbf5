//! Filter configuration
//!
//! Noise constants and sensor switches, read from a JSON file. Every field
//! has a default so a config file only needs the values it changes:
//!
//! ```json
//! { "noise_ax": 5.0, "use_radar": false }
//! ```
//!
//! Lookup order: `--config <file>`, then `config.json` in the platform
//! config directory (e.g. `~/.config/fusion-ekf/config.json`), then defaults.

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file {}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config value for '{field}': {value} (must be finite and >= 0)")]
    Invalid { field: &'static str, value: f64 },
}

pub fn get_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "fusion-ekf")
}

/// Path of the default config file, whether or not it exists
pub fn default_config_path() -> Option<PathBuf> {
    get_project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FusionConfig {
    /// Acceleration noise variance along x (m²/s⁴)
    pub noise_ax: f64,
    /// Acceleration noise variance along y (m²/s⁴)
    pub noise_ay: f64,
    /// Lidar measurement variances `[px, py]`
    pub lidar_noise: [f64; 2],
    /// Radar measurement variances `[rho, phi, rho_dot]`
    pub radar_noise: [f64; 3],
    /// Diagonal of P at the first measurement `[px, py, vx, vy]`
    pub initial_covariance: [f64; 4],
    /// Process lidar measurements
    pub use_lidar: bool,
    /// Process radar measurements
    pub use_radar: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            noise_ax: 9.0,
            noise_ay: 9.0,
            lidar_noise: [0.0225, 0.0225],
            radar_noise: [0.09, 0.0009, 0.09],
            initial_covariance: [1.0, 1.0, 1000.0, 1000.0],
            use_lidar: true,
            use_radar: true,
        }
    }
}

impl FusionConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config: FusionConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_owned(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else the default config file if present,
    /// else the built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            info!("Using config file {}", path.display());
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => {
                info!("Using config file {}", path.display());
                Self::load(&path)
            }
            _ => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check that every noise value is a usable variance
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("noise_ax", std::slice::from_ref(&self.noise_ax)),
            ("noise_ay", std::slice::from_ref(&self.noise_ay)),
            ("lidar_noise", &self.lidar_noise[..]),
            ("radar_noise", &self.radar_noise[..]),
            ("initial_covariance", &self.initial_covariance[..]),
        ];
        for (field, values) in fields {
            if let Some(&value) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(ConfigError::Invalid { field, value });
            }
        }
        Ok(())
    }
}
