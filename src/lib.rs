//! # Fusion EKF
//!
//! Lidar/radar sensor fusion for a single moving object.
//!
//! This crate supplies everything around the estimator in
//! [`fusion_ekf_core`]: parsing measurement logs, building the motion model
//! for each time step, linearizing the radar measurement function, choosing
//! the update for each sensor, and judging the result against ground truth.
//!
//! ```text
//! measurement log ──► measurement ──► fusion::FusionEkf ──► report
//!                                       │   ▲
//!                     motion (F, Q) ────┤   │
//!                     tools  (Hj)  ─────┘   │
//!                                   fusion_ekf_core::Estimator
//! ```
//!
//! ## Command-Line Interface
//!
//! See [`Cli`] for all available options:
//!
//! - `INPUT` / `OUTPUT` - measurement log in, estimates out
//! - `-c, --config` - JSON config file (see [`config`])
//! - `--no-lidar` / `--no-radar` - drop one sensor
//! - `-v` / `-q` - more or less logging

use clap::Parser;
use std::path::PathBuf;

pub mod config;
pub mod fusion;
pub mod measurement;
pub mod motion;
pub mod report;
pub mod tools;

pub use config::FusionConfig;
pub use fusion::{FusionEkf, FusionError, FusionStats, Outcome};
pub use measurement::{MeasurementPackage, SensorType};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Fuse lidar and radar measurements with an Extended Kalman Filter")]
pub struct Cli {
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Measurement log to read
    pub input: PathBuf,

    /// File to write estimates to
    pub output: PathBuf,

    /// Config file (default: config.json in the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ignore lidar measurements
    #[arg(long, default_value_t = false)]
    pub no_lidar: bool,

    /// Ignore radar measurements
    #[arg(long, default_value_t = false)]
    pub no_radar: bool,
}

impl Cli {
    /// Apply command line overrides on top of a loaded config
    pub fn apply(&self, mut config: FusionConfig) -> FusionConfig {
        if self.no_lidar {
            config.use_lidar = false;
        }
        if self.no_radar {
            config.use_radar = false;
        }
        config
    }
}
