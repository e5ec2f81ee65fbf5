//! Lidar/radar fusion controller
//!
//! Drives one [`Estimator`] through the measurement stream: the first
//! accepted measurement initializes the belief, every later one advances
//! the filter by the elapsed time and then applies the update that matches
//! the sensor (linear for lidar, extended for radar).

use fusion_ekf_core::{wrap_to_pi, Estimator, EstimatorError, BEARING_INDEX};
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::config::FusionConfig;
use crate::measurement::{MeasurementPackage, SensorType};
use crate::motion::constant_velocity;
use crate::tools::calculate_jacobian;

/// Microseconds per second, the unit of measurement timestamps
const US_PER_SECOND: f64 = 1_000_000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error("Measurement at {timestamp} us is older than the previous one at {previous} us")]
    NonMonotonicTimestamp { timestamp: u64, previous: u64 },

    #[error("A {sensor} measurement needs {expected} values, got {actual}")]
    MeasurementSize {
        sensor: SensorType,
        expected: usize,
        actual: usize,
    },

    #[error("The {sensor} measurement at {timestamp} us holds a non-finite value")]
    NonFiniteMeasurement { sensor: SensorType, timestamp: u64 },
}

/// What happened to a single measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First measurement, used to set the initial belief
    Initialized,
    /// Predicted and corrected
    Updated,
    /// Predicted, but the correction was rejected (singular S or target
    /// at the sensor origin); the prior belief was kept
    Skipped,
    /// Sensor disabled in the config
    Ignored,
}

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionStats {
    pub initialized: usize,
    pub updated: usize,
    pub skipped: usize,
    pub ignored: usize,
}

impl FusionStats {
    pub fn total(&self) -> usize {
        self.initialized + self.updated + self.skipped + self.ignored
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Initialized => self.initialized += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Ignored => self.ignored += 1,
        }
    }
}

/// Fusion controller owning the estimator and sensor models
#[derive(Debug, Clone)]
pub struct FusionEkf {
    ekf: Estimator,
    config: FusionConfig,
    /// Timestamp of the last accepted measurement in microseconds
    previous_timestamp: Option<u64>,
    /// Lidar observation matrix
    h_lidar: DMatrix<f64>,
    /// Lidar measurement noise covariance
    r_lidar: DMatrix<f64>,
    /// Radar measurement noise covariance
    r_radar: DMatrix<f64>,
    stats: FusionStats,
}

impl FusionEkf {
    pub fn new(config: FusionConfig) -> Self {
        #[rustfmt::skip]
        let h_lidar = DMatrix::from_row_slice(2, 4, &[
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        ]);
        let r_lidar = DMatrix::from_diagonal(&DVector::from_column_slice(&config.lidar_noise));
        let r_radar = DMatrix::from_diagonal(&DVector::from_column_slice(&config.radar_noise));

        FusionEkf {
            ekf: Estimator::new(),
            config,
            previous_timestamp: None,
            h_lidar,
            r_lidar,
            r_radar,
            stats: FusionStats::default(),
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn stats(&self) -> FusionStats {
        self.stats
    }

    /// Underlying estimator, for read access to x and P
    pub fn estimator(&self) -> &Estimator {
        &self.ekf
    }

    /// Current state estimate `[px, py, vx, vy]`
    pub fn estimate(&self) -> Option<&DVector<f64>> {
        self.ekf.state()
    }

    fn sensor_enabled(&self, sensor_type: SensorType) -> bool {
        match sensor_type {
            SensorType::Lidar => self.config.use_lidar,
            SensorType::Radar => self.config.use_radar,
        }
    }

    /// Run one predict/update cycle for `package`
    ///
    /// Recoverable estimator faults are reported as [`Outcome::Skipped`],
    /// with the prediction kept. Any error leaves the session unchanged:
    /// the cycle runs on a copy of the estimator that is only committed
    /// once it succeeds.
    pub fn process_measurement(
        &mut self,
        package: &MeasurementPackage,
    ) -> Result<Outcome, FusionError> {
        let outcome = self.process(package)?;
        self.stats.record(outcome);
        Ok(outcome)
    }

    fn process(&mut self, package: &MeasurementPackage) -> Result<Outcome, FusionError> {
        let sensor = package.sensor_type;
        if !self.sensor_enabled(sensor) {
            debug!("Ignoring {} measurement at {}", sensor, package.timestamp);
            return Ok(Outcome::Ignored);
        }

        let expected = sensor.measurement_len();
        if package.raw.len() != expected {
            return Err(FusionError::MeasurementSize {
                sensor,
                expected,
                actual: package.raw.len(),
            });
        }

        if package.raw.iter().any(|v| !v.is_finite()) {
            return Err(FusionError::NonFiniteMeasurement {
                sensor,
                timestamp: package.timestamp,
            });
        }

        let mut z = package.raw.clone();
        if sensor == SensorType::Radar {
            z[BEARING_INDEX] = wrap_to_pi(z[BEARING_INDEX]);
        }

        let previous = match self.previous_timestamp {
            None => {
                self.initialize(sensor, &z)?;
                self.previous_timestamp = Some(package.timestamp);
                return Ok(Outcome::Initialized);
            }
            Some(previous) => previous,
        };

        if package.timestamp < previous {
            return Err(FusionError::NonMonotonicTimestamp {
                timestamp: package.timestamp,
                previous,
            });
        }

        let dt = (package.timestamp - previous) as f64 / US_PER_SECOND;
        let (f, q) = constant_velocity(dt, self.config.noise_ax, self.config.noise_ay);
        let mut ekf = self.ekf.clone();
        ekf.set_transition(f, q)?;
        ekf.predict()?;

        let corrected = match sensor {
            SensorType::Lidar => self.update_lidar(&mut ekf, &z),
            SensorType::Radar => self.update_radar(&mut ekf, &z),
        };

        let outcome = match corrected {
            Ok(()) => Outcome::Updated,
            Err(e) if e.is_recoverable_measurement_fault() => {
                warn!(
                    "Skipping {} update at {}: {}",
                    sensor, package.timestamp, e
                );
                Outcome::Skipped
            }
            Err(e) => return Err(e.into()),
        };

        self.ekf = ekf;
        self.previous_timestamp = Some(package.timestamp);
        Ok(outcome)
    }

    fn update_lidar(&self, ekf: &mut Estimator, z: &DVector<f64>) -> Result<(), EstimatorError> {
        ekf.set_measurement_model(self.h_lidar.clone(), self.r_lidar.clone())?;
        ekf.update(z)
    }

    fn update_radar(&self, ekf: &mut Estimator, z: &DVector<f64>) -> Result<(), EstimatorError> {
        let x = ekf
            .state()
            .ok_or_else(|| EstimatorError::PreconditionViolation("no state".to_string()))?;
        // Linearize around the predicted state
        let hj = calculate_jacobian(x)?;
        ekf.set_measurement_model(hj, self.r_radar.clone())?;
        ekf.update_nonlinear(z)
    }

    /// Set the initial belief from the first measurement
    fn initialize(&mut self, sensor: SensorType, z: &DVector<f64>) -> Result<(), EstimatorError> {
        let x0 = match sensor {
            SensorType::Lidar => DVector::from_vec(vec![z[0], z[1], 0.0, 0.0]),
            SensorType::Radar => {
                let (rho, phi, rho_dot) = (z[0], z[1], z[2]);
                let (sin, cos) = phi.sin_cos();
                // Radial velocity is the best guess available from one return
                DVector::from_vec(vec![rho * cos, rho * sin, rho_dot * cos, rho_dot * sin])
            }
        };

        let p0 = DMatrix::from_diagonal(&DVector::from_column_slice(
            &self.config.initial_covariance,
        ));
        let (h0, r0) = match sensor {
            SensorType::Lidar => (self.h_lidar.clone(), self.r_lidar.clone()),
            SensorType::Radar => (
                calculate_jacobian(&x0).unwrap_or_else(|_| DMatrix::zeros(3, 4)),
                self.r_radar.clone(),
            ),
        };

        info!(
            "Initialized from {} measurement: x = {:?}",
            sensor,
            x0.as_slice()
        );
        self.ekf.initialize(
            x0,
            p0,
            DMatrix::identity(4, 4),
            h0,
            r0,
            DMatrix::zeros(4, 4),
        )
    }
}
