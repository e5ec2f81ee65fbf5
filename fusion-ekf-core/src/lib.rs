//! # Fusion EKF Core
//!
//! Platform-independent Kalman / Extended Kalman state estimator.
//!
//! This crate contains the pure estimation logic with **zero I/O
//! dependencies**. Everything that touches sensors, files or time lives in
//! the `fusion-ekf` crate built on top of it.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  fusion-ekf (collaborators)                              │
//! │  ├── motion      F, Q for elapsed dt                     │
//! │  ├── tools       Jacobian, RMSE                          │
//! │  └── fusion      sensor dispatch, first-measurement init │
//! └──────────────────────────┬───────────────────────────────┘
//!                            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  fusion-ekf-core                                         │
//! │  ├── Estimator   initialize / predict / update           │
//! │  │               update_nonlinear                        │
//! │  └── projection  h(x) = [range, bearing, range_rate]     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use fusion_ekf_core::Estimator;
//! use nalgebra::{DMatrix, DVector};
//!
//! let mut f = DMatrix::<f64>::identity(4, 4);
//! f[(0, 2)] = 0.1;
//! f[(1, 3)] = 0.1;
//! let h = DMatrix::from_row_slice(2, 4, &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
//!
//! let mut est = Estimator::new();
//! est.initialize(
//!     DVector::from_vec(vec![0.0, 0.0, 1.0, 0.0]),
//!     DMatrix::identity(4, 4),
//!     f,
//!     h,
//!     DMatrix::identity(2, 2) * 0.0225,
//!     DMatrix::identity(4, 4) * 0.01,
//! )
//! .unwrap();
//!
//! est.predict().unwrap();
//! est.update(&DVector::from_vec(vec![0.11, 0.0])).unwrap();
//! assert!(est.state().unwrap()[0] > 0.1);
//! ```

pub mod error;
pub mod estimator;
pub mod projection;

pub use error::EstimatorError;
pub use estimator::{Estimate, Estimator, MIN_RECIPROCAL_CONDITION};
pub use projection::{
    project_to_measurement_space, wrap_to_pi, MeasurementFunction, RangeBearingRate,
    BEARING_INDEX, MIN_RANGE,
};
