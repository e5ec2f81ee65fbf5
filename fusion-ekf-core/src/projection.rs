//! Nonlinear measurement projection
//!
//! Maps a Cartesian constant-velocity state `[px, py, vx, vy]` into the
//! polar measurement space of a range/bearing/range-rate sensor, and
//! provides the angle normalization needed wherever a bearing is differenced.

use nalgebra::DVector;
use std::f64::consts::{PI, TAU};

use crate::error::EstimatorError;

/// Below this range (in state units) the bearing is undefined and the
/// range rate divides by ~0.
pub const MIN_RANGE: f64 = 1e-4;

/// Index of the bearing component in a range/bearing/range-rate measurement
pub const BEARING_INDEX: usize = 1;

/// Normalize an angle in radians to the half-open interval (-PI, PI]
///
/// Non-finite input is returned unchanged.
#[inline]
pub fn wrap_to_pi(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}

/// A nonlinear measurement function `h(x)` used by the extended update.
///
/// The Jacobian of `h` is not computed here; the caller supplies it as the
/// measurement matrix before each update.
pub trait MeasurementFunction {
    /// Dimension of the measurement space
    fn dimension(&self) -> usize;

    /// Minimum state dimension `project` can read from
    fn state_dimension(&self) -> usize;

    /// Predicted measurement for state `x`
    fn project(&self, x: &DVector<f64>) -> Result<DVector<f64>, EstimatorError>;

    /// Components of the measurement that are angles and must be wrapped
    /// after differencing
    fn angular_components(&self) -> &[usize] {
        &[]
    }
}

/// Range, bearing and range rate of a target seen from the origin
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeBearingRate;

impl MeasurementFunction for RangeBearingRate {
    fn dimension(&self) -> usize {
        3
    }

    fn state_dimension(&self) -> usize {
        4
    }

    fn project(&self, x: &DVector<f64>) -> Result<DVector<f64>, EstimatorError> {
        project_to_measurement_space(x)
    }

    fn angular_components(&self) -> &[usize] {
        &[BEARING_INDEX]
    }
}

/// Project `[px, py, vx, vy]` to `[range, bearing, range_rate]`
///
/// Fails with `DegenerateGeometry` when the target sits within
/// [`MIN_RANGE`] of the origin instead of producing Inf/NaN.
pub fn project_to_measurement_space(x: &DVector<f64>) -> Result<DVector<f64>, EstimatorError> {
    if x.len() < 4 {
        return Err(EstimatorError::PreconditionViolation(format!(
            "range/bearing projection needs a 4-element state, got {}",
            x.len()
        )));
    }

    let px = x[0];
    let py = x[1];
    let vx = x[2];
    let vy = x[3];

    let range = px.hypot(py);
    if range.is_nan() || range < MIN_RANGE {
        return Err(EstimatorError::DegenerateGeometry {
            range,
            min_range: MIN_RANGE,
        });
    }

    let bearing = py.atan2(px);
    let range_rate = (px * vx + py * vy) / range;

    Ok(DVector::from_vec(vec![range, bearing, range_rate]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_to_pi_inside_range() {
        assert!((wrap_to_pi(0.5) - 0.5).abs() < 1e-12);
        assert!((wrap_to_pi(-2.0) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_to_pi_boundaries() {
        assert_eq!(wrap_to_pi(PI), PI);
        // -PI is outside (-PI, PI] and maps onto PI
        assert_eq!(wrap_to_pi(-PI), PI);
        assert!(wrap_to_pi(TAU).abs() < 1e-12);
        assert!((wrap_to_pi(3.0 * PI).abs() - PI).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_to_pi_straddling_difference() {
        // +3.0 measured against -3.0 predicted
        let wrapped = wrap_to_pi(-3.0 - 3.0);
        assert!((wrapped - (TAU - 6.0)).abs() < 1e-12);
        assert!(wrapped > -PI && wrapped <= PI);
    }

    #[test]
    fn test_wrap_to_pi_non_finite() {
        assert!(wrap_to_pi(f64::NAN).is_nan());
        assert_eq!(wrap_to_pi(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_project_known_state() {
        let x = DVector::from_vec(vec![3.0, 4.0, 1.0, 2.0]);
        let z = project_to_measurement_space(&x).unwrap();

        assert!((z[0] - 5.0).abs() < 1e-12);
        assert!((z[1] - 4.0f64.atan2(3.0)).abs() < 1e-12);
        // (3*1 + 4*2) / 5
        assert!((z[2] - 2.2).abs() < 1e-12);
    }

    #[test]
    fn test_project_origin_is_degenerate() {
        let x = DVector::from_vec(vec![0.0, 0.0, 5.0, -1.0]);
        match project_to_measurement_space(&x) {
            Err(EstimatorError::DegenerateGeometry { range, .. }) => assert_eq!(range, 0.0),
            other => panic!("expected DegenerateGeometry, got {:?}", other),
        }
    }

    #[test]
    fn test_project_nan_state_is_degenerate() {
        let x = DVector::from_vec(vec![f64::NAN, 0.0, 0.0, 0.0]);
        assert!(matches!(
            project_to_measurement_space(&x),
            Err(EstimatorError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn test_project_short_state() {
        let x = DVector::from_vec(vec![1.0, 1.0]);
        assert!(matches!(
            project_to_measurement_space(&x),
            Err(EstimatorError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_range_bearing_rate_descriptor() {
        let h = RangeBearingRate;
        assert_eq!(h.dimension(), 3);
        assert_eq!(h.state_dimension(), 4);
        assert_eq!(h.angular_components(), &[BEARING_INDEX]);
    }
}
