//! Constant-velocity motion model
//!
//! Builds the state transition `F` and process noise `Q` for the 4-state
//! `[px, py, vx, vy]` model, driven by white-noise acceleration.

use nalgebra::DMatrix;

/// Transition and process noise for an elapsed time `dt` (seconds)
///
/// # Arguments
/// * `dt` - Time since the previous measurement in seconds
/// * `noise_ax` - Acceleration variance along x (m²/s⁴)
/// * `noise_ay` - Acceleration variance along y (m²/s⁴)
pub fn constant_velocity(dt: f64, noise_ax: f64, noise_ay: f64) -> (DMatrix<f64>, DMatrix<f64>) {
    // x_new = x + v * dt
    let mut f = DMatrix::<f64>::identity(4, 4);
    f[(0, 2)] = dt;
    f[(1, 3)] = dt;

    let dt2 = dt * dt;
    let dt3 = dt2 * dt;
    let dt4 = dt3 * dt;

    // Q = G * diag(ax, ay) * G^T with G = [dt²/2, dt]
    let mut q = DMatrix::<f64>::zeros(4, 4);
    q[(0, 0)] = dt4 / 4.0 * noise_ax;
    q[(0, 2)] = dt3 / 2.0 * noise_ax;
    q[(1, 1)] = dt4 / 4.0 * noise_ay;
    q[(1, 3)] = dt3 / 2.0 * noise_ay;
    q[(2, 0)] = dt3 / 2.0 * noise_ax;
    q[(2, 2)] = dt2 * noise_ax;
    q[(3, 1)] = dt3 / 2.0 * noise_ay;
    q[(3, 3)] = dt2 * noise_ay;

    (f, q)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_couples_velocity() {
        let (f, _) = constant_velocity(0.1, 9.0, 9.0);
        let x = nalgebra::DVector::from_vec(vec![100.0, 0.0, 5.0, -2.0]);
        let moved = &f * &x;

        assert!((moved[0] - 100.5).abs() < 1e-12);
        assert!((moved[1] - -0.2).abs() < 1e-12);
        assert!((moved[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_process_noise_values() {
        let (_, q) = constant_velocity(2.0, 9.0, 4.0);

        assert!((q[(0, 0)] - 36.0).abs() < 1e-12); // 16/4 * 9
        assert!((q[(0, 2)] - 36.0).abs() < 1e-12); // 8/2 * 9
        assert!((q[(1, 1)] - 16.0).abs() < 1e-12);
        assert!((q[(3, 3)] - 16.0).abs() < 1e-12); // 4 * 4
        assert_eq!(q[(0, 1)], 0.0);
        assert_eq!(q, q.transpose());
    }

    #[test]
    fn test_zero_dt_is_identity() {
        let (f, q) = constant_velocity(0.0, 9.0, 9.0);
        assert_eq!(f, DMatrix::identity(4, 4));
        assert!(q.iter().all(|v| *v == 0.0));
    }
}
