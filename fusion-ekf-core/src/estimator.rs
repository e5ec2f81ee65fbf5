//! Kalman / Extended Kalman Estimator
//!
//! Holds the Gaussian belief `(x, P)` of a single tracked object together
//! with the process model `(F, Q)` and the measurement model `(H, R)`.
//!
//! The estimator has no notion of sensor type. The caller refreshes `F`/`Q`
//! before each [`Estimator::predict`] and swaps `H`/`R` before each update,
//! then picks [`Estimator::update`] for a linear sensor or
//! [`Estimator::update_nonlinear`] for a range/bearing/range-rate sensor
//! (with `H` set to the Jacobian evaluated at the predicted state).
//!
//! Every update is transactional: a failed update leaves `x` and `P`
//! untouched, so one bad measurement never corrupts later cycles.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::error::EstimatorError;
use super::projection::{wrap_to_pi, MeasurementFunction, RangeBearingRate};

/// Innovation covariance whose reciprocal condition number
/// (smallest / largest singular value) falls below this is treated as singular
pub const MIN_RECIPROCAL_CONDITION: f64 = 1e-12;

/// Snapshot of the belief state, for reporting and accuracy evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// State mean x
    pub state: DVector<f64>,
    /// State covariance P
    pub covariance: DMatrix<f64>,
}

/// Belief and model matrices, present only after initialization
#[derive(Debug, Clone)]
struct FilterState {
    /// State mean
    x: DVector<f64>,
    /// Estimate error covariance
    p: DMatrix<f64>,
    /// State transition matrix
    f: DMatrix<f64>,
    /// Process noise covariance
    q: DMatrix<f64>,
    /// Observation matrix (or Jacobian of the measurement function)
    h: DMatrix<f64>,
    /// Measurement noise covariance
    r: DMatrix<f64>,
}

impl FilterState {
    fn n(&self) -> usize {
        self.x.len()
    }

    fn check_measurement(&self, z: &DVector<f64>) -> Result<(), EstimatorError> {
        if z.len() != self.h.nrows() {
            return Err(EstimatorError::shape(
                "z",
                (self.h.nrows(), 1),
                (z.len(), 1),
            ));
        }
        Ok(())
    }

    /// Gain/covariance algebra shared by the linear and extended updates.
    ///
    /// Returns the corrected `(x, P)` without committing them.
    fn correct(&self, y: &DVector<f64>) -> Result<(DVector<f64>, DMatrix<f64>), EstimatorError> {
        let ht = self.h.transpose();

        // S = H * P * H^T + R
        let s = &self.h * &self.p * &ht + &self.r;
        let reciprocal_condition = reciprocal_condition(&s);
        if reciprocal_condition.is_nan() || reciprocal_condition < MIN_RECIPROCAL_CONDITION {
            return Err(EstimatorError::NumericalSingularity { reciprocal_condition });
        }
        let s_inv = s
            .try_inverse()
            .ok_or(EstimatorError::NumericalSingularity { reciprocal_condition })?;

        // K = P * H^T * S^-1
        let k = &self.p * &ht * s_inv;

        // x = x + K * y
        let x = &self.x + &k * y;

        // P = (I - K * H) * P
        let n = self.n();
        let p = (DMatrix::<f64>::identity(n, n) - &k * &self.h) * &self.p;

        if x.iter().chain(p.iter()).any(|v| !v.is_finite()) {
            return Err(EstimatorError::NumericalSingularity { reciprocal_condition });
        }

        Ok((x, p))
    }
}

/// Recursive Bayesian estimator for one tracked object
#[derive(Debug, Clone, Default)]
pub struct Estimator {
    filter: Option<FilterState>,
}

impl Estimator {
    /// Create an estimator that must be initialized before use
    pub fn new() -> Self {
        Estimator { filter: None }
    }

    /// Store the initial belief and all model matrices, replacing any
    /// previous state.
    ///
    /// `x0` has length n; `p0`, `f0` and `q0` are n×n; `h0` is m×n and `r0`
    /// is m×m. On a shape mismatch nothing is stored.
    pub fn initialize(
        &mut self,
        x0: DVector<f64>,
        p0: DMatrix<f64>,
        f0: DMatrix<f64>,
        h0: DMatrix<f64>,
        r0: DMatrix<f64>,
        q0: DMatrix<f64>,
    ) -> Result<(), EstimatorError> {
        let n = x0.len();
        if n == 0 {
            return Err(EstimatorError::PreconditionViolation(
                "state vector must not be empty".to_string(),
            ));
        }
        check_square("P", &p0, n)?;
        check_square("F", &f0, n)?;
        check_square("Q", &q0, n)?;
        check_measurement_model(&h0, &r0, n)?;

        debug!("Estimator initialized: n = {}, m = {}", n, h0.nrows());
        self.filter = Some(FilterState {
            x: x0,
            p: p0,
            f: f0,
            q: q0,
            h: h0,
            r: r0,
        });
        Ok(())
    }

    /// Whether `initialize` has been called
    pub fn is_initialized(&self) -> bool {
        self.filter.is_some()
    }

    /// Replace the process model `(F, Q)`, typically once per time step
    pub fn set_transition(&mut self, f: DMatrix<f64>, q: DMatrix<f64>) -> Result<(), EstimatorError> {
        let filter = self.filter_mut()?;
        let n = filter.n();
        check_square("F", &f, n)?;
        check_square("Q", &q, n)?;
        filter.f = f;
        filter.q = q;
        Ok(())
    }

    /// Replace the measurement model `(H, R)` before an update
    pub fn set_measurement_model(
        &mut self,
        h: DMatrix<f64>,
        r: DMatrix<f64>,
    ) -> Result<(), EstimatorError> {
        let filter = self.filter_mut()?;
        check_measurement_model(&h, &r, filter.n())?;
        filter.h = h;
        filter.r = r;
        Ok(())
    }

    /// Predict step: project state and covariance forward in time
    ///
    /// `x = F * x`, `P = F * P * F^T + Q`
    pub fn predict(&mut self) -> Result<(), EstimatorError> {
        let filter = self.filter_mut()?;

        filter.x = &filter.f * &filter.x;
        filter.p = &filter.f * &filter.p * filter.f.transpose() + &filter.q;

        trace!("predict: x = {:?}", filter.x.as_slice());
        Ok(())
    }

    /// Linear update step with measurement `z` (innovation `z - H * x`)
    pub fn update(&mut self, z: &DVector<f64>) -> Result<(), EstimatorError> {
        let filter = self.filter_ref()?;
        filter.check_measurement(z)?;

        let y = z - &filter.h * &filter.x;
        let corrected = filter.correct(&y);
        self.commit(corrected)
    }

    /// Extended update step against the range/bearing/range-rate projection
    ///
    /// `H` must hold the Jacobian of the projection evaluated at the current
    /// (predicted) state.
    pub fn update_nonlinear(&mut self, z: &DVector<f64>) -> Result<(), EstimatorError> {
        self.update_with(z, &RangeBearingRate)
    }

    /// Extended update step against an arbitrary measurement function
    pub fn update_with<M>(&mut self, z: &DVector<f64>, model: &M) -> Result<(), EstimatorError>
    where
        M: MeasurementFunction + ?Sized,
    {
        let y = self.nonlinear_innovation(z, model)?;
        let corrected = self.filter_ref()?.correct(&y);
        self.commit(corrected)
    }

    /// Innovation `z - h(x)` with angular components wrapped to (-PI, PI]
    pub fn nonlinear_innovation<M>(
        &self,
        z: &DVector<f64>,
        model: &M,
    ) -> Result<DVector<f64>, EstimatorError>
    where
        M: MeasurementFunction + ?Sized,
    {
        let filter = self.filter_ref()?;
        filter.check_measurement(z)?;
        if model.dimension() != z.len() {
            return Err(EstimatorError::shape(
                "z",
                (model.dimension(), 1),
                (z.len(), 1),
            ));
        }
        if model.state_dimension() > filter.n() {
            return Err(EstimatorError::shape(
                "x",
                (model.state_dimension(), 1),
                (filter.n(), 1),
            ));
        }

        let z_hat = model.project(&filter.x)?;
        if z_hat.len() != z.len() {
            return Err(EstimatorError::shape("h(x)", (z.len(), 1), (z_hat.len(), 1)));
        }
        if let Some(&i) = model.angular_components().iter().find(|&&i| i >= z.len()) {
            return Err(EstimatorError::PreconditionViolation(format!(
                "angular component {} out of range for a {}-element measurement",
                i,
                z.len()
            )));
        }

        let mut y = z - z_hat;
        for &i in model.angular_components() {
            y[i] = wrap_to_pi(y[i]);
        }
        Ok(y)
    }

    /// Current state mean x
    pub fn state(&self) -> Option<&DVector<f64>> {
        self.filter.as_ref().map(|f| &f.x)
    }

    /// Current state covariance P
    pub fn covariance(&self) -> Option<&DMatrix<f64>> {
        self.filter.as_ref().map(|f| &f.p)
    }

    /// Owned copy of `(x, P)`
    pub fn snapshot(&self) -> Option<Estimate> {
        self.filter.as_ref().map(|f| Estimate {
            state: f.x.clone(),
            covariance: f.p.clone(),
        })
    }

    /// Mean variance of the first two state components (position)
    pub fn position_variance(&self) -> Option<f64> {
        self.mean_variance(0)
    }

    /// Mean variance of the third and fourth state components (velocity)
    pub fn velocity_variance(&self) -> Option<f64> {
        self.mean_variance(2)
    }

    fn mean_variance(&self, first: usize) -> Option<f64> {
        let p = self.covariance()?;
        if p.nrows() < first + 2 {
            return None;
        }
        Some((p[(first, first)] + p[(first + 1, first + 1)]) / 2.0)
    }

    fn filter_ref(&self) -> Result<&FilterState, EstimatorError> {
        self.filter.as_ref().ok_or_else(not_initialized)
    }

    fn filter_mut(&mut self) -> Result<&mut FilterState, EstimatorError> {
        self.filter.as_mut().ok_or_else(not_initialized)
    }

    fn commit(
        &mut self,
        corrected: Result<(DVector<f64>, DMatrix<f64>), EstimatorError>,
    ) -> Result<(), EstimatorError> {
        match corrected {
            Ok((x, p)) => {
                let filter = self.filter_mut()?;
                filter.x = x;
                filter.p = p;
                trace!("update: x = {:?}", filter.x.as_slice());
                Ok(())
            }
            Err(e) => {
                debug!("Update rejected, keeping prior belief: {}", e);
                Err(e)
            }
        }
    }
}

fn not_initialized() -> EstimatorError {
    EstimatorError::PreconditionViolation("estimator used before initialize".to_string())
}

/// Smallest over largest singular value of `s`, independent of its units.
/// NaN when `s` is all zeros or holds non-finite entries.
fn reciprocal_condition(s: &DMatrix<f64>) -> f64 {
    if s.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    let singular_values = s.singular_values();
    singular_values.min() / singular_values.max()
}

fn check_square(operand: &str, m: &DMatrix<f64>, n: usize) -> Result<(), EstimatorError> {
    if m.shape() != (n, n) {
        return Err(EstimatorError::shape(operand, (n, n), m.shape()));
    }
    Ok(())
}

fn check_measurement_model(
    h: &DMatrix<f64>,
    r: &DMatrix<f64>,
    n: usize,
) -> Result<(), EstimatorError> {
    let m = h.nrows();
    if m == 0 || h.ncols() != n {
        return Err(EstimatorError::shape("H", (m.max(1), n), h.shape()));
    }
    check_square("R", r, m)
}
