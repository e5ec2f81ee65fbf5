//! Jacobian and accuracy helpers

use fusion_ekf_core::{EstimatorError, MIN_RANGE};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Errors from accuracy evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolsError {
    #[error("No estimates to evaluate")]
    Empty,

    #[error("Length mismatch: {estimations} estimates, {ground_truth} ground truth samples")]
    LengthMismatch {
        estimations: usize,
        ground_truth: usize,
    },

    #[error("Dimension mismatch at sample {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Jacobian of `h(x) = [range, bearing, range_rate]` at `x = [px, py, vx, vy]`
///
/// Evaluated at the predicted state right before a radar update. Fails with
/// `DegenerateGeometry` when the target is within `MIN_RANGE` of the
/// sensor, where the partial derivatives blow up.
pub fn calculate_jacobian(x: &DVector<f64>) -> Result<DMatrix<f64>, EstimatorError> {
    if x.len() != 4 {
        return Err(EstimatorError::PreconditionViolation(format!(
            "Jacobian needs a 4-element state, got {}",
            x.len()
        )));
    }

    let px = x[0];
    let py = x[1];
    let vx = x[2];
    let vy = x[3];

    let c1 = px * px + py * py;
    let c2 = c1.sqrt();
    if c2.is_nan() || c2 < MIN_RANGE {
        return Err(EstimatorError::DegenerateGeometry {
            range: c2,
            min_range: MIN_RANGE,
        });
    }
    let c3 = c1 * c2;

    #[rustfmt::skip]
    let hj = DMatrix::from_row_slice(3, 4, &[
        px / c2,                         py / c2,                         0.0,     0.0,
        -py / c1,                        px / c1,                         0.0,     0.0,
        py * (vx * py - vy * px) / c3,   px * (px * vy - py * vx) / c3,   px / c2, py / c2,
    ]);

    Ok(hj)
}

/// Root mean squared error of `estimations` against `ground_truth`
pub fn calculate_rmse(
    estimations: &[DVector<f64>],
    ground_truth: &[DVector<f64>],
) -> Result<DVector<f64>, ToolsError> {
    if estimations.is_empty() {
        return Err(ToolsError::Empty);
    }
    if estimations.len() != ground_truth.len() {
        return Err(ToolsError::LengthMismatch {
            estimations: estimations.len(),
            ground_truth: ground_truth.len(),
        });
    }

    let dim = estimations[0].len();
    let mut sum = DVector::<f64>::zeros(dim);

    for (index, (est, gt)) in estimations.iter().zip(ground_truth).enumerate() {
        for len in [est.len(), gt.len()] {
            if len != dim {
                return Err(ToolsError::DimensionMismatch {
                    index,
                    expected: dim,
                    actual: len,
                });
            }
        }
        let residual = est - gt;
        sum += residual.component_mul(&residual);
    }

    Ok((sum / estimations.len() as f64).map(f64::sqrt))
}
