//! Error types for the estimator

use thiserror::Error;

/// Errors reported by [`crate::Estimator`] operations.
///
/// Every variant is recoverable: the operation that returned it left the
/// belief state (x, P) exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    /// Operation invoked before `initialize`, or with operands whose shapes
    /// do not conform to each other
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// Innovation covariance S could not be inverted, or is too close to
    /// singular relative to its own scale
    #[error("Innovation covariance is singular or ill-conditioned (rcond = {reciprocal_condition:e})")]
    NumericalSingularity { reciprocal_condition: f64 },

    /// Measurement projection is undefined at the current state
    #[error("Degenerate geometry: range {range:e} is below minimum {min_range:e}")]
    DegenerateGeometry { range: f64, min_range: f64 },
}

impl EstimatorError {
    /// Shape mismatch between an operand and what the estimator expects
    pub(crate) fn shape(
        operand: &str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        EstimatorError::PreconditionViolation(format!(
            "{} must be {}x{}, got {}x{}",
            operand, expected.0, expected.1, actual.0, actual.1
        ))
    }

    /// True for conditions a tracking session should tolerate by skipping
    /// the current cycle.
    pub fn is_recoverable_measurement_fault(&self) -> bool {
        matches!(
            self,
            EstimatorError::NumericalSingularity { .. } | EstimatorError::DegenerateGeometry { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_message() {
        let err = EstimatorError::shape("R", (2, 2), (3, 3));
        assert_eq!(
            err.to_string(),
            "Precondition violated: R must be 2x2, got 3x3"
        );
    }

    #[test]
    fn test_measurement_fault_classification() {
        assert!(EstimatorError::NumericalSingularity { reciprocal_condition: 0.0 }
            .is_recoverable_measurement_fault());
        assert!(EstimatorError::DegenerateGeometry {
            range: 0.0,
            min_range: 1e-4
        }
        .is_recoverable_measurement_fault());
        assert!(!EstimatorError::PreconditionViolation("not initialized".into())
            .is_recoverable_measurement_fault());
    }
}
