//! Running a measurement log and reporting the estimates
//!
//! Output is one tab separated line per measurement that produced an
//! estimate:
//!
//! ```text
//! est_px est_py est_vx est_vy meas_px meas_py gt_px gt_py gt_vx gt_vy
//! ```
//!
//! Ground truth columns are left empty when the log has none.

use std::io::{self, Write};

use nalgebra::DVector;

use crate::fusion::{FusionEkf, FusionError, Outcome};
use crate::measurement::MeasurementPackage;
use crate::tools::{calculate_rmse, ToolsError};

/// Estimate after one measurement, with what it is judged against
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateRecord {
    pub outcome: Outcome,
    /// `[px, py, vx, vy]` after the cycle
    pub estimate: DVector<f64>,
    /// Measured position in Cartesian coordinates
    pub measured: (f64, f64),
    pub ground_truth: Option<DVector<f64>>,
}

/// Feed every package through `fusion`, collecting one record per
/// measurement that left the filter with an estimate
pub fn track(
    fusion: &mut FusionEkf,
    packages: &[MeasurementPackage],
) -> Result<Vec<EstimateRecord>, FusionError> {
    let mut records = Vec::with_capacity(packages.len());
    for package in packages {
        let outcome = fusion.process_measurement(package)?;
        if outcome == Outcome::Ignored {
            continue;
        }
        if let Some(estimate) = fusion.estimate() {
            records.push(EstimateRecord {
                outcome,
                estimate: estimate.clone(),
                measured: package.position(),
                ground_truth: package.ground_truth.clone(),
            });
        }
    }
    Ok(records)
}

/// Write records in the tab separated output format
pub fn write_records<W: Write>(mut writer: W, records: &[EstimateRecord]) -> io::Result<()> {
    for record in records {
        let mut columns: Vec<String> = record.estimate.iter().map(|v| v.to_string()).collect();
        columns.push(record.measured.0.to_string());
        columns.push(record.measured.1.to_string());
        match &record.ground_truth {
            Some(gt) => columns.extend(gt.iter().map(|v| v.to_string())),
            None => columns.extend(std::iter::repeat(String::new()).take(4)),
        }
        writeln!(writer, "{}", columns.join("\t"))?;
    }
    writer.flush()
}

/// RMSE over the records that carry ground truth, `None` if none do
pub fn rmse(records: &[EstimateRecord]) -> Result<Option<DVector<f64>>, ToolsError> {
    let (estimations, ground_truth): (Vec<_>, Vec<_>) = records
        .iter()
        .filter_map(|r| r.ground_truth.as_ref().map(|gt| (r.estimate.clone(), gt.clone())))
        .unzip();

    if estimations.is_empty() {
        return Ok(None);
    }
    calculate_rmse(&estimations, &ground_truth).map(Some)
}
