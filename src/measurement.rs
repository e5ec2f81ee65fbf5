//! Measurement ingestion
//!
//! Parses the whitespace separated lidar/radar log format:
//!
//! ```text
//! L  px  py  timestamp_us  [gt_px gt_py gt_vx gt_vy ...]
//! R  rho phi rho_dot timestamp_us  [gt_px gt_py gt_vx gt_vy ...]
//! ```
//!
//! Ground truth columns are optional and anything past the first four is
//! ignored.

use std::io::BufRead;
use std::str::FromStr;

use nalgebra::DVector;
use strum::{Display, EnumString};
use thiserror::Error;

/// Number of ground truth values used (px, py, vx, vy)
pub const GROUND_TRUTH_LEN: usize = 4;

/// Errors that can occur when reading a measurement log
#[derive(Error, Debug)]
pub enum ParseError {
    /// First column is neither `L` nor `R`
    #[error("Line {line}: unknown sensor type '{tag}'")]
    UnknownSensor { line: usize, tag: String },

    /// Line ended before a required column
    #[error("Line {line}: missing field '{field}'")]
    MissingField { line: usize, field: &'static str },

    /// Column could not be parsed as a number
    #[error("Line {line}: invalid value '{value}' for field '{field}'")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    /// Ground truth present but incomplete
    #[error("Line {line}: expected 4 ground truth values, got {actual}")]
    PartialGroundTruth { line: usize, actual: usize },

    /// Reading from the underlying source failed
    #[error("Line {line}: read failed")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Sensor that produced a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum SensorType {
    /// Linear sensor measuring `[px, py]`
    #[strum(serialize = "L", to_string = "lidar")]
    Lidar,
    /// Nonlinear sensor measuring `[rho, phi, rho_dot]`
    #[strum(serialize = "R", to_string = "radar")]
    Radar,
}

impl SensorType {
    /// Number of values in one raw measurement
    pub fn measurement_len(&self) -> usize {
        match self {
            SensorType::Lidar => 2,
            SensorType::Radar => 3,
        }
    }
}

/// One parsed measurement line
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPackage {
    pub sensor_type: SensorType,
    /// Timestamp in microseconds
    pub timestamp: u64,
    /// `[px, py]` for lidar, `[rho, phi, rho_dot]` for radar
    pub raw: DVector<f64>,
    /// `[px, py, vx, vy]` when the log carries it
    pub ground_truth: Option<DVector<f64>>,
}

impl MeasurementPackage {
    pub fn lidar(px: f64, py: f64, timestamp: u64) -> Self {
        MeasurementPackage {
            sensor_type: SensorType::Lidar,
            timestamp,
            raw: DVector::from_vec(vec![px, py]),
            ground_truth: None,
        }
    }

    pub fn radar(rho: f64, phi: f64, rho_dot: f64, timestamp: u64) -> Self {
        MeasurementPackage {
            sensor_type: SensorType::Radar,
            timestamp,
            raw: DVector::from_vec(vec![rho, phi, rho_dot]),
            ground_truth: None,
        }
    }

    pub fn with_ground_truth(mut self, ground_truth: DVector<f64>) -> Self {
        self.ground_truth = Some(ground_truth);
        self
    }

    /// Measured position in Cartesian coordinates
    pub fn position(&self) -> (f64, f64) {
        match self.sensor_type {
            SensorType::Lidar => (self.raw[0], self.raw[1]),
            SensorType::Radar => {
                let (rho, phi) = (self.raw[0], self.raw[1]);
                (rho * phi.cos(), rho * phi.sin())
            }
        }
    }
}

/// Field names in column order, per sensor
fn field_names(sensor_type: SensorType) -> &'static [&'static str] {
    match sensor_type {
        SensorType::Lidar => &["px", "py"],
        SensorType::Radar => &["rho", "phi", "rho_dot"],
    }
}

fn parse_number<T: FromStr>(
    token: Option<&str>,
    line: usize,
    field: &'static str,
) -> Result<T, ParseError> {
    let token = token.ok_or(ParseError::MissingField { line, field })?;
    token.parse().map_err(|_| ParseError::InvalidNumber {
        line,
        field,
        value: token.to_string(),
    })
}

/// Like [`parse_number`], but `NaN` and infinities are rejected too
fn parse_finite(token: Option<&str>, line: usize, field: &'static str) -> Result<f64, ParseError> {
    let value = parse_number::<f64>(token, line, field)?;
    if !value.is_finite() {
        return Err(ParseError::InvalidNumber {
            line,
            field,
            value: token.unwrap_or_default().to_string(),
        });
    }
    Ok(value)
}

/// Parse a single log line
///
/// Returns `Ok(None)` for blank lines and `#` comments.
pub fn parse_line(text: &str, line: usize) -> Result<Option<MeasurementPackage>, ParseError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = text.split_whitespace();
    let tag = tokens.next().unwrap_or_default();
    let sensor_type = SensorType::from_str(tag).map_err(|_| ParseError::UnknownSensor {
        line,
        tag: tag.to_string(),
    })?;

    let names = field_names(sensor_type);
    let mut raw = Vec::with_capacity(names.len());
    for &name in names {
        raw.push(parse_finite(tokens.next(), line, name)?);
    }
    let timestamp = parse_number::<u64>(tokens.next(), line, "timestamp")?;

    let mut ground_truth = Vec::with_capacity(GROUND_TRUTH_LEN);
    for name in ["gt_px", "gt_py", "gt_vx", "gt_vy"] {
        match tokens.next() {
            Some(token) => ground_truth.push(parse_finite(Some(token), line, name)?),
            None => break,
        }
    }
    let ground_truth = match ground_truth.len() {
        0 => None,
        GROUND_TRUTH_LEN => Some(DVector::from_vec(ground_truth)),
        actual => return Err(ParseError::PartialGroundTruth { line, actual }),
    };

    Ok(Some(MeasurementPackage {
        sensor_type,
        timestamp,
        raw: DVector::from_vec(raw),
        ground_truth,
    }))
}

/// Parse every line of a measurement log
pub fn parse_measurements<R: BufRead>(reader: R) -> Result<Vec<MeasurementPackage>, ParseError> {
    let mut packages = Vec::new();
    for (index, text) in reader.lines().enumerate() {
        let line = index + 1;
        let text = text.map_err(|source| ParseError::Io { line, source })?;
        if let Some(package) = parse_line(&text, line)? {
            packages.push(package);
        }
    }
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lidar_with_ground_truth() {
        let text = "L\t3.122427e-01\t5.803398e-01\t1477010443000000\t6.000000e-01\t6.000000e-01\t5.199937e+00\t0\t0\t6.911322e-03";
        let package = parse_line(text, 1).unwrap().unwrap();

        assert_eq!(package.sensor_type, SensorType::Lidar);
        assert_eq!(package.timestamp, 1477010443000000);
        assert!((package.raw[0] - 0.3122427).abs() < 1e-9);
        let gt = package.ground_truth.unwrap();
        assert_eq!(gt.len(), 4);
        assert!((gt[2] - 5.199937).abs() < 1e-9);
    }

    #[test]
    fn test_parse_radar_without_ground_truth() {
        let package = parse_line("R 1.014892 0.554329 4.892807 1477010443050000", 7)
            .unwrap()
            .unwrap();

        assert_eq!(package.sensor_type, SensorType::Radar);
        assert_eq!(package.raw.len(), 3);
        assert!(package.ground_truth.is_none());

        let (px, py) = package.position();
        assert!((px - 1.014892 * 0.554329f64.cos()).abs() < 1e-12);
        assert!((py - 1.014892 * 0.554329f64.sin()).abs() < 1e-12);
    }

    #[test]
    fn test_skip_blank_and_comment() {
        assert!(parse_line("", 1).unwrap().is_none());
        assert!(parse_line("   ", 2).unwrap().is_none());
        assert!(parse_line("# header", 3).unwrap().is_none());
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            parse_line("X 1 2 3", 4),
            Err(ParseError::UnknownSensor { line: 4, .. })
        ));
        assert!(matches!(
            parse_line("R 1.0 0.5", 5),
            Err(ParseError::MissingField {
                line: 5,
                field: "rho_dot"
            })
        ));
        assert!(matches!(
            parse_line("L 1.0 abc 100", 6),
            Err(ParseError::InvalidNumber { field: "py", .. })
        ));
        assert!(matches!(
            parse_line("L 1.0 2.0 -100", 7),
            Err(ParseError::InvalidNumber {
                field: "timestamp",
                ..
            })
        ));
        assert!(matches!(
            parse_line("L 1.0 2.0 100 1.0 2.0", 8),
            Err(ParseError::PartialGroundTruth { actual: 2, .. })
        ));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        assert!(matches!(
            parse_line("L NaN 1.0 0", 9),
            Err(ParseError::InvalidNumber { field: "px", .. })
        ));
        assert!(matches!(
            parse_line("R 1.0 inf 0.5 0", 10),
            Err(ParseError::InvalidNumber { field: "phi", .. })
        ));
        assert!(matches!(
            parse_line("R 1.0 0.1 -infinity 0", 11),
            Err(ParseError::InvalidNumber {
                field: "rho_dot",
                ..
            })
        ));
        assert!(matches!(
            parse_line("L 1.0 2.0 100 1.0 2.0 nan 0.0", 12),
            Err(ParseError::InvalidNumber { field: "gt_vx", .. })
        ));
    }

    #[test]
    fn test_parse_measurements_reports_line_number() {
        let log = "L 1 2 100\n\nR 1 0.1 0.5 200\nL 1 oops 300\n";
        let err = parse_measurements(log.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { line: 4, .. }));

        let packages = parse_measurements("L 1 2 100\nR 1 0.1 0.5 200\n".as_bytes()).unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[1].timestamp, 200);
    }

    #[test]
    fn test_sensor_type_names() {
        assert_eq!(SensorType::Lidar.to_string(), "lidar");
        assert_eq!(SensorType::from_str("R").unwrap(), SensorType::Radar);
        assert_eq!(SensorType::Radar.measurement_len(), 3);
    }
}
