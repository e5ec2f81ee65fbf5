//! End-to-end runs over a synthetic lidar/radar log

use std::fmt::Write as _;
use std::fs;
use std::io::BufReader;
use std::process::Command;

use fusion_ekf::measurement::parse_measurements;
use fusion_ekf::report::{rmse, track, write_records};
use fusion_ekf::{FusionConfig, FusionEkf, Outcome};

const STEP_US: u64 = 50_000;

/// Straight track from (0.6, 0.6) at (2, 1) m/s, alternating lidar and radar
/// lines, with ground truth on every line
fn synthetic_log(steps: u64) -> String {
    let (vx, vy) = (2.0, 1.0);
    let mut log = String::new();
    for step in 0..steps {
        let t = (step * STEP_US) as f64 / 1e6;
        let (px, py) = (0.6 + vx * t, 0.6 + vy * t);
        let timestamp = 1_477_010_443_000_000 + step * STEP_US;

        if step % 2 == 0 {
            write!(log, "L\t{}\t{}\t{}", px, py, timestamp).unwrap();
        } else {
            let rho = px.hypot(py);
            let phi = py.atan2(px);
            let rho_dot = (px * vx + py * vy) / rho;
            write!(log, "R\t{}\t{}\t{}\t{}", rho, phi, rho_dot, timestamp).unwrap();
        }
        writeln!(log, "\t{}\t{}\t{}\t{}", px, py, vx, vy).unwrap();
    }
    log
}

#[test]
fn test_pipeline_tracks_synthetic_log() {
    let log = synthetic_log(100);
    let packages = parse_measurements(BufReader::new(log.as_bytes())).unwrap();
    assert_eq!(packages.len(), 100);

    let mut fusion = FusionEkf::new(FusionConfig::default());
    let records = track(&mut fusion, &packages).unwrap();

    assert_eq!(records.len(), 100);
    assert_eq!(records[0].outcome, Outcome::Initialized);
    assert!(records[1..].iter().all(|r| r.outcome == Outcome::Updated));

    let rmse = rmse(&records).unwrap().unwrap();
    assert!(rmse[0] < 0.1, "px rmse {}", rmse[0]);
    assert!(rmse[1] < 0.1, "py rmse {}", rmse[1]);
    assert!(rmse[2] < 0.6, "vx rmse {}", rmse[2]);
    assert!(rmse[3] < 0.6, "vy rmse {}", rmse[3]);

    let stats = fusion.stats();
    assert_eq!(stats.initialized, 1);
    assert_eq!(stats.updated, 99);
}

#[test]
fn test_lidar_only_session() {
    let log = synthetic_log(40);
    let packages = parse_measurements(BufReader::new(log.as_bytes())).unwrap();

    let mut fusion = FusionEkf::new(FusionConfig {
        use_radar: false,
        ..FusionConfig::default()
    });
    let records = track(&mut fusion, &packages).unwrap();

    assert_eq!(records.len(), 20);
    assert_eq!(fusion.stats().ignored, 20);

    let mut out = Vec::new();
    write_records(&mut out, &records).unwrap();
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 20);
}

#[test]
fn test_binary_writes_estimates() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("measurements.txt");
    let output = dir.path().join("estimates.txt");
    fs::write(&input, synthetic_log(60)).unwrap();

    let result = Command::new(env!("CARGO_BIN_EXE_fusion-ekf"))
        .arg(&input)
        .arg(&output)
        .arg("-q")
        .output()
        .unwrap();
    assert!(result.status.success(), "{:?}", result);

    let stdout = String::from_utf8(result.stdout).unwrap();
    assert!(stdout.starts_with("Accuracy - RMSE:"));
    assert_eq!(stdout.lines().count(), 5);

    let estimates = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = estimates.lines().collect();
    assert_eq!(lines.len(), 60);
    assert_eq!(lines[0].split('\t').count(), 10);
}

#[test]
fn test_binary_reports_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("measurements.txt");
    fs::write(&input, "L 1.0 2.0 100\nQ 1 2 3\n").unwrap();

    let result = Command::new(env!("CARGO_BIN_EXE_fusion-ekf"))
        .arg(&input)
        .arg(dir.path().join("estimates.txt"))
        .arg("-q")
        .output()
        .unwrap();
    assert!(!result.status.success());
}
