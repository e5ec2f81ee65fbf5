use clap::Parser;
use log::info;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::fs::File;
use std::io::{BufReader, BufWriter};

use fusion_ekf::measurement::parse_measurements;
use fusion_ekf::report::{rmse, track, write_records};
use fusion_ekf::{Cli, FusionConfig, FusionEkf, VERSION};

fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    info!("fusion-ekf {}", VERSION);

    let config = FusionConfig::resolve(args.config.as_deref()).into_diagnostic()?;
    let config = args.apply(config);

    let input = File::open(&args.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot open {}", args.input.display()))?;
    let packages = parse_measurements(BufReader::new(input))
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot parse {}", args.input.display()))?;
    info!("Read {} measurements from {}", packages.len(), args.input.display());

    let mut fusion = FusionEkf::new(config);
    let records = track(&mut fusion, &packages).into_diagnostic()?;

    let output = File::create(&args.output)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot create {}", args.output.display()))?;
    write_records(BufWriter::new(output), &records)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot write {}", args.output.display()))?;

    let stats = fusion.stats();
    info!(
        "Processed {} measurements: {} initialized, {} updated, {} skipped, {} ignored",
        stats.total(),
        stats.initialized,
        stats.updated,
        stats.skipped,
        stats.ignored
    );

    if let Some(rmse) = rmse(&records).into_diagnostic()? {
        println!("Accuracy - RMSE:");
        for v in rmse.iter() {
            println!("{:.4}", v);
        }
    }

    Ok(())
}
