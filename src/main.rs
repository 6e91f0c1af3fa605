use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fwunpack::cli::Args;
use fwunpack::{carve, unpack_firmware, UnpackError, UnpackOptions};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<()> {
    let options = UnpackOptions { max_depth: args.max_depth };
    let summary = unpack_firmware(&args.firmware, &args.output_dir, &options)
        .with_context(|| format!("failed to unpack {}", args.firmware.display()))?;

    if let Some(report_path) = &args.report {
        summary
            .report
            .write_json(report_path)
            .with_context(|| format!("failed to write run report to {}", report_path.display()))?;
    }

    println!("Found {} executable files.", summary.executables.len());
    match &summary.manifest {
        Some(path) => println!("Executable list saved to {}", path.display()),
        None => println!("Executable list could not be saved."),
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    // The carving tool is the one mandatory prerequisite; everything else
    // degrades format-by-format.
    if !carve::binwalk_available() {
        eprintln!(
            "Error: {}. Please install it.",
            UnpackError::prerequisite_missing(carve::BINWALK)
        );
        std::process::exit(1);
    }

    if let Err(err) = run(args) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
