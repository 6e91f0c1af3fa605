use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "fwunpack")]
#[command(about = "Unpack a firmware image and inventory its executable artifacts")]
#[command(version)]
pub struct Args {
    /// Firmware image to unpack
    pub firmware: PathBuf,

    /// Directory that receives carving and extraction output
    pub output_dir: PathBuf,

    /// Maximum nested extraction depth
    #[arg(long, default_value_t = crate::recurse::DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Write the structured run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
