//! fwunpack - recursive firmware unpacking and executable inventory.
//!
//! The pipeline seeds a working tree with binwalk carving output, then
//! recursively classifies and extracts nested archive and embedded-filesystem
//! formats (gzip, tar, squashfs, jffs2, cpio) until the depth bound is hit or
//! nothing recognizable remains, and finally scans the tree for executable
//! artifacts, persisting them as a manifest.
//!
//! # Example
//!
//! ```no_run
//! use fwunpack::{unpack_firmware, UnpackOptions};
//!
//! let summary = unpack_firmware(
//!     "firmware.img".as_ref(),
//!     "unpacked".as_ref(),
//!     &UnpackOptions::default(),
//! ).unwrap();
//!
//! for exe in &summary.executables {
//!     println!("{} ({:?})", exe.path.display(), exe.evidence);
//! }
//! ```

pub mod carve;
pub mod cli;
pub mod detect;
pub mod error;
pub mod extract;
pub mod recurse;
pub mod report;
pub mod scan;
pub mod tools;

pub use detect::FormatSignature;
pub use error::{Result, UnpackError};
pub use extract::Outcome;
pub use recurse::Unpacker;
pub use report::RunReport;
pub use scan::{ExecEvidence, ExecutableRecord, ExecutableScanner};
pub use tools::{ExternalTools, SystemTools};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Options for one unpack run.
#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// Maximum nested extraction depth.
    pub max_depth: usize,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self { max_depth: recurse::DEFAULT_MAX_DEPTH }
    }
}

/// What one unpack run produced.
#[derive(Debug)]
pub struct UnpackSummary {
    /// The roots the extraction and scan passes operated on.
    pub roots: Vec<PathBuf>,
    /// Executable artifacts found by the final scan, in discovery order.
    pub executables: Vec<ExecutableRecord>,
    /// Per-file record of everything the extraction pass did.
    pub report: RunReport,
    /// Where the manifest landed, if anywhere.
    pub manifest: Option<PathBuf>,
}

/// Run the full pipeline: prepare the output directory, carve with binwalk,
/// recursively extract nested content under every carving root, then scan for
/// executables and persist the manifest.
///
/// Per-file failures never surface here; they are logged and recorded in the
/// run report. An error return means the run could not start at all (for
/// example, an unwritable output directory).
pub fn unpack_firmware(
    firmware: &Path,
    output_dir: &Path,
    options: &UnpackOptions,
) -> Result<UnpackSummary> {
    info!(firmware = %firmware.display(), "unpacking firmware");
    carve::prepare_output_dir(output_dir)?;
    let out = fs::canonicalize(output_dir)?;
    let firmware = fs::canonicalize(firmware).unwrap_or_else(|_| firmware.to_path_buf());

    if let Err(err) = carve::run_binwalk(&firmware, &out) {
        warn!(%err, "carving failed, continuing with the raw output tree");
    }

    let roots = carve::find_extraction_roots(&out);
    let tools = SystemTools;
    let mut unpacker = Unpacker::new(&tools, options.max_depth);
    for root in &roots {
        if root.exists() {
            unpacker.run(root);
        }
    }
    let report = unpacker.into_report();

    info!("collecting executable files");
    let scanner = ExecutableScanner::new(&tools);
    let executables = scanner.scan(&roots);
    info!(count = executables.len(), "found executable files");

    let manifest = scan::write_manifest(&executables, &out);

    Ok(UnpackSummary { roots, executables, report, manifest })
}
