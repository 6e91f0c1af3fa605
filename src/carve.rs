use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::error::{Result, UnpackError};
use crate::tools::SystemTools;

pub const BINWALK: &str = "binwalk";

/// Probed once at startup; absence is the only fatal condition in a run.
pub fn binwalk_available() -> bool {
    SystemTools::tool_available(BINWALK)
}

/// Create the output directory and remove entries that would collide with
/// carving output: stale symlinks and leftover `.rar`/`.bin` files.
pub fn prepare_output_dir(out: &Path) -> Result<()> {
    fs::create_dir_all(out)?;
    for entry in fs::read_dir(out)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_symlink = path.symlink_metadata()?.file_type().is_symlink();
        if !is_symlink && !name.ends_with(".rar") && !name.ends_with(".bin") {
            continue;
        }
        info!(path = %path.display(), "removing conflicting entry");
        if is_symlink || path.is_file() {
            fs::remove_file(&path)?;
        } else {
            fs::remove_dir_all(&path)?;
        }
    }
    Ok(())
}

/// Invoke the carving tool against the firmware with the output directory as
/// working context. A non-zero exit is a warning; the run continues with
/// whatever the tool managed to produce.
pub fn run_binwalk(firmware: &Path, out: &Path) -> Result<()> {
    info!(firmware = %firmware.display(), "running binwalk extraction");
    let output = Command::new(BINWALK)
        .arg("-eM")
        .arg(firmware)
        .current_dir(out)
        .output()
        .map_err(|e| UnpackError::tool_invocation(BINWALK, e.to_string()))?;
    if !output.status.success() {
        warn!(status = %output.status, "binwalk extraction had issues, continuing");
    }
    Ok(())
}

/// Carving output is discovered by name pattern, not by parsing tool output:
/// top-level entries named `_*` or `*.extracted`. When none exist the output
/// directory itself becomes the sole root.
pub fn find_extraction_roots(out: &Path) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(entries) = fs::read_dir(out) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('_') || name.ends_with(".extracted") {
                roots.push(entry.path());
            }
        }
    }
    if roots.is_empty() {
        warn!("no carving output found, treating the output directory as the root");
        roots.push(out.to_path_buf());
    }
    roots.sort();
    roots
}
