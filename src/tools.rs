use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::error::{Result, UnpackError};

/// Capability interface over the external tools the pipeline depends on.
///
/// One method per tool-backed extraction strategy plus content inspection.
/// Gzip and tar are handled natively by the dispatcher and do not appear here.
/// Implementations must not panic on missing tools; absence surfaces as an
/// error the dispatcher downgrades to a no-op.
pub trait ExternalTools {
    /// Describe a file's content (`file -b` semantics). `None` when the
    /// inspection helper is unavailable or exits non-zero.
    fn describe(&self, path: &Path) -> Option<String>;

    /// Extract a squashfs image into `dest` with `unsquashfs`.
    fn unsquashfs(&self, image: &Path, dest: &Path) -> Result<()>;

    /// Extract a squashfs image into `dest` with `sasquatch` (fallback).
    fn sasquatch(&self, image: &Path, dest: &Path) -> Result<()>;

    /// Extract a jffs2 image into `dest` with `jefferson`.
    fn jefferson(&self, image: &Path, dest: &Path) -> Result<()>;

    /// Unpack a cpio archive with `cpio -idm`, scoped to `workdir`.
    fn cpio_extract(&self, archive: &Path, workdir: &Path) -> Result<()>;
}

/// Process-invoking implementation used in production. Every call blocks
/// until the tool exits; there is no timeout.
pub struct SystemTools;

impl SystemTools {
    /// Probe tool availability by running it. `Command::output` fails with
    /// `NotFound` when the binary is absent from PATH.
    pub fn tool_available(tool: &str) -> bool {
        Command::new(tool)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .is_ok()
    }

    fn run(mut cmd: Command, tool: &str) -> Result<()> {
        debug!(tool, "invoking external tool");
        let output = cmd
            .output()
            .map_err(|e| UnpackError::tool_invocation(tool, e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(UnpackError::tool_invocation(tool, stderr.trim().to_string()))
        }
    }
}

impl ExternalTools for SystemTools {
    fn describe(&self, path: &Path) -> Option<String> {
        let output = Command::new("file").arg("-b").arg(path).output().ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn unsquashfs(&self, image: &Path, dest: &Path) -> Result<()> {
        let mut cmd = Command::new("unsquashfs");
        cmd.arg("-f").arg("-d").arg(dest).arg(image);
        Self::run(cmd, "unsquashfs")
    }

    fn sasquatch(&self, image: &Path, dest: &Path) -> Result<()> {
        let mut cmd = Command::new("sasquatch");
        cmd.arg("-d").arg(dest).arg(image);
        Self::run(cmd, "sasquatch")
    }

    fn jefferson(&self, image: &Path, dest: &Path) -> Result<()> {
        let mut cmd = Command::new("jefferson");
        cmd.arg("-d").arg(dest).arg(image);
        Self::run(cmd, "jefferson")
    }

    fn cpio_extract(&self, archive: &Path, workdir: &Path) -> Result<()> {
        let input = File::open(archive)?;
        let mut cmd = Command::new("cpio");
        cmd.arg("-idm").current_dir(workdir).stdin(Stdio::from(input));
        Self::run(cmd, "cpio")
    }
}
