use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::tools::ExternalTools;

pub const MANIFEST_NAME: &str = "executables.txt";

/// Which content indicator justified including a file in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecEvidence {
    Elf,
    Executable,
    Script,
    Shell,
}

/// A path that passed both the permission check and content classification.
/// Collected once during the final scan, never mutated afterward.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutableRecord {
    pub path: PathBuf,
    pub evidence: ExecEvidence,
}

/// Final-pass classifier over the unpacked tree. Independent of the
/// extraction pass; operates on whatever tree currently exists.
pub struct ExecutableScanner<'a> {
    tools: &'a dyn ExternalTools,
}

impl<'a> ExecutableScanner<'a> {
    pub fn new(tools: &'a dyn ExternalTools) -> Self {
        Self { tools }
    }

    /// A file qualifies iff an execute bit is set and its content classifies
    /// as ELF / executable / script / shell. Failing either test is silent
    /// non-membership. Duplicates across overlapping roots are not filtered.
    pub fn scan(&self, roots: &[PathBuf]) -> Vec<ExecutableRecord> {
        let mut records = Vec::new();
        for root in roots {
            if !root.exists() {
                continue;
            }
            for entry in WalkDir::new(root) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(%err, "cannot access path during executable scan");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if !is_executable(path) {
                    continue;
                }
                if let Some(evidence) = self.classify_executable(path) {
                    records.push(ExecutableRecord { path: path.to_path_buf(), evidence });
                }
            }
        }
        records
    }

    /// Native sniff first (ELF magic, shebang), then the same inspection
    /// capability the format classifier falls back to.
    fn classify_executable(&self, path: &Path) -> Option<ExecEvidence> {
        let mut head = [0u8; 4];
        if let Ok(mut file) = File::open(path) {
            if let Ok(n) = file.read(&mut head) {
                if head[..n].starts_with(b"\x7fELF") {
                    return Some(ExecEvidence::Elf);
                }
                if head[..n].starts_with(b"#!") {
                    return Some(ExecEvidence::Script);
                }
            }
        }
        let description = self.tools.describe(path)?.to_lowercase();
        for (needle, evidence) in [
            ("elf", ExecEvidence::Elf),
            ("executable", ExecEvidence::Executable),
            ("script", ExecEvidence::Script),
            ("shell", ExecEvidence::Shell),
        ] {
            if description.contains(needle) {
                return Some(evidence);
            }
        }
        None
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

/// Persist the manifest, one path per line. Falls back to the current working
/// directory when the primary location is unwritable; total failure is
/// reported but the in-memory records remain valid for the caller.
pub fn write_manifest(records: &[ExecutableRecord], out_dir: &Path) -> Option<PathBuf> {
    let primary = out_dir.join(MANIFEST_NAME);
    match write_lines(&primary, records) {
        Ok(()) => {
            info!(path = %primary.display(), "executable list saved");
            return Some(primary);
        }
        Err(err) => {
            warn!(path = %primary.display(), %err, "failed to write executable list, trying current directory");
        }
    }
    let fallback = PathBuf::from(MANIFEST_NAME);
    match write_lines(&fallback, records) {
        Ok(()) => {
            info!(path = %fallback.display(), "executable list saved");
            Some(fallback)
        }
        Err(err) => {
            warn!(%err, "completely failed to save executable list");
            None
        }
    }
}

fn write_lines(path: &Path, records: &[ExecutableRecord]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    for record in records {
        writeln!(file, "{}", record.path.display())?;
    }
    Ok(())
}
