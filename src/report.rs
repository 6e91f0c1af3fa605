use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, UnpackError};

/// Why a visited file was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The path is itself extraction output (provenance or marker name).
    ExtractionOutput,
    /// No format rule matched.
    Unrecognized,
    /// The path could not be enumerated or read.
    AccessDenied,
}

/// Typed per-file outcome. Console warnings stay on stderr; this is the
/// structured record of the same events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Extracted { format: &'static str, target: PathBuf },
    Skipped { reason: SkipReason },
    Failed { format: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Ordered record of everything one unpack run did, suitable for programmatic
/// inspection and JSON dumping.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<FileOutcome>,
}

impl RunReport {
    pub fn record_extracted(&mut self, path: &Path, format: &'static str, target: &Path) {
        self.outcomes.push(FileOutcome {
            path: path.to_path_buf(),
            status: FileStatus::Extracted { format, target: target.to_path_buf() },
        });
    }

    pub fn record_skipped(&mut self, path: &Path, reason: SkipReason) {
        self.outcomes.push(FileOutcome {
            path: path.to_path_buf(),
            status: FileStatus::Skipped { reason },
        });
    }

    pub fn record_failed<S: Into<String>>(&mut self, path: &Path, format: &'static str, reason: S) {
        self.outcomes.push(FileOutcome {
            path: path.to_path_buf(),
            status: FileStatus::Failed { format, reason: reason.into() },
        });
    }

    pub fn extracted_count(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Extracted { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| UnpackError::serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_reflect_recorded_outcomes() {
        let mut report = RunReport::default();
        report.record_extracted(Path::new("a.gz"), "gzip", Path::new("a"));
        report.record_skipped(Path::new("b.txt"), SkipReason::Unrecognized);
        report.record_failed(Path::new("c.sqfs"), "squashfs", "all tools failed");

        assert_eq!(report.extracted_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.outcomes.len(), 3);
    }

    #[test]
    fn report_serializes_with_status_tags() {
        let mut report = RunReport::default();
        report.record_extracted(Path::new("a.gz"), "gzip", Path::new("a"));
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"extracted\""));
        assert!(json.contains("\"format\":\"gzip\""));
    }
}
