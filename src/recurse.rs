use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::detect;
use crate::extract::{Extractor, Outcome};
use crate::report::{RunReport, SkipReason};
use crate::tools::ExternalTools;

pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Name markers carried by paths that are themselves extraction output.
/// Matched against the path relative to the current walk root, so walking a
/// produced directory still processes its contents while ancestor walks
/// never reprocess them.
pub const MARKER_SUFFIXES: &[&str] = &["_squashfs", "_jffs2", "_cpio", ".extracted"];

/// Depth-bounded recursive extraction over a directory tree.
///
/// Owns all traversal state for one run: the depth at which each node is
/// discovered, the provenance set of dispatch products, the visited set, and
/// the run report. Single-threaded; each file is classified, dispatched, and
/// (if something was produced) recursed into before the next is considered.
pub struct Unpacker<'a> {
    tools: &'a dyn ExternalTools,
    extractor: Extractor<'a>,
    max_depth: usize,
    produced: HashSet<PathBuf>,
    seen: HashSet<PathBuf>,
    report: RunReport,
}

impl<'a> Unpacker<'a> {
    pub fn new(tools: &'a dyn ExternalTools, max_depth: usize) -> Self {
        Self {
            tools,
            extractor: Extractor::new(tools),
            max_depth,
            produced: HashSet::new(),
            seen: HashSet::new(),
            report: RunReport::default(),
        }
    }

    /// Walk a root and extract everything recognizable, recursing into
    /// extraction output up to the depth bound. Returns whether any new
    /// content was produced.
    pub fn run(&mut self, root: &Path) -> bool {
        debug!(root = %root.display(), "searching for nested file systems");
        self.walk(root, 0)
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }

    fn walk(&mut self, dir: &Path, depth: usize) -> bool {
        if depth >= self.max_depth {
            debug!(dir = %dir.display(), depth, "depth bound reached");
            return false;
        }

        // Snapshot the file list up front: extraction mutates the tree under
        // us, and newly produced content is handled by the explicit recursion
        // below, not by re-enumeration.
        let mut files = Vec::new();
        for entry in WalkDir::new(dir) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(err) => {
                    warn!(%err, "cannot access path, skipping");
                    if let Some(path) = err.path() {
                        self.report.record_skipped(path, SkipReason::AccessDenied);
                    }
                }
            }
        }

        let mut produced_any = false;
        for path in files {
            if !self.seen.insert(path.clone()) {
                // Already handled earlier in this run, never backtrack.
                continue;
            }
            if self.is_extraction_output(dir, &path) {
                self.report.record_skipped(&path, SkipReason::ExtractionOutput);
                continue;
            }
            if self.visit(&path, depth) {
                produced_any = true;
            }
        }
        produced_any
    }

    /// Classify and dispatch one file, then recurse into whatever it
    /// produced at depth + 1. Every dispatch error is absorbed here.
    fn visit(&mut self, path: &Path, depth: usize) -> bool {
        if depth >= self.max_depth {
            return false;
        }
        let signature = detect::classify(path, self.tools);
        if !signature.is_known() {
            self.report.record_skipped(path, SkipReason::Unrecognized);
            return false;
        }
        debug!(path = %path.display(), format = signature.name(), "dispatching extraction");
        match self.extractor.dispatch(path, signature) {
            Ok(Outcome::File(target)) => {
                self.report.record_extracted(path, signature.name(), &target);
                self.produced.insert(target.clone());
                self.seen.insert(target.clone());
                self.visit(&target, depth + 1);
                true
            }
            Ok(Outcome::Directory(target)) => {
                self.report.record_extracted(path, signature.name(), &target);
                self.produced.insert(target.clone());
                self.walk(&target, depth + 1);
                true
            }
            Ok(Outcome::None) => {
                self.report.record_skipped(path, SkipReason::Unrecognized);
                false
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "extraction failed");
                self.report.record_failed(path, signature.name(), err.to_string());
                false
            }
        }
    }

    /// Cycle guard: a node produced by dispatch (checked by identity) or
    /// named with a marker suffix is never reclassified or re-extracted.
    fn is_extraction_output(&self, root: &Path, path: &Path) -> bool {
        if self.produced.contains(path) {
            return true;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        let name = relative.to_string_lossy();
        MARKER_SUFFIXES.iter().any(|marker| name.contains(marker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, UnpackError};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::cell::RefCell;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    struct NullTools;

    impl ExternalTools for NullTools {
        fn describe(&self, _path: &Path) -> Option<String> {
            None
        }
        fn unsquashfs(&self, _image: &Path, _dest: &Path) -> Result<()> {
            Err(UnpackError::tool_invocation("unsquashfs", "unavailable"))
        }
        fn sasquatch(&self, _image: &Path, _dest: &Path) -> Result<()> {
            Err(UnpackError::tool_invocation("sasquatch", "unavailable"))
        }
        fn jefferson(&self, _image: &Path, _dest: &Path) -> Result<()> {
            Err(UnpackError::tool_invocation("jefferson", "unavailable"))
        }
        fn cpio_extract(&self, _archive: &Path, _workdir: &Path) -> Result<()> {
            Err(UnpackError::tool_invocation("cpio", "unavailable"))
        }
    }

    /// Counts describe calls per path so tests can assert nothing is
    /// classified twice.
    struct CountingTools {
        described: RefCell<Vec<PathBuf>>,
    }

    impl CountingTools {
        fn new() -> Self {
            Self { described: RefCell::new(Vec::new()) }
        }
    }

    impl ExternalTools for CountingTools {
        fn describe(&self, path: &Path) -> Option<String> {
            self.described.borrow_mut().push(path.to_path_buf());
            None
        }
        fn unsquashfs(&self, _image: &Path, _dest: &Path) -> Result<()> {
            Err(UnpackError::tool_invocation("unsquashfs", "unavailable"))
        }
        fn sasquatch(&self, _image: &Path, _dest: &Path) -> Result<()> {
            Err(UnpackError::tool_invocation("sasquatch", "unavailable"))
        }
        fn jefferson(&self, _image: &Path, _dest: &Path) -> Result<()> {
            Err(UnpackError::tool_invocation("jefferson", "unavailable"))
        }
        fn cpio_extract(&self, _archive: &Path, _workdir: &Path) -> Result<()> {
            Err(UnpackError::tool_invocation("cpio", "unavailable"))
        }
    }

    fn gzip_bytes(payload: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn extracts_gzip_and_reports_it() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("b.gz"), gzip_bytes(b"hello")).unwrap();
        fs::write(root.path().join("plain.txt"), b"text").unwrap();

        let mut unpacker = Unpacker::new(&NullTools, DEFAULT_MAX_DEPTH);
        assert!(unpacker.run(root.path()));

        assert_eq!(fs::read(root.path().join("b")).unwrap(), b"hello");
        let report = unpacker.report();
        assert_eq!(report.extracted_count(), 1);
        // plain.txt and the produced file `b` are both terminal.
        assert_eq!(report.skipped_count(), 2);
    }

    #[test]
    fn marker_named_paths_are_never_reextracted() {
        let root = TempDir::new().unwrap();
        let marked = root.path().join("rootfs_squashfs");
        fs::create_dir(&marked).unwrap();
        fs::write(marked.join("inner.gz"), gzip_bytes(b"nested")).unwrap();

        let mut unpacker = Unpacker::new(&NullTools, DEFAULT_MAX_DEPTH);
        assert!(!unpacker.run(root.path()));

        assert!(!marked.join("inner").exists());
        assert_eq!(unpacker.report().extracted_count(), 0);
    }

    #[test]
    fn recursion_stops_at_depth_bound() {
        let root = TempDir::new().unwrap();
        // Five nested gzip layers, bound of two: only two may be peeled.
        let mut payload = b"core".to_vec();
        for _ in 0..5 {
            payload = gzip_bytes(&payload);
        }
        fs::write(root.path().join("onion.gz.gz.gz.gz.gz"), payload).unwrap();

        let mut unpacker = Unpacker::new(&NullTools, 2);
        assert!(unpacker.run(root.path()));

        assert!(root.path().join("onion.gz.gz.gz.gz").exists());
        assert!(!root.path().join("onion.gz.gz").exists());
        assert_eq!(unpacker.report().extracted_count(), 2);
    }

    #[test]
    fn tar_members_are_visited_but_siblings_only_once() {
        let root = TempDir::new().unwrap();
        let tar_path = root.path().join("bundle.tar");
        let mut builder = tar::Builder::new(File::create(&tar_path).unwrap());
        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "member.txt", &b"data"[..])
            .unwrap();
        builder.finish().unwrap();
        drop(builder);
        fs::write(root.path().join("plain.txt"), b"text").unwrap();

        let tools = CountingTools::new();
        let mut unpacker = Unpacker::new(&tools, DEFAULT_MAX_DEPTH);
        assert!(unpacker.run(root.path()));

        assert!(root.path().join("member.txt").exists());
        // The tar outcome re-walks the enclosing directory; plain.txt must
        // still be inspected exactly once.
        let described = tools.described.borrow();
        let plain = root.path().join("plain.txt");
        assert_eq!(described.iter().filter(|p| **p == plain).count(), 1);
    }

    #[test]
    fn failed_extraction_is_absorbed_and_recorded() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("rootfs.sqfs"), b"hsqs....").unwrap();

        let mut unpacker = Unpacker::new(&NullTools, DEFAULT_MAX_DEPTH);
        assert!(!unpacker.run(root.path()));

        assert_eq!(unpacker.report().failed_count(), 1);
        // The namespaced directory exists but holds nothing extractable.
        assert!(root.path().join("rootfs_squashfs").is_dir());
    }
}
