//! Library-level pipeline tests over a seeded carving tree. binwalk itself is
//! an external collaborator, so these tests start where it leaves off: a root
//! directory holding carved content.

#![cfg(unix)]

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

use fwunpack::{scan, ExecEvidence, ExecutableScanner, SystemTools, Unpacker};

fn gzip_bytes(payload: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

fn tar_bytes(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder.append_data(&mut header, *name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

/// A gzip-compressed tar holding one ELF binary must end up as exactly one
/// manifest line pointing at the ELF's final nested path.
#[test]
fn gzipped_tar_with_elf_yields_single_manifest_line() {
    let root = TempDir::new().unwrap();
    let elf: &[u8] = b"\x7fELF\x01\x01\x01\x00fake-machine-code";
    let tar = tar_bytes(&[
        ("bin/busybox", elf, 0o755),
        ("etc/config", b"option=1\n", 0o644),
    ]);
    fs::write(root.path().join("rootfs.tar.gz"), gzip_bytes(&tar)).unwrap();

    let tools = SystemTools;
    let mut unpacker = Unpacker::new(&tools, 5);
    assert!(unpacker.run(root.path()));
    assert!(root.path().join("bin/busybox").exists());

    let scanner = ExecutableScanner::new(&tools);
    let records = scanner.scan(&[root.path().to_path_buf()]);
    assert_eq!(records.len(), 1);
    assert!(records[0].path.ends_with("bin/busybox"));
    assert_eq!(records[0].evidence, ExecEvidence::Elf);

    let manifest = scan::write_manifest(&records, root.path()).unwrap();
    let contents = fs::read_to_string(manifest).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("bin/busybox"));
}

/// With nothing recognizable, the extraction pass produces nothing and the
/// manifest holds only pre-existing files that satisfy the predicate.
#[test]
fn tree_without_nested_formats_yields_empty_manifest() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.txt"), b"nothing nested\n").unwrap();

    let tools = SystemTools;
    let mut unpacker = Unpacker::new(&tools, 5);
    assert!(!unpacker.run(root.path()));

    let records = ExecutableScanner::new(&tools).scan(&[root.path().to_path_buf()]);
    assert!(records.is_empty());

    let manifest = scan::write_manifest(&records, root.path()).unwrap();
    assert_eq!(fs::read_to_string(manifest).unwrap(), "");
}

/// The scan pass runs over whatever tree exists, even when extraction failed
/// partway: an unextractable squashfs must not stop the executable inventory.
#[test]
fn scan_runs_after_partially_failed_extraction() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("rootfs.sqfs"), b"hsqs-not-really-valid").unwrap();

    let script = root.path().join("recover.sh");
    fs::write(&script, b"#!/bin/sh\necho recover\n").unwrap();
    set_exec(&script);

    let tools = SystemTools;
    let mut unpacker = Unpacker::new(&tools, 5);
    unpacker.run(root.path());

    let records = ExecutableScanner::new(&tools).scan(&[root.path().to_path_buf()]);
    assert_eq!(records.len(), 1);
    assert!(records[0].path.ends_with("recover.sh"));
}

/// Extraction output discovered at depth 1 is itself unpacked: a tar inside a
/// gzip inside the root.
#[test]
fn nested_outputs_are_recursed_into() {
    let root = TempDir::new().unwrap();
    let inner_tar = tar_bytes(&[("nested/readme", b"hi", 0o644)]);
    fs::write(root.path().join("layer.tar.gz"), gzip_bytes(&inner_tar)).unwrap();

    let tools = SystemTools;
    let mut unpacker = Unpacker::new(&tools, 5);
    assert!(unpacker.run(root.path()));

    // gzip peeled at depth 0, tar unpacked at depth 1.
    assert!(root.path().join("layer.tar").exists());
    assert!(root.path().join("nested/readme").exists());
    assert!(unpacker.report().extracted_count() >= 2);
}

fn set_exec(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = File::open(path).unwrap().metadata().unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}
