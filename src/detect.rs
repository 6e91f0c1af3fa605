use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::tools::ExternalTools;

/// Nested formats the pipeline knows how to extract. Derived purely from
/// content inspection of a single file; stateless, recomputed each visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSignature {
    Gzip,
    Tar,
    Squashfs,
    Jffs2,
    Cpio,
    Unknown,
}

impl FormatSignature {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Tar => "tar",
            Self::Squashfs => "squashfs",
            Self::Jffs2 => "jffs2",
            Self::Cpio => "cpio",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

// The ustar magic sits at offset 257; sniff enough to cover it.
const SNIFF_LEN: u64 = 512;

/// Substring rules applied to the inspection helper's description when no
/// magic predicate matched. First match wins; gzip-specific rules precede
/// generic archive rules so a "gzip compressed tar archive" routes to gzip.
const TEXT_RULES: &[(&str, FormatSignature)] = &[
    (".gz", FormatSignature::Gzip),
    ("gzip", FormatSignature::Gzip),
    ("squashfs", FormatSignature::Squashfs),
    ("jffs2", FormatSignature::Jffs2),
    ("cpio", FormatSignature::Cpio),
    (".tar", FormatSignature::Tar),
    ("tar archive", FormatSignature::Tar),
];

/// Classify a file's format. Magic-byte predicates run first in a fixed
/// priority order; the textual classifier over `describe` output is the
/// fallback. Never errors: unreadable files and unavailable inspection both
/// yield `Unknown`.
pub fn classify(path: &Path, tools: &dyn ExternalTools) -> FormatSignature {
    if let Some(signature) = sniff_magic(path) {
        return signature;
    }
    classify_description(tools.describe(path))
}

/// Priority order: most specific magic first. Tar goes last because its magic
/// sits at offset 257 and pre-POSIX tar has none at all (the textual fallback
/// catches those).
fn sniff_magic(path: &Path) -> Option<FormatSignature> {
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    File::open(path)
        .ok()?
        .take(SNIFF_LEN)
        .read_to_end(&mut head)
        .ok()?;

    if head.starts_with(&[0x1f, 0x8b]) {
        return Some(FormatSignature::Gzip);
    }
    if head.starts_with(b"hsqs") || head.starts_with(b"sqsh") {
        return Some(FormatSignature::Squashfs);
    }
    if head.starts_with(&[0x85, 0x19]) || head.starts_with(&[0x19, 0x85]) {
        return Some(FormatSignature::Jffs2);
    }
    if head.starts_with(b"070701") || head.starts_with(b"070702") || head.starts_with(b"070707") {
        return Some(FormatSignature::Cpio);
    }
    if head.starts_with(&[0xc7, 0x71]) || head.starts_with(&[0x71, 0xc7]) {
        return Some(FormatSignature::Cpio);
    }
    if head.len() >= 262 && &head[257..262] == b"ustar" {
        return Some(FormatSignature::Tar);
    }
    None
}

fn classify_description(description: Option<String>) -> FormatSignature {
    let Some(description) = description else {
        return FormatSignature::Unknown;
    };
    let description = description.to_lowercase();
    for (needle, signature) in TEXT_RULES {
        if description.contains(needle) {
            return *signature;
        }
    }
    FormatSignature::Unknown
}
