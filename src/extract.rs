use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, info, warn};

use crate::detect::FormatSignature;
use crate::error::{Result, UnpackError};
use crate::tools::ExternalTools;

/// What a dispatch produced. An extraction either fully succeeds or is
/// abandoned; there is no partial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was extracted (Unknown signature).
    None,
    /// A single file was produced (gzip).
    File(PathBuf),
    /// A directory now holds the extracted content.
    Directory(PathBuf),
}

impl Outcome {
    pub fn target(&self) -> Option<&Path> {
        match self {
            Self::None => None,
            Self::File(path) | Self::Directory(path) => Some(path),
        }
    }

    pub fn produced(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Per-format extraction dispatch. Side effects are confined to filesystem
/// creation under the source file's parent directory; nothing is deleted and
/// the only retry is the squashfs tool-candidate list.
pub struct Extractor<'a> {
    tools: &'a dyn ExternalTools,
}

impl<'a> Extractor<'a> {
    pub fn new(tools: &'a dyn ExternalTools) -> Self {
        Self { tools }
    }

    /// Route a classified file to its extraction strategy. Errors are typed
    /// so the caller can record them; the recursion controller downgrades
    /// every one of them to a no-op plus a warning.
    pub fn dispatch(&self, path: &Path, signature: FormatSignature) -> Result<Outcome> {
        match signature {
            FormatSignature::Gzip => self.extract_gzip(path),
            FormatSignature::Tar => self.extract_tar(path),
            FormatSignature::Squashfs => self.extract_squashfs(path),
            FormatSignature::Jffs2 => self.extract_jffs2(path),
            FormatSignature::Cpio => self.extract_cpio(path),
            FormatSignature::Unknown => Ok(Outcome::None),
        }
    }

    /// Decompress in place to a sibling path with the compression suffix
    /// stripped.
    fn extract_gzip(&self, path: &Path) -> Result<Outcome> {
        let mut target = path.with_extension("");
        if target == path {
            // Extensionless gzip: keep the source intact.
            target = path.with_extension("out");
        }
        debug!(path = %path.display(), "extracting gzip");
        let mut decoder = GzDecoder::new(File::open(path)?);
        let mut output = File::create(&target)?;
        io::copy(&mut decoder, &mut output)?;
        Ok(Outcome::File(target))
    }

    /// Extract all members into the enclosing directory.
    fn extract_tar(&self, path: &Path) -> Result<Outcome> {
        let parent = enclosing_dir(path)?;
        debug!(path = %path.display(), "extracting tar");
        let mut archive = tar::Archive::new(File::open(path)?);
        archive.unpack(&parent)?;
        Ok(Outcome::Directory(parent))
    }

    /// Try the candidate tools in preference order; first success wins. The
    /// namespaced output directory is created before any tool is invoked.
    fn extract_squashfs(&self, path: &Path) -> Result<Outcome> {
        let dest = namespaced_dir(path, "squashfs")?;
        match self.tools.unsquashfs(path, &dest) {
            Ok(()) => {
                info!(path = %path.display(), "extracted with unsquashfs");
                return Ok(Outcome::Directory(dest));
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "unsquashfs failed, trying next method");
            }
        }
        match self.tools.sasquatch(path, &dest) {
            Ok(()) => {
                info!(path = %path.display(), "extracted with sasquatch");
                Ok(Outcome::Directory(dest))
            }
            Err(err) => Err(UnpackError::extraction(
                path,
                format!("all squashfs tools failed, last error: {err}"),
            )),
        }
    }

    fn extract_jffs2(&self, path: &Path) -> Result<Outcome> {
        let dest = namespaced_dir(path, "jffs2")?;
        self.tools.jefferson(path, &dest)?;
        Ok(Outcome::Directory(dest))
    }

    fn extract_cpio(&self, path: &Path) -> Result<Outcome> {
        let workdir = namespaced_dir(path, "cpio")?;
        self.tools.cpio_extract(path, &workdir)?;
        Ok(Outcome::Directory(workdir))
    }
}

fn enclosing_dir(path: &Path) -> Result<PathBuf> {
    path.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| UnpackError::invalid_path(path, "no enclosing directory"))
}

/// `<stem>_<format>` beside the source file, created up front.
fn namespaced_dir(path: &Path, format_tag: &str) -> Result<PathBuf> {
    let parent = enclosing_dir(path)?;
    let stem = path
        .file_stem()
        .ok_or_else(|| UnpackError::invalid_path(path, "no file stem"))?;
    let dir = parent.join(format!("{}_{}", stem.to_string_lossy(), format_tag));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
