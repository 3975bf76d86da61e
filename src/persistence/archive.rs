//! Directory archives
//!
//! Packs a working directory into a single gzip-compressed tarball and back.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Result, WardenError};

/// Directory <-> archive transform
pub trait ArchiveCodec: Send + Sync {
    /// Pack the contents of `dir` into `archive`, paths relative to `dir`
    fn pack(&self, dir: &Path, archive: &Path) -> Result<()>;

    /// Unpack `archive` into the existing directory `dir`
    fn unpack(&self, archive: &Path, dir: &Path) -> Result<()>;
}

/// Compression level
#[derive(Debug, Clone, Copy)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// Fast compression (lower ratio)
    pub const FAST: Self = Self(1);
    /// Default compression
    pub const DEFAULT: Self = Self(6);
    /// Best compression (slower)
    pub const BEST: Self = Self(9);

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// `.tar.gz` codec
#[derive(Debug, Clone, Default)]
pub struct TarGzCodec {
    level: CompressionLevel,
}

impl TarGzCodec {
    pub fn new(level: CompressionLevel) -> Self {
        Self { level }
    }
}

impl ArchiveCodec for TarGzCodec {
    fn pack(&self, dir: &Path, archive: &Path) -> Result<()> {
        let fail = |reason: String| WardenError::PackFailed {
            dir: dir.to_path_buf(),
            reason,
        };

        let file = File::create(archive)
            .map_err(|e| fail(format!("create {}: {}", archive.display(), e)))?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::new(self.level.value()));
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);
        builder
            .append_dir_all(".", dir)
            .map_err(|e| fail(e.to_string()))?;

        let encoder = builder.into_inner().map_err(|e| fail(e.to_string()))?;
        let mut writer = encoder.finish().map_err(|e| fail(e.to_string()))?;
        std::io::Write::flush(&mut writer).map_err(|e| fail(e.to_string()))?;
        Ok(())
    }

    fn unpack(&self, archive: &Path, dir: &Path) -> Result<()> {
        let fail = |reason: String| WardenError::UnpackFailed {
            archive: archive.to_path_buf(),
            reason,
        };

        let file = File::open(archive).map_err(|e| fail(e.to_string()))?;
        let mut tarball = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        tarball.set_preserve_mtime(true);
        tarball.unpack(dir).map_err(|e| fail(e.to_string()))?;
        Ok(())
    }
}
