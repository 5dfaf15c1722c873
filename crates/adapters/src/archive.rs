// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive codec: a directory tree to one compressed tar file and back.
//!
//! The archive holds a single top-level directory named after the source
//! directory, so `decompress` reproduces `<dest>/<name>/...`.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive io error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot archive {0}: not a named directory")]
    InvalidSource(PathBuf),
    #[error("unrecognized archive extension: {0}")]
    UnknownFormat(PathBuf),
    #[error("refusing to extract unsafe member path: {0}")]
    UnsafePath(PathBuf),
}

/// Compression applied to the tar stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiveFormat {
    #[default]
    Gzip,
    Zstd,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Gzip => "tar.gz",
            ArchiveFormat::Zstd => "tar.zst",
        }
    }

    /// File name of the artifact for `stem`, e.g. `full-x.tar.gz`.
    pub fn artifact_name(self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension())
    }

    /// Detect the format from a file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::Gzip)
        } else if name.ends_with(".tar.zst") {
            Some(ArchiveFormat::Zstd)
        } else {
            None
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gz" | "gzip" => Ok(ArchiveFormat::Gzip),
            "zst" | "zstd" => Ok(ArchiveFormat::Zstd),
            other => Err(format!("unknown archive format '{other}' (expected 'gz' or 'zst')")),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Pack `src` into the archive file `dest`. Returns the archive size.
pub fn compress_dir(src: &Path, dest: &Path, format: ArchiveFormat) -> Result<u64, ArchiveError> {
    let name = src
        .file_name()
        .filter(|_| src.is_dir())
        .ok_or_else(|| ArchiveError::InvalidSource(src.to_path_buf()))?;
    let out = BufWriter::new(File::create(dest)?);

    match format {
        ArchiveFormat::Gzip => {
            let mut builder = tar::Builder::new(GzEncoder::new(out, Compression::default()));
            builder.append_dir_all(name, src)?;
            builder.into_inner()?.finish()?.flush()?;
        }
        ArchiveFormat::Zstd => {
            let mut builder = tar::Builder::new(zstd::Encoder::new(out, ZSTD_LEVEL)?);
            builder.append_dir_all(name, src)?;
            builder.into_inner()?.finish()?.flush()?;
        }
    }

    let size = std::fs::metadata(dest)?.len();
    tracing::debug!(src = %src.display(), dest = %dest.display(), size, %format, "archive written");
    Ok(size)
}

/// Unpack `archive` into `dest`, choosing the codec from the extension.
///
/// Returns the extracted top-level directory, or `dest` itself when the
/// archive has no single root.
pub fn decompress(archive: &Path, dest: &Path) -> Result<PathBuf, ArchiveError> {
    let format = ArchiveFormat::from_path(archive)
        .ok_or_else(|| ArchiveError::UnknownFormat(archive.to_path_buf()))?;
    let file = BufReader::new(File::open(archive)?);
    let root = match format {
        ArchiveFormat::Gzip => unpack(GzDecoder::new(file), dest)?,
        ArchiveFormat::Zstd => unpack(zstd::Decoder::with_buffer(file)?, dest)?,
    };
    tracing::debug!(archive = %archive.display(), dest = %root.display(), "archive extracted");
    Ok(root)
}

fn unpack(reader: impl Read, dest: &Path) -> Result<PathBuf, ArchiveError> {
    std::fs::create_dir_all(dest)?;
    let mut archive = tar::Archive::new(reader);
    let mut roots: BTreeSet<OsString> = BTreeSet::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        check_member(&path)?;
        if let Some(Component::Normal(first)) = path.components().next() {
            roots.insert(first.to_os_string());
        }
        entry.unpack_in(dest)?;
    }

    match roots.len() {
        1 => Ok(roots.iter().next().map(|r| dest.join(r)).unwrap_or_else(|| dest.to_path_buf())),
        _ => Ok(dest.to_path_buf()),
    }
}

fn check_member(path: &Path) -> Result<(), ArchiveError> {
    let escapes = path.has_root()
        || path.components().any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(ArchiveError::UnsafePath(path.to_path_buf()));
    }
    Ok(())
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
