//! Directory packing for transport.
//!
//! Archives are uncompressed ustar streams. Entries are walked in file-name
//! order and written with [`tar::HeaderMode::Deterministic`], so the same
//! tree always yields the same bytes. Paths inside the archive are relative
//! to the packed directory itself.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tar::{Archive, Builder, HeaderMode};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Archive entry escapes destination: {0}")]
    UnsafeEntry(PathBuf),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Summary of an unpacked archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    pub files: usize,
    pub bytes: u64,
}

/// Pack `src_dir` into a tar file at `dest`, returning the archive length.
///
/// Symlinks and special files are skipped.
pub fn pack_directory(src_dir: &Path, dest: &Path) -> Result<u64, ArchiveError> {
    if !src_dir.is_dir() {
        return Err(ArchiveError::NotADirectory(src_dir.to_path_buf()));
    }

    let mut builder = Builder::new(BufWriter::new(File::create(dest)?));
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    for entry in WalkDir::new(src_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|_| ArchiveError::UnsafeEntry(entry.path().to_path_buf()))?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            builder.append_dir(rel, entry.path())?;
        } else if file_type.is_file() {
            builder.append_path_with_name(entry.path(), rel)?;
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }

    let mut writer = builder.into_inner()?;
    writer.flush()?;
    drop(writer);

    Ok(std::fs::metadata(dest)?.len())
}

/// Unpack the tar file at `archive` into `dest_dir`, creating it if needed.
///
/// Any entry that would land outside `dest_dir` aborts the unpack.
pub fn unpack_archive(archive: &Path, dest_dir: &Path) -> Result<UnpackSummary, ArchiveError> {
    std::fs::create_dir_all(dest_dir)?;

    let mut archive = Archive::new(BufReader::new(File::open(archive)?));
    archive.set_preserve_permissions(false);
    archive.set_overwrite(true);

    let mut summary = UnpackSummary::default();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if !(entry_type.is_file() || entry_type.is_dir()) {
            debug!(entry_type = ?entry_type, "skipping non-regular archive entry");
            continue;
        }

        let path = entry.path()?.into_owned();
        if !entry.unpack_in(dest_dir)? {
            return Err(ArchiveError::UnsafeEntry(path));
        }
        if entry_type.is_file() {
            summary.files += 1;
            summary.bytes += entry.size();
        }
    }

    Ok(summary)
}
