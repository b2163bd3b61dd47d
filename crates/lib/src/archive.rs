//! Archive extraction.
//!
//! Supports:
//! - `.tar.gz` / `.tgz`
//! - `.tar`
//! - `.zip`
//!
//! Entries are extracted with their full relative paths; entries that would
//! land outside the destination are rejected.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("unsupported archive format: {0}")]
  Unsupported(PathBuf),

  #[error("failed to extract {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read zip archive {path}: {source}")]
  Zip {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("archive {path} contains an entry escaping the destination: {entry}")]
  UnsafeEntry { path: PathBuf, entry: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  TarGz,
  Tar,
  Zip,
}

impl ArchiveFormat {
  /// Detect the format from a file name.
  pub fn detect(path: &Path) -> Option<Self> {
    let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
      Some(Self::TarGz)
    } else if name.ends_with(".tar") {
      Some(Self::Tar)
    } else if name.ends_with(".zip") {
      Some(Self::Zip)
    } else {
      None
    }
  }
}

/// Whether `path` names an archive this module can unpack.
pub fn is_archive(path: &Path) -> bool {
  ArchiveFormat::detect(path).is_some()
}

/// Unpack an archive into `dest`, creating it if needed.
pub fn unpack_archive(archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
  let format = ArchiveFormat::detect(archive_path).ok_or_else(|| ArchiveError::Unsupported(archive_path.to_path_buf()))?;
  let io_err = |source| ArchiveError::Io {
    path: archive_path.to_path_buf(),
    source,
  };

  fs::create_dir_all(dest).map_err(io_err)?;
  debug!(archive = %archive_path.display(), dest = %dest.display(), ?format, "unpacking");

  match format {
    ArchiveFormat::TarGz => {
      let file = File::open(archive_path).map_err(io_err)?;
      unpack_tar(Archive::new(GzDecoder::new(BufReader::new(file))), archive_path, dest)?
    }
    ArchiveFormat::Tar => {
      let file = File::open(archive_path).map_err(io_err)?;
      unpack_tar(Archive::new(BufReader::new(file)), archive_path, dest)?
    }
    ArchiveFormat::Zip => unpack_zip(archive_path, dest)?,
  }

  info!(archive = %archive_path.display(), dest = %dest.display(), "unpacked archive");
  Ok(())
}

fn unpack_tar<R: io::Read>(mut archive: Archive<R>, archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
  let io_err = |source| ArchiveError::Io {
    path: archive_path.to_path_buf(),
    source,
  };

  archive.set_preserve_permissions(true);
  for entry in archive.entries().map_err(io_err)? {
    let mut entry = entry.map_err(io_err)?;
    let entry_path = entry.path().map_err(io_err)?.display().to_string();

    // unpack_in refuses entries with `..` or absolute paths
    if !entry.unpack_in(dest).map_err(io_err)? {
      return Err(ArchiveError::UnsafeEntry {
        path: archive_path.to_path_buf(),
        entry: entry_path,
      });
    }
  }

  Ok(())
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
  let io_err = |source| ArchiveError::Io {
    path: archive_path.to_path_buf(),
    source,
  };
  let zip_err = |source| ArchiveError::Zip {
    path: archive_path.to_path_buf(),
    source,
  };

  let file = File::open(archive_path).map_err(io_err)?;
  let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;

  for i in 0..archive.len() {
    let mut file = archive.by_index(i).map_err(zip_err)?;

    let relative = file.enclosed_name().ok_or_else(|| ArchiveError::UnsafeEntry {
      path: archive_path.to_path_buf(),
      entry: file.name().to_string(),
    })?;
    let dest_path = dest.join(relative);

    if file.is_dir() {
      fs::create_dir_all(&dest_path).map_err(io_err)?;
      continue;
    }

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut outfile = File::create(&dest_path).map_err(io_err)?;
    io::copy(&mut file, &mut outfile).map_err(io_err)?;

    // Set executable bit on Unix if needed
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      if let Some(mode) = file.unix_mode() {
        fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode)).map_err(io_err)?;
      }
    }
  }

  Ok(())
}
