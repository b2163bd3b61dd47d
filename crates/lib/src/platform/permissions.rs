//! File permission handling for placed kernels.
//!
//! ## Platform Behavior
//!
//! - **Unix**: placed kernels get mode 0755
//! - **macOS**: additionally drops the `com.apple.quarantine` attribute that
//!   marks a file as downloaded and not yet vetted
//! - **Windows**: nothing to do; executability follows the extension

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
  #[error("failed to set permissions on {path}: {source}")]
  SetPermissions {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to clear quarantine attribute on {path}: {source}")]
  TrustMarker {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Mark a file as executable by everyone and writable by the owner.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> Result<(), PermissionError> {
  use std::os::unix::fs::PermissionsExt;

  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
    PermissionError::SetPermissions {
      path: path.display().to_string(),
      source: e,
    }
  })
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> Result<(), PermissionError> {
  Ok(())
}

/// Remove the macOS "downloaded, untrusted" marker from a file.
///
/// A file that never carried the attribute is not an error.
#[cfg(target_os = "macos")]
pub fn clear_trust_marker(path: &Path) -> Result<(), PermissionError> {
  use std::ffi::CString;
  use std::os::unix::ffi::OsStrExt;

  let to_err = |source: std::io::Error| PermissionError::TrustMarker {
    path: path.display().to_string(),
    source,
  };

  let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|e| to_err(std::io::Error::other(e)))?;
  let name = c"com.apple.quarantine";

  // SAFETY: both pointers come from live, NUL-terminated CStrings.
  let rc = unsafe { libc::removexattr(cpath.as_ptr(), name.as_ptr(), 0) };
  if rc == 0 {
    return Ok(());
  }

  let err = std::io::Error::last_os_error();
  if err.raw_os_error() == Some(libc::ENOATTR) {
    return Ok(());
  }
  Err(to_err(err))
}

#[cfg(not(target_os = "macos"))]
pub fn clear_trust_marker(_path: &Path) -> Result<(), PermissionError> {
  Ok(())
}
