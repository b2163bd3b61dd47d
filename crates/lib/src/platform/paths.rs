//! Default locations for runkit state and caches.
//!
//! These are only consulted when the corresponding `RUNKIT_*` override is not
//! set; see [`crate::config::Config`].

use crate::consts::APP_NAME;
use std::path::PathBuf;

fn env_path(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  env_path("USERPROFILE")
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  env_path("HOME")
}

/// Returns the directory for persistent state (manifest, bin, runtimes)
#[cfg(windows)]
pub fn data_dir() -> Option<PathBuf> {
  env_path("APPDATA").map(|p| p.join(APP_NAME))
}

/// Returns the directory for persistent state (manifest, bin, runtimes)
#[cfg(not(windows))]
pub fn data_dir() -> Option<PathBuf> {
  let data_home = env_path("XDG_DATA_HOME").or_else(|| home_dir().map(|h| h.join(".local").join("share")))?;
  Some(data_home.join(APP_NAME))
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> Option<PathBuf> {
  env_path("LOCALAPPDATA").map(|p| p.join(APP_NAME).join("Cache"))
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> Option<PathBuf> {
  let cache_home = env_path("XDG_CACHE_HOME").or_else(|| home_dir().map(|h| h.join(".cache")))?;
  Some(cache_home.join(APP_NAME))
}
