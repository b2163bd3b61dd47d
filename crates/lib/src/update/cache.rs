//! Update bookkeeping records kept in the cache directory.
//!
//! - `self-update.json`: last tool update check
//! - `kernel-updates.json`: last update check per kernel
//! - `version.json`: last upstream tool version seen
//!
//! All three are optional; a missing or corrupt record reads as its default,
//! which makes the next check due immediately.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::fs::{read_json_lenient, write_json_atomic};

const SELF_UPDATE_FILE: &str = "self-update.json";
const KERNEL_UPDATES_FILE: &str = "kernel-updates.json";
const VERSION_FILE: &str = "version.json";

/// Whether a check last run at `last_check` is due again at `now`.
pub fn is_due(last_check: u64, now: u64, interval: Duration) -> bool {
  now.saturating_sub(last_check) >= interval.as_secs()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfUpdateCache {
  #[serde(default)]
  pub version: Option<String>,
  #[serde(default)]
  pub last_check: u64,
}

impl SelfUpdateCache {
  pub fn path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(SELF_UPDATE_FILE)
  }

  pub fn load(cache_dir: &Path) -> Self {
    read_json_lenient(&Self::path(cache_dir)).unwrap_or_default()
  }

  pub fn save(&self, cache_dir: &Path) -> io::Result<()> {
    write_json_atomic(&Self::path(cache_dir), self)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelCheck {
  #[serde(default)]
  pub version: Option<String>,
  #[serde(default)]
  pub last_check: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelUpdateCache {
  #[serde(default)]
  pub kernels: BTreeMap<String, KernelCheck>,
}

impl KernelUpdateCache {
  pub fn path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(KERNEL_UPDATES_FILE)
  }

  pub fn load(cache_dir: &Path) -> Self {
    read_json_lenient(&Self::path(cache_dir)).unwrap_or_default()
  }

  pub fn save(&self, cache_dir: &Path) -> io::Result<()> {
    write_json_atomic(&Self::path(cache_dir), self)
  }

  pub fn last_check(&self, id: &str) -> u64 {
    self.kernels.get(id).map(|k| k.last_check).unwrap_or(0)
  }

  pub fn record(&mut self, id: &str, version: Option<String>, now: u64) {
    self.kernels.insert(
      id.to_string(),
      KernelCheck {
        version,
        last_check: now,
      },
    );
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCache {
  pub version: String,
  /// Repository the version was read from.
  pub source: String,
  pub fetched_at: u64,
}

impl VersionCache {
  pub fn path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(VERSION_FILE)
  }

  pub fn load(cache_dir: &Path) -> Option<Self> {
    read_json_lenient(&Self::path(cache_dir))
  }

  pub fn save(&self, cache_dir: &Path) -> io::Result<()> {
    write_json_atomic(&Self::path(cache_dir), self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn due_after_interval_elapses() {
    let day = Duration::from_secs(86_400);
    assert!(is_due(0, 1_700_000_000, day));
    assert!(!is_due(1_700_000_000, 1_700_000_100, day));
    assert!(is_due(1_700_000_000, 1_700_086_400, day));
    // Clock went backwards: not due
    assert!(!is_due(1_700_000_000, 1_600_000_000, day));
  }

  #[test]
  fn missing_and_corrupt_records_read_as_default() {
    let temp = TempDir::new().unwrap();
    assert_eq!(SelfUpdateCache::load(temp.path()), SelfUpdateCache::default());

    std::fs::write(KernelUpdateCache::path(temp.path()), "not json").unwrap();
    assert_eq!(KernelUpdateCache::load(temp.path()), KernelUpdateCache::default());
    assert!(VersionCache::load(temp.path()).is_none());
  }

  #[test]
  fn kernel_records_round_trip_with_camel_case() {
    let temp = TempDir::new().unwrap();
    let mut cache = KernelUpdateCache::default();
    cache.record("native", Some("1.0.0".into()), 42);
    cache.save(temp.path()).unwrap();

    let raw = std::fs::read_to_string(KernelUpdateCache::path(temp.path())).unwrap();
    assert!(raw.contains("\"lastCheck\": 42"));
    assert_eq!(KernelUpdateCache::load(temp.path()).last_check("native"), 42);
    assert_eq!(KernelUpdateCache::load(temp.path()).last_check("jvm"), 0);
  }
}
