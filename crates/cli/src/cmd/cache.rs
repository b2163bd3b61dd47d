//! Implementation of the `runkit cache clean` command.

use anyhow::{Context, Result};

use runkit_lib::store_lock::{LockMode, StateLock};

use super::load_config;
use crate::output::{dir_size, format_bytes, print_info, print_stat, print_success};

/// Delete the whole cache directory: downloads, release manifests and update
/// records. Installed kernels and runtimes live in the state directory and
/// are not touched.
pub fn cmd_cache_clean() -> Result<()> {
  let config = load_config()?;
  let _lock =
    StateLock::acquire(&config.state_dir, LockMode::Exclusive, "cache clean").context("Failed to acquire state lock")?;

  let cache = &config.cache_dir;
  if !cache.exists() {
    print_info("Cache is already empty");
    return Ok(());
  }

  let freed = dir_size(cache);
  std::fs::remove_dir_all(cache).with_context(|| format!("Failed to remove {}", cache.display()))?;

  print_success("Cache cleaned");
  print_stat("Path", &cache.display().to_string());
  print_stat("Space freed", &format_bytes(freed));

  Ok(())
}
