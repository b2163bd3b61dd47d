//! Implementation of the `runkit version` command.

use anyhow::Result;

use runkit_lib::now_unix;
use runkit_lib::platform::platform_triple;
use runkit_lib::update::{SelfUpdateCache, VersionCache};

use super::load_config;
use crate::output::{format_age, print_stat};

pub fn cmd_version() -> Result<()> {
  let config = load_config()?;
  let now = now_unix();

  println!("runkit {}", env!("CARGO_PKG_VERSION"));
  print_stat("Platform", platform_triple().as_deref().unwrap_or("unsupported"));

  match VersionCache::load(&config.cache_dir) {
    Some(latest) => print_stat(
      "Latest release",
      &format!(
        "{} (from {}, checked {})",
        latest.version,
        latest.source,
        format_age(latest.fetched_at, now)
      ),
    ),
    None => print_stat("Latest release", "unknown"),
  }

  let checked = SelfUpdateCache::load(&config.cache_dir).last_check;
  if checked > 0 {
    print_stat("Last update check", &format_age(checked, now));
  }
  if !config.auto_update {
    print_stat("Auto-update", "disabled");
  }

  Ok(())
}
