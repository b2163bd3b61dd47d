//! Implementation of the `runkit self-update` command.

use anyhow::{Context, Result};

use runkit_lib::fetch::HttpClient;
use runkit_lib::now_unix;
use runkit_lib::store_lock::{LockMode, StateLock};
use runkit_lib::update::{SelfUpdateOutcome, SelfUpdater, SkipReason};

use super::{load_config, runtime};
use crate::output::{print_info, print_success, symbols};

/// Check for a newer runkit release now, ignoring the update interval.
pub fn cmd_self_update() -> Result<()> {
  let config = load_config()?;
  let _lock =
    StateLock::acquire(&config.state_dir, LockMode::Exclusive, "self-update").context("Failed to acquire state lock")?;

  let client = HttpClient::new(&config).context("Failed to create HTTP client")?;
  let updater = SelfUpdater::new(&config, &client)?;
  let outcome = runtime()?
    .block_on(updater.check(now_unix(), true))
    .context("Self-update failed")?;

  match outcome {
    SelfUpdateOutcome::Updated { from, to } => {
      print_success(&format!("Updated runkit {} {} {}", from, symbols::ARROW, to));
    }
    SelfUpdateOutcome::UpToDate { version } => {
      print_success(&format!("runkit {} is up to date", version));
    }
    SelfUpdateOutcome::Skipped(SkipReason::DevBuild) => {
      print_info("Running from a source checkout; not updating");
    }
    SelfUpdateOutcome::Skipped(SkipReason::Disabled) | SelfUpdateOutcome::NotDue => {
      print_info("No update check was needed");
    }
  }

  Ok(())
}
