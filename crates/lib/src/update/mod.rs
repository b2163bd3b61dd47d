//! Keeping runkit and its kernels current.
//!
//! Both updaters are gated by `Config::update_interval` and record their
//! last check in the cache directory, so most invocations make no network
//! calls at all. Failures never abort the command that triggered them.

pub mod cache;
pub mod kernel;
pub mod self_update;

use tracing::{debug, warn};

use crate::config::Config;
use crate::fetch::HttpClient;
use crate::now_unix;
use crate::store_lock::{LockMode, StateLock};

pub use cache::{KernelUpdateCache, SelfUpdateCache, VersionCache, is_due};
pub use kernel::{KernelUpdateOutcome, KernelUpdater};
pub use self_update::{SelfUpdateError, SelfUpdateOutcome, SelfUpdater, SkipReason};

/// What the pre-run update pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoUpdateReport {
  pub tool: Option<SelfUpdateOutcome>,
  pub kernel: KernelUpdateOutcome,
}

/// Run the tool and kernel update checks before dispatching to `kernel_id`.
///
/// Holds the state lock while checking; a contended lock skips the pass.
pub async fn before_run(config: &Config, client: &HttpClient, kernel_id: &str) -> AutoUpdateReport {
  let skipped = AutoUpdateReport {
    tool: None,
    kernel: KernelUpdateOutcome::Skipped,
  };
  if !config.auto_update {
    return skipped;
  }

  let _lock = match StateLock::acquire(&config.state_dir, LockMode::Exclusive, "auto-update") {
    Ok(lock) => lock,
    Err(e) => {
      warn!(error = %e, "skipping auto-update");
      return skipped;
    }
  };
  let now = now_unix();

  let tool = match SelfUpdater::new(config, client) {
    Ok(updater) => match updater.check(now, false).await {
      Ok(outcome) => Some(outcome),
      Err(e) => {
        warn!(error = %e, "self-update failed");
        None
      }
    },
    Err(e) => {
      warn!(error = %e, "self-update unavailable");
      None
    }
  };

  let kernel = KernelUpdater::new(config, client).check(kernel_id, now).await;
  debug!(?tool, ?kernel, "auto-update pass finished");

  AutoUpdateReport { tool, kernel }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::test_config;
  use tempfile::TempDir;

  #[tokio::test]
  async fn disabled_auto_update_does_nothing() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), "http://127.0.0.1:9");
    let client = HttpClient::new(&config).unwrap();

    let report = before_run(&config, &client, "native").await;

    assert_eq!(report.tool, None);
    assert_eq!(report.kernel, KernelUpdateOutcome::Skipped);
    assert!(!config.cache_dir.join("self-update.json").exists());
  }
}
