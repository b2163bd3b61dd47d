mod cache;
mod kernel;
mod run;
mod self_update;
mod version;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use runkit_lib::config::Config;
use runkit_lib::manifest::{LoadOutcome, ManifestStore};

use crate::output::print_warning;

pub use cache::cmd_cache_clean;
pub use kernel::{KernelInstallArgs, cmd_kernel_default, cmd_kernel_install, cmd_kernel_ls, cmd_kernel_remove};
pub use run::cmd_run;
pub use self_update::cmd_self_update;
pub use version::cmd_version;

fn load_config() -> Result<Config> {
  Config::from_env().context("Invalid configuration")
}

/// Async work runs on one thread; nothing in a command is concurrent.
fn runtime() -> Result<Runtime> {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")
}

/// Load the manifest up front so a healed file is reported once per command.
fn check_manifest(config: &Config) -> Result<ManifestStore> {
  let store = ManifestStore::new(&config.manifest_path);
  let (_, outcome) = store.load_with_outcome().context("Failed to load manifest")?;
  if let LoadOutcome::Healed { reason } = outcome {
    print_warning(&format!("{} ({})", reason, store.path().display()));
  }
  Ok(store)
}
