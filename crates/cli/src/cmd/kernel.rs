//! Implementation of the `runkit kernel` commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use tracing::{debug, warn};

use runkit_lib::config::Config;
use runkit_lib::fetch::HttpClient;
use runkit_lib::install::{InstallOptions, InstallOutcome, InstallSource, Installer};
use runkit_lib::kernel::KernelKind;
use runkit_lib::manifest::KernelEntry;
use runkit_lib::platform::Platform;
use runkit_lib::store_lock::{LockMode, StateLock};

use super::{check_manifest, load_config, runtime};
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success, symbols};

pub struct KernelInstallArgs {
  pub id: String,
  pub path: Option<PathBuf>,
  pub version: Option<String>,
  pub platform: Option<String>,
  pub repo: Option<String>,
  pub force: bool,
}

/// Install a kernel from a local file (`--path`) or its release repository.
pub fn cmd_kernel_install(args: KernelInstallArgs) -> Result<()> {
  let config = load_config()?;
  let _lock =
    StateLock::acquire(&config.state_dir, LockMode::Exclusive, "kernel install").context("Failed to acquire state lock")?;
  check_manifest(&config)?;

  let platform = args
    .platform
    .as_deref()
    .map(str::parse::<Platform>)
    .transpose()
    .context("Invalid --platform")?;
  let source = match args.path {
    Some(path) => InstallSource::Local(path),
    None => InstallSource::Release,
  };
  let options = InstallOptions {
    force: args.force,
    version: args.version,
    platform,
    repo: args.repo,
  };

  let client = HttpClient::new(&config).context("Failed to create HTTP client")?;
  let installer = Installer::new(&config, &client);
  let report = runtime()?
    .block_on(installer.install(&args.id, &source, &options))
    .with_context(|| format!("Failed to install kernel '{}'", args.id))?;

  let version = report.version.as_deref().unwrap_or("unversioned");
  match report.outcome {
    InstallOutcome::Installed => {
      print_success(&format!("Installed kernel '{}' ({})", report.id, version));
      print_stat("Path", &report.path.display().to_string());
    }
    InstallOutcome::AlreadyCurrent => {
      print_info(&format!(
        "Kernel '{}' {} is already installed (use --force to reinstall)",
        report.id, version
      ));
    }
  }

  Ok(())
}

/// List installed kernels, marking the default.
pub fn cmd_kernel_ls(output: OutputFormat) -> Result<()> {
  let config = load_config()?;
  let _lock =
    StateLock::acquire(&config.state_dir, LockMode::Shared, "kernel ls").context("Failed to acquire state lock")?;
  let store = check_manifest(&config)?;
  let manifest = store.load().context("Failed to load manifest")?;

  if output.is_json() {
    let kernels: Vec<_> = manifest
      .installed_kernels
      .iter()
      .map(|k| {
        serde_json::json!({
          "id": k.id,
          "version": k.version,
          "path": k.path,
          "default": manifest.default_kernel.as_deref() == Some(k.id.as_str()),
        })
      })
      .collect();
    return print_json(&serde_json::json!({
      "defaultKernel": manifest.default_kernel,
      "kernels": kernels,
    }));
  }

  if manifest.installed_kernels.is_empty() {
    print_info("No kernels installed. Run 'runkit kernel install <id>' to add one.");
    return Ok(());
  }

  let width = manifest.installed_kernels.iter().map(|k| k.id.len()).max().unwrap_or(0);
  for kernel in &manifest.installed_kernels {
    let is_default = manifest.default_kernel.as_deref() == Some(kernel.id.as_str());
    let marker = if is_default { symbols::DEFAULT } else { " " };
    println!(
      "{} {:<width$}  {:<12}  {}",
      marker.if_supports_color(Stream::Stdout, |s| s.green()),
      kernel.id,
      kernel.version.as_deref().unwrap_or("-"),
      kernel
        .path
        .display()
        .if_supports_color(Stream::Stdout, |s| s.dimmed()),
      width = width
    );
  }

  Ok(())
}

/// Forget a kernel and delete the files runkit placed for it.
pub fn cmd_kernel_remove(id: &str) -> Result<()> {
  let config = load_config()?;
  let _lock =
    StateLock::acquire(&config.state_dir, LockMode::Exclusive, "kernel remove").context("Failed to acquire state lock")?;
  let store = check_manifest(&config)?;

  let (removed, manifest) = store.remove(id).context("Failed to remove kernel")?;
  remove_kernel_files(&config, &removed);

  print_success(&format!("Removed kernel '{}'", removed.id));
  match manifest.default_kernel {
    Some(default) => print_stat("Default", &default),
    None => print_stat("Default", "none"),
  }

  Ok(())
}

pub fn cmd_kernel_default(id: &str) -> Result<()> {
  let config = load_config()?;
  let _lock =
    StateLock::acquire(&config.state_dir, LockMode::Exclusive, "kernel default").context("Failed to acquire state lock")?;
  let store = check_manifest(&config)?;

  store.set_default(id).context("Failed to set default kernel")?;
  print_success(&format!("Default kernel is now '{}'", id));

  Ok(())
}

/// Files outside the bin directory were installed by the user and stay put.
fn remove_kernel_files(config: &Config, entry: &KernelEntry) {
  if entry.path.starts_with(&config.bin_dir) {
    match std::fs::remove_file(&entry.path) {
      Ok(()) => debug!(path = %entry.path.display(), "deleted kernel file"),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => warn!(path = %entry.path.display(), error = %e, "failed to delete kernel file"),
    }
  }

  if KernelKind::from_id(&entry.id) == Some(KernelKind::Python)
    && let Some(version) = &entry.version
  {
    let slot = config.runtimes_dir().join(KernelKind::Python.id()).join(version);
    if slot.exists()
      && let Err(e) = std::fs::remove_dir_all(&slot)
    {
      warn!(path = %slot.display(), error = %e, "failed to delete runtime");
    }
  }
}
