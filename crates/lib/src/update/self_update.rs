//! Replacing the running runkit binary with the latest release.

use std::path::{Path, PathBuf};

use semver::Version;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::cache::{SelfUpdateCache, VersionCache, is_due};
use crate::archive::{self, ArchiveError};
use crate::config::Config;
use crate::consts::APP_NAME;
use crate::fetch::{FetchError, HttpClient, url_to_filename};
use crate::install::{locate, place};
use crate::platform::{Platform, PlatformError};
use crate::release::{ReleaseRef, ReleaseResolver, ResolveError};

#[derive(Debug, Error)]
pub enum SelfUpdateError {
  #[error("cannot locate the running executable: {0}")]
  CurrentExe(#[source] std::io::Error),

  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("failed to download {asset}: {source}")]
  Download {
    asset: String,
    #[source]
    source: FetchError,
  },

  #[error(transparent)]
  Extract(#[from] ArchiveError),

  #[error("release asset {0} does not contain a runkit binary")]
  BinaryNotFound(String),

  #[error("failed to replace {path}: {source}")]
  Replace {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  Disabled,
  /// Running from a source checkout.
  DevBuild,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfUpdateOutcome {
  Skipped(SkipReason),
  NotDue,
  UpToDate { version: String },
  Updated { from: String, to: String },
}

pub struct SelfUpdater<'a> {
  config: &'a Config,
  client: &'a HttpClient,
  exe: PathBuf,
  current: String,
}

impl<'a> SelfUpdater<'a> {
  /// Updater for the running executable.
  pub fn new(config: &'a Config, client: &'a HttpClient) -> Result<Self, SelfUpdateError> {
    let exe = std::env::current_exe().map_err(SelfUpdateError::CurrentExe)?;
    let exe = dunce::canonicalize(&exe).unwrap_or(exe);
    Ok(Self::with_exe(config, client, exe, env!("CARGO_PKG_VERSION")))
  }

  /// Updater for an arbitrary binary reporting `current` as its version.
  pub fn with_exe(config: &'a Config, client: &'a HttpClient, exe: PathBuf, current: &str) -> Self {
    Self {
      config,
      client,
      exe,
      current: current.to_string(),
    }
  }

  /// Check for and apply a newer release.
  ///
  /// `force` ignores the interval and the auto-update switch. The check time
  /// is recorded whether or not the check succeeds.
  pub async fn check(&self, now: u64, force: bool) -> Result<SelfUpdateOutcome, SelfUpdateError> {
    if !force && !self.config.auto_update {
      return Ok(SelfUpdateOutcome::Skipped(SkipReason::Disabled));
    }
    if is_dev_build(&self.exe) {
      debug!(exe = %self.exe.display(), "running from a source checkout, not self-updating");
      return Ok(SelfUpdateOutcome::Skipped(SkipReason::DevBuild));
    }

    let mut cache = SelfUpdateCache::load(&self.config.cache_dir);
    if !force && !is_due(cache.last_check, now, self.config.update_interval) {
      return Ok(SelfUpdateOutcome::NotDue);
    }

    let result = self.update(now).await;

    cache.last_check = now;
    match &result {
      Ok(SelfUpdateOutcome::Updated { to, .. }) => cache.version = Some(to.clone()),
      Ok(_) => cache.version = Some(self.current.clone()),
      Err(_) => {}
    }
    if let Err(e) = cache.save(&self.config.cache_dir) {
      warn!(error = %e, "failed to record self-update check");
    }

    result
  }

  async fn update(&self, now: u64) -> Result<SelfUpdateOutcome, SelfUpdateError> {
    let repo = &self.config.self_repo;
    let resolver = ReleaseResolver::new(self.config, self.client);
    let latest = resolver.latest(repo, None).await?;

    let record = VersionCache {
      version: latest.version.clone(),
      source: repo.clone(),
      fetched_at: now,
    };
    if let Err(e) = record.save(&self.config.cache_dir) {
      warn!(error = %e, "failed to record upstream version");
    }

    if !is_newer(&latest.version, &self.current) {
      debug!(current = %self.current, latest = %latest.version, "runkit is up to date");
      return Ok(SelfUpdateOutcome::UpToDate {
        version: self.current.clone(),
      });
    }

    info!(from = %self.current, to = %latest.version, "updating runkit");
    self.apply(&resolver, &latest).await?;

    Ok(SelfUpdateOutcome::Updated {
      from: self.current.clone(),
      to: latest.version,
    })
  }

  async fn apply(&self, resolver: &ReleaseResolver<'_>, release: &ReleaseRef) -> Result<(), SelfUpdateError> {
    let platform = Platform::current()?;
    let asset = format!("{}-{}.{}", APP_NAME, platform, platform.archive_ext());
    let url = resolver.asset_url(&self.config.self_repo, release, &asset);

    let download = self
      .config
      .downloads_dir()
      .join(APP_NAME)
      .join(&release.version)
      .join(url_to_filename(&asset));
    self
      .client
      .download_cached(&url, &download, false)
      .await
      .map_err(|source| SelfUpdateError::Download {
        asset: asset.clone(),
        source,
      })?;

    let staging = tempfile::tempdir().map_err(|e| SelfUpdateError::Replace {
      path: self.exe.clone(),
      source: e,
    })?;
    archive::unpack_archive(&download, staging.path())?;

    let binary_name = format!("{}{}", APP_NAME, platform.exe_suffix());
    let binary =
      locate::find_file_named(staging.path(), &binary_name).ok_or(SelfUpdateError::BinaryNotFound(asset))?;

    replace_exe(&binary, &self.exe).map_err(|e| SelfUpdateError::Replace {
      path: self.exe.clone(),
      source: e,
    })
  }
}

/// Whether `exe` lives inside a git checkout.
fn is_dev_build(exe: &Path) -> bool {
  exe.ancestors().skip(1).any(|dir| dir.join(".git").exists())
}

/// Semver comparison; unparsable versions never count as newer.
fn is_newer(latest: &str, current: &str) -> bool {
  match (Version::parse(latest), Version::parse(current)) {
    (Ok(latest), Ok(current)) => latest > current,
    _ => {
      warn!(latest, current, "cannot compare versions");
      false
    }
  }
}

#[cfg(not(windows))]
fn replace_exe(new_binary: &Path, exe: &Path) -> std::io::Result<()> {
  place::place(new_binary, exe)
}

// A running executable cannot be overwritten on Windows, but it can be renamed.
#[cfg(windows)]
fn replace_exe(new_binary: &Path, exe: &Path) -> std::io::Result<()> {
  let old = exe.with_extension("old.exe");
  let _ = std::fs::remove_file(&old);
  std::fs::rename(exe, &old)?;
  place::place(new_binary, exe)
}
