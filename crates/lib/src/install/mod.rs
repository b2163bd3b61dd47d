//! Kernel installation pipeline.
//!
//! An install runs these stages in order, stopping at the first failure:
//!
//! 1. resolve source: a local file, or a release version plus its assets
//! 2. fetch: download assets into the download cache
//! 3. extract: unpack archives into a staging directory
//! 4. locate binary: pick the artifact (or build the script wrapper)
//! 5. prepare destination: `<bin>/<id>[.ext]`, refusing to clobber without force
//! 6. place: copy, mark executable, atomically rename into place
//! 7. post-process: platform fix-ups (best effort)
//! 8. record manifest: upsert the entry
//!
//! Staging lives in a temp directory under the state dir, so nothing is left
//! behind on failure and the manifest is only touched by the last stage.
//! Callers hold the state lock for the duration of an install.

pub(crate) mod locate;
pub(crate) mod place;
pub mod script;

use std::fmt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveError};
use crate::config::Config;
use crate::fetch::{FetchError, HttpClient, url_to_filename};
use crate::kernel::KernelKind;
use crate::manifest::{KernelEntry, ManifestError, ManifestStore};
use crate::platform::{Platform, PlatformError};
use crate::release::{Asset, KernelAssets, ReleaseRef, ReleaseResolver, ResolveError, normalize_tag};

pub use place::{destination, release_destination};
pub use script::ScriptLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
  ResolveSource,
  Fetch,
  Extract,
  LocateBinary,
  PrepareDestination,
  Place,
  PostProcess,
  RecordManifest,
}

impl fmt::Display for InstallStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::ResolveSource => "resolve source",
      Self::Fetch => "fetch",
      Self::Extract => "extract",
      Self::LocateBinary => "locate binary",
      Self::PrepareDestination => "prepare destination",
      Self::Place => "place",
      Self::PostProcess => "post-process",
      Self::RecordManifest => "record manifest",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Error)]
pub enum InstallError {
  #[error("{0}")]
  InvalidArgument(String),

  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("source file not found: {0}")]
  SourceNotFound(PathBuf),

  #[error("failed to download {asset}: {source}")]
  Download {
    asset: String,
    #[source]
    source: FetchError,
  },

  #[error(transparent)]
  Extract(#[from] ArchiveError),

  #[error("no binary for kernel '{id}' found (looked for {searched})")]
  BinaryNotFound { id: String, searched: String },

  #[error("failed to install kernel dependencies: {message}")]
  DependencyInstall { message: String },

  #[error(
    "kernel '{id}' is already installed at {} (version {}); use --force to replace it",
    path.display(),
    installed.as_deref().unwrap_or("unknown")
  )]
  AlreadyInstalled {
    id: String,
    path: PathBuf,
    installed: Option<String>,
  },

  #[error("{stage} failed at {path}: {source}")]
  Io {
    stage: InstallStage,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Manifest(#[from] ManifestError),
}

impl InstallError {
  pub(crate) fn io(stage: InstallStage, path: &Path, source: std::io::Error) -> Self {
    Self::Io {
      stage,
      path: path.to_path_buf(),
      source,
    }
  }

  /// The pipeline stage that failed.
  pub fn stage(&self) -> InstallStage {
    match self {
      Self::InvalidArgument(_) | Self::Platform(_) | Self::Resolve(_) | Self::SourceNotFound(_) => {
        InstallStage::ResolveSource
      }
      Self::Download { .. } => InstallStage::Fetch,
      Self::Extract(_) => InstallStage::Extract,
      Self::BinaryNotFound { .. } | Self::DependencyInstall { .. } => InstallStage::LocateBinary,
      Self::AlreadyInstalled { .. } => InstallStage::PrepareDestination,
      Self::Io { stage, .. } => *stage,
      Self::Manifest(_) => InstallStage::RecordManifest,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
  /// A binary or archive on the local filesystem.
  Local(PathBuf),
  /// The release repository of a built-in kind.
  Release,
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
  pub force: bool,
  /// Pinned version; latest when unset. Recorded as-is for local installs.
  pub version: Option<String>,
  /// Target platform; the host when unset.
  pub platform: Option<Platform>,
  /// Repository override for release installs.
  pub repo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
  Installed,
  /// Same id and version already present; nothing was changed.
  AlreadyCurrent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
  pub id: String,
  pub version: Option<String>,
  pub path: PathBuf,
  pub outcome: InstallOutcome,
}

pub struct Installer<'a> {
  config: &'a Config,
  client: &'a HttpClient,
  store: ManifestStore,
}

impl<'a> Installer<'a> {
  pub fn new(config: &'a Config, client: &'a HttpClient) -> Self {
    Self {
      config,
      client,
      store: ManifestStore::new(&config.manifest_path),
    }
  }

  /// Install kernel `id` from `source`.
  pub async fn install(
    &self,
    id: &str,
    source: &InstallSource,
    options: &InstallOptions,
  ) -> Result<InstallReport, InstallError> {
    if id.trim().is_empty() || id.contains(['/', '\\']) {
      return Err(InstallError::InvalidArgument(format!("invalid kernel id '{}'", id)));
    }

    info!(id, ?source, force = options.force, "installing kernel");
    match source {
      InstallSource::Local(path) => self.install_local(id, path, options).await,
      InstallSource::Release => self.install_release(id, options).await,
    }
  }

  async fn install_local(&self, id: &str, path: &Path, options: &InstallOptions) -> Result<InstallReport, InstallError> {
    if !path.is_file() {
      return Err(InstallError::SourceNotFound(path.to_path_buf()));
    }
    let version = options.version.as_deref().map(|v| normalize_tag(v, Some(id)));

    let staging = self.staging_dir()?;
    let artifact = if archive::is_archive(path) {
      let platform = match options.platform {
        Some(platform) => platform,
        None => Platform::current()?,
      };
      let extracted = staging.path().join("extract");
      archive::unpack_archive(path, &extracted)?;
      self.locate_in_archive(id, &extracted, platform)?
    } else {
      path.to_path_buf()
    };

    let dest = destination(&self.config.bin_dir, id, &artifact);
    if let Some(report) = self.check_existing(id, &dest, version.as_deref(), options.force)? {
      return Ok(report);
    }

    self.finish(id, version, None, &artifact, &dest)
  }

  fn locate_in_archive(&self, id: &str, extracted: &Path, platform: Platform) -> Result<PathBuf, InstallError> {
    match KernelKind::from_id(id) {
      Some(KernelKind::Jvm) => single_jar(id, extracted),
      _ => {
        let binary = KernelKind::Native.binary_name(platform);
        locate::find_native(extracted, &binary, id).ok_or_else(|| InstallError::BinaryNotFound {
          id: id.to_string(),
          searched: format!("'{}' or '{}'", binary, id),
        })
      }
    }
  }

  async fn install_release(&self, id: &str, options: &InstallOptions) -> Result<InstallReport, InstallError> {
    let kind = release_kind(id)?;
    let repo = options.repo.as_deref().unwrap_or_else(|| self.config.repo_for(kind));

    let resolver = ReleaseResolver::new(self.config, self.client);
    let release = resolver.resolve_version(repo, kind, options.version.as_deref()).await?;

    self.install_release_ref(id, &release, options).await
  }

  /// Install an already-resolved release of built-in kernel `id`.
  pub async fn install_release_ref(
    &self,
    id: &str,
    release: &ReleaseRef,
    options: &InstallOptions,
  ) -> Result<InstallReport, InstallError> {
    let kind = release_kind(id)?;
    let platform = match options.platform {
      Some(platform) => platform,
      None => Platform::current()?,
    };
    let repo = options.repo.as_deref().unwrap_or_else(|| self.config.repo_for(kind));
    let resolver = ReleaseResolver::new(self.config, self.client);

    let expected = release_destination(&self.config.bin_dir, kind, platform);
    if let Some(report) = self.check_existing(id, &expected, Some(&release.version), options.force)? {
      return Ok(report);
    }

    let assets = resolver.resolve_assets(repo, release, kind, platform).await;
    let staging = self.staging_dir()?;

    let artifact = match kind {
      KernelKind::Native => {
        let downloaded = self.fetch(id, release, &assets.primary, options.force).await?;
        if archive::is_archive(&downloaded) {
          let extracted = staging.path().join("extract");
          archive::unpack_archive(&downloaded, &extracted)?;
          let binary = kind.binary_name(platform);
          locate::find_native(&extracted, &binary, id).ok_or_else(|| InstallError::BinaryNotFound {
            id: id.to_string(),
            searched: format!("'{}' or '{}' in {}", binary, id, assets.primary.name),
          })?
        } else {
          downloaded
        }
      }
      KernelKind::Jvm => {
        let downloaded = self.fetch(id, release, &assets.primary, options.force).await?;
        if archive::is_archive(&downloaded) {
          let extracted = staging.path().join("extract");
          archive::unpack_archive(&downloaded, &extracted)?;
          single_jar(id, &extracted)?
        } else {
          downloaded
        }
      }
      KernelKind::Python => self.package_script(&assets, platform, staging.path(), options.force).await?,
    };

    let dest = destination(&self.config.bin_dir, id, &artifact);
    self.finish(id, Some(release.version.clone()), options.repo.as_deref(), &artifact, &dest)
  }

  /// Fetch, unpack and wire up a script kernel, returning its wrapper.
  async fn package_script(
    &self,
    assets: &KernelAssets,
    platform: Platform,
    staging: &Path,
    force: bool,
  ) -> Result<PathBuf, InstallError> {
    let id = KernelKind::Python.id();
    let release = &assets.release;

    let runtime_archive = self.fetch(id, release, &assets.primary, force).await?;
    let source_archive = match &assets.source {
      Some(source) => Some(self.fetch(id, release, source, force).await?),
      None => None,
    };

    let runtime_extract = staging.join("runtime");
    archive::unpack_archive(&runtime_archive, &runtime_extract)?;

    // Build beside the live slot so a failed reinstall leaves it untouched.
    let slots = self.config.runtimes_dir().join(id);
    std::fs::create_dir_all(&slots).map_err(|e| InstallError::io(InstallStage::LocateBinary, &slots, e))?;
    let building = tempfile::Builder::new()
      .prefix(".building-")
      .tempdir_in(&slots)
      .map_err(|e| InstallError::io(InstallStage::LocateBinary, &slots, e))?;

    let runtime = script::install_runtime(&runtime_extract, building.path())?;
    let interpreter = script::interpreter(&runtime)?;

    let src_dir = building.path().join("src");
    let Some(archive_path) = &source_archive else {
      return Err(InstallError::BinaryNotFound {
        id: id.to_string(),
        searched: "kernel source archive".to_string(),
      });
    };
    archive::unpack_archive(archive_path, &src_dir)?;
    let src = script::source_root(&src_dir)?;

    let layout = ScriptLayout {
      runtime,
      interpreter,
      src,
    };
    script::install_requirements(&layout).await?;

    let slot = slots.join(&release.version);
    swap_slot(building.path(), &slot, &slots.join(format!(".retired-{}", release.version)))?;
    let layout = layout.rebased(building.path(), &slot);
    script::write_wrapper(staging, &layout, platform.is_windows())
  }

  async fn fetch(&self, id: &str, release: &ReleaseRef, asset: &Asset, force: bool) -> Result<PathBuf, InstallError> {
    let dest = self
      .config
      .downloads_dir()
      .join(id)
      .join(&release.version)
      .join(url_to_filename(&asset.name));

    self
      .client
      .download_cached(&asset.url, &dest, force)
      .await
      .map_err(|source| InstallError::Download {
        asset: asset.name.clone(),
        source,
      })
  }

  /// Early no-op/clobber check for an occupied destination.
  fn check_existing(
    &self,
    id: &str,
    dest: &Path,
    requested: Option<&str>,
    force: bool,
  ) -> Result<Option<InstallReport>, InstallError> {
    if force {
      return Ok(None);
    }

    let entry = self.store.get(id)?;
    let occupied = dest.exists() || entry.as_ref().is_some_and(|e| e.path.exists());
    if !occupied {
      return Ok(None);
    }

    let installed = entry.as_ref().and_then(|e| e.version.clone());
    if let (Some(requested), Some(installed), Some(entry)) = (requested, installed.as_deref(), entry.as_ref())
      && requested == installed
    {
      info!(id, version = installed, "kernel already current");
      return Ok(Some(InstallReport {
        id: id.to_string(),
        version: Some(installed.to_string()),
        path: entry.path.clone(),
        outcome: InstallOutcome::AlreadyCurrent,
      }));
    }

    Err(InstallError::AlreadyInstalled {
      id: id.to_string(),
      path: entry.map(|e| e.path).unwrap_or_else(|| dest.to_path_buf()),
      installed,
    })
  }

  /// Place, post-process and record.
  fn finish(
    &self,
    id: &str,
    version: Option<String>,
    repo: Option<&str>,
    artifact: &Path,
    dest: &Path,
  ) -> Result<InstallReport, InstallError> {
    place::place(artifact, dest).map_err(|e| InstallError::io(InstallStage::Place, dest, e))?;
    place::post_process(dest);

    let previous = self.store.get(id)?;
    self.store.record(KernelEntry {
      id: id.to_string(),
      version: version.clone(),
      path: dest.to_path_buf(),
      repo: repo.map(str::to_string),
    })?;

    if let Some(previous) = previous {
      self.drop_replaced(id, &previous, version.as_deref(), dest);
    }

    info!(id, version = version.as_deref().unwrap_or("-"), path = %dest.display(), "installed kernel");
    Ok(InstallReport {
      id: id.to_string(),
      version,
      path: dest.to_path_buf(),
      outcome: InstallOutcome::Installed,
    })
  }

  /// Delete what a replaced install left behind: a renamed bin file or an old runtime slot.
  fn drop_replaced(&self, id: &str, previous: &KernelEntry, version: Option<&str>, dest: &Path) {
    if previous.path != dest
      && previous.path.starts_with(&self.config.bin_dir)
      && let Err(e) = std::fs::remove_file(&previous.path)
    {
      warn!(path = %previous.path.display(), error = %e, "could not remove replaced kernel");
    }

    if KernelKind::from_id(id) == Some(KernelKind::Python)
      && let Some(old) = previous.version.as_deref()
      && version != Some(old)
    {
      let slot = self.config.runtimes_dir().join(id).join(old);
      if slot.exists() {
        debug!(slot = %slot.display(), "removing replaced runtime");
        if let Err(e) = std::fs::remove_dir_all(&slot) {
          warn!(path = %slot.display(), error = %e, "could not remove replaced runtime");
        }
      }
    }
  }

  fn staging_dir(&self) -> Result<TempDir, InstallError> {
    std::fs::create_dir_all(&self.config.state_dir)
      .map_err(|e| InstallError::io(InstallStage::Extract, &self.config.state_dir, e))?;
    tempfile::Builder::new()
      .prefix(".install-")
      .tempdir_in(&self.config.state_dir)
      .map_err(|e| InstallError::io(InstallStage::Extract, &self.config.state_dir, e))
  }
}

fn release_kind(id: &str) -> Result<KernelKind, InstallError> {
  KernelKind::from_id(id).ok_or_else(|| {
    InstallError::InvalidArgument(format!(
      "kernel '{}' is not a built-in kind ({}); install it with --path",
      id,
      KernelKind::ALL.map(|k| k.id()).join(", ")
    ))
  })
}

/// Move a finished runtime build into `slot`, parking any previous build at `retired` until it succeeds.
fn swap_slot(built: &Path, slot: &Path, retired: &Path) -> Result<(), InstallError> {
  let io_err = |e: std::io::Error| InstallError::io(InstallStage::LocateBinary, slot, e);
  if !slot.exists() {
    return std::fs::rename(built, slot).map_err(io_err);
  }

  if retired.exists() {
    std::fs::remove_dir_all(retired).map_err(io_err)?;
  }
  std::fs::rename(slot, retired).map_err(io_err)?;
  if let Err(e) = std::fs::rename(built, slot) {
    let _ = std::fs::rename(retired, slot);
    return Err(io_err(e));
  }
  if let Err(e) = std::fs::remove_dir_all(retired) {
    warn!(path = %retired.display(), error = %e, "could not remove retired runtime");
  }
  Ok(())
}

fn single_jar(id: &str, extracted: &Path) -> Result<PathBuf, InstallError> {
  let mut jars = locate::find_jars(extracted);
  match jars.len() {
    1 => Ok(jars.remove(0)),
    0 => Err(InstallError::BinaryNotFound {
      id: id.to_string(),
      searched: "a .jar file".to_string(),
    }),
    n => Err(InstallError::BinaryNotFound {
      id: id.to_string(),
      searched: format!("exactly one .jar file, found {}", n),
    }),
  }
}
