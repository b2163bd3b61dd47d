//! Release resolution: which version to install and where its assets live.
//!
//! Versions come from the `releases/latest` endpoint of the release API.
//! Asset URLs come from the release's `release-manifest.json` when one is
//! published, and otherwise from the conventional
//! `<download base>/<repo>/releases/download/<tag>/<asset>` layout.

pub mod manifest;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::consts::{APP_NAME, PINNED_TAG_PREFIX, RELEASE_MANIFEST_ASSET};
use crate::fetch::{FetchError, HttpClient};
use crate::kernel::KernelKind;
use crate::platform::Platform;

pub use manifest::ReleaseManifest;

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("could not determine the latest release of {repo}: {source}")]
  LatestRelease {
    repo: String,
    #[source]
    source: FetchError,
  },

  #[error("latest release of {repo} has no tag")]
  MissingTag { repo: String },
}

/// A release identified by its normalized version and its raw tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRef {
  pub version: String,
  pub tag: String,
}

impl ReleaseRef {
  /// A user-pinned version, published under tag `v<version>`.
  pub fn pinned(version: &str) -> Self {
    let version = normalize_tag(version, None);
    Self {
      tag: format!("{}{}", PINNED_TAG_PREFIX, version),
      version,
    }
  }
}

/// A downloadable release asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
  pub name: String,
  pub url: String,
}

/// Everything needed to install one kernel kind from a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelAssets {
  pub release: ReleaseRef,
  pub primary: Asset,
  /// Companion source archive, for kinds that ship one.
  pub source: Option<Asset>,
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
  #[serde(default)]
  tag_name: Option<String>,
}

/// Strip release-tag decorations down to a bare version.
///
/// Removes, in order: a `runkit-v` prefix, a `<kernel id>-v` prefix, any
/// `<name>-v` prefix directly followed by a digit, and a leading `v`/`V`.
pub fn normalize_tag(tag: &str, kernel_id: Option<&str>) -> String {
  let mut rest = tag.trim();

  let tool_prefix = format!("{}-v", APP_NAME);
  if let Some(stripped) = rest.strip_prefix(tool_prefix.as_str()) {
    rest = stripped;
  }

  if let Some(id) = kernel_id
    && let Some(stripped) = rest.strip_prefix(format!("{}-v", id).as_str())
  {
    rest = stripped;
  }

  let cut = rest
    .match_indices("-v")
    .map(|(idx, _)| idx)
    .find(|&idx| idx > 0 && rest[idx + 2..].starts_with(|c: char| c.is_ascii_digit()));
  if let Some(idx) = cut {
    rest = &rest[idx + 2..];
  }

  rest.strip_prefix(['v', 'V']).unwrap_or(rest).to_string()
}

pub struct ReleaseResolver<'a> {
  config: &'a Config,
  client: &'a HttpClient,
}

impl<'a> ReleaseResolver<'a> {
  pub fn new(config: &'a Config, client: &'a HttpClient) -> Self {
    Self { config, client }
  }

  /// Query the latest release of `repo`.
  pub async fn latest(&self, repo: &str, kernel_id: Option<&str>) -> Result<ReleaseRef, ResolveError> {
    let url = format!("{}/repos/{}/releases/latest", self.config.api_base, repo);
    let release: LatestRelease = self
      .client
      .get_json(&url)
      .await
      .map_err(|source| ResolveError::LatestRelease {
        repo: repo.to_string(),
        source,
      })?;

    let tag = release
      .tag_name
      .filter(|t| !t.trim().is_empty())
      .ok_or_else(|| ResolveError::MissingTag { repo: repo.to_string() })?;
    let version = normalize_tag(&tag, kernel_id);
    if version.is_empty() {
      return Err(ResolveError::MissingTag { repo: repo.to_string() });
    }

    debug!(repo, tag = %tag, version = %version, "resolved latest release");
    Ok(ReleaseRef { version, tag })
  }

  /// Use `pinned` when given, else the latest release.
  pub async fn resolve_version(
    &self,
    repo: &str,
    kind: KernelKind,
    pinned: Option<&str>,
  ) -> Result<ReleaseRef, ResolveError> {
    match pinned {
      Some(version) => Ok(ReleaseRef::pinned(version)),
      None => self.latest(repo, Some(kind.id())).await,
    }
  }

  /// Conventional download URL for `asset` in `release`.
  pub fn asset_url(&self, repo: &str, release: &ReleaseRef, asset: &str) -> String {
    format!(
      "{}/{}/releases/download/{}/{}",
      self.config.download_base, repo, release.tag, asset
    )
  }

  /// The release manifest of `release`, from cache or the network.
  ///
  /// Absence is not an error: callers fall back to conventional names.
  pub async fn release_manifest(&self, repo: &str, release: &ReleaseRef) -> Option<ReleaseManifest> {
    let cache = manifest::cache_path(&self.config.releases_dir(), repo, &release.version);
    if let Some(cached) = manifest::read_cached(&cache) {
      return Some(cached);
    }

    let url = self.asset_url(repo, release, RELEASE_MANIFEST_ASSET);
    match self.client.get_json::<ReleaseManifest>(&url).await {
      Ok(fetched) => {
        manifest::write_cached(&cache, &fetched);
        Some(fetched)
      }
      Err(e) if e.status() == Some(404) => {
        debug!(repo, tag = %release.tag, "release has no manifest");
        None
      }
      Err(e) => {
        warn!(repo, tag = %release.tag, error = %e, "could not fetch release manifest, using conventional asset names");
        None
      }
    }
  }

  /// Resolve the assets of `kind` for `platform` in `release`.
  pub async fn resolve_assets(
    &self,
    repo: &str,
    release: &ReleaseRef,
    kind: KernelKind,
    platform: Platform,
  ) -> KernelAssets {
    let exact = kind.primary_asset_name(platform);
    let prefix = kind.primary_asset_prefix(platform);
    let manifest = self.release_manifest(repo, release).await;

    let primary = manifest
      .as_ref()
      .and_then(|m| m.find_asset(kind.id(), &exact, &prefix))
      .map(|a| Asset {
        name: a.name.clone(),
        url: a.download_url.clone(),
      })
      .unwrap_or_else(|| Asset {
        url: self.asset_url(repo, release, &exact),
        name: exact.clone(),
      });

    let source = kind.source_asset_name().map(|name| {
      manifest
        .as_ref()
        .and_then(|m| m.find_named(kind.id(), name))
        .map(|a| Asset {
          name: a.name.clone(),
          url: a.download_url.clone(),
        })
        .unwrap_or_else(|| Asset {
          name: name.to_string(),
          url: self.asset_url(repo, release, name),
        })
    });

    info!(kind = %kind, version = %release.version, asset = %primary.name, "resolved release assets");
    KernelAssets {
      release: release.clone(),
      primary,
      source,
    }
  }
}
