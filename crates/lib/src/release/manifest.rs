//! The `release-manifest.json` asset attached to kernel releases.
//!
//! ```json
//! {
//!   "kernels": {
//!     "native": {
//!       "assets": [
//!         { "name": "native-kernel-x86_64-linux.tar.gz", "download_url": "https://..." }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Manifests are immutable per release, so each one is fetched at most once
//! and kept under `<cache>/releases/<repo hash>/<version>.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::util::fs::{read_json_lenient, write_json_atomic};
use crate::util::hash::short_hash;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
  #[serde(default)]
  pub kernels: BTreeMap<String, KernelAssetList>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelAssetList {
  #[serde(default)]
  pub assets: Vec<ManifestAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAsset {
  pub name: String,
  #[serde(alias = "url")]
  pub download_url: String,
}

impl ReleaseManifest {
  /// Pick the asset for `kind_id`: an exact name match first, then the first
  /// asset whose name starts with `prefix`.
  pub fn find_asset(&self, kind_id: &str, exact: &str, prefix: &str) -> Option<&ManifestAsset> {
    let assets = &self.kernels.get(kind_id)?.assets;
    assets
      .iter()
      .find(|a| a.name == exact)
      .or_else(|| assets.iter().find(|a| a.name.starts_with(prefix)))
  }

  /// Look up an asset by exact name across the `kind_id` entry.
  pub fn find_named(&self, kind_id: &str, name: &str) -> Option<&ManifestAsset> {
    self.kernels.get(kind_id)?.assets.iter().find(|a| a.name == name)
  }
}

/// Cache location for the manifest of `repo` at `version`.
pub fn cache_path(releases_dir: &Path, repo: &str, version: &str) -> PathBuf {
  releases_dir
    .join(short_hash(repo.as_bytes()))
    .join(format!("{}.json", version))
}

pub fn read_cached(path: &Path) -> Option<ReleaseManifest> {
  let manifest = read_json_lenient(path)?;
  debug!(path = %path.display(), "using cached release manifest");
  Some(manifest)
}

/// Best-effort: a cache that cannot be written only costs a refetch.
pub fn write_cached(path: &Path, manifest: &ReleaseManifest) {
  if let Err(e) = write_json_atomic(path, manifest) {
    warn!(path = %path.display(), error = %e, "failed to cache release manifest");
  }
}
