//! Manifest persistence.
//!
//! The manifest lives in a single JSON file. Reads never fail because of bad
//! content: a missing or corrupt file is replaced with defaults and the
//! caller is told it was healed. Writes are atomic (temp file + rename);
//! callers serialize concurrent writers with [`crate::store_lock::StateLock`].

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{KernelEntry, Manifest};
use crate::util::fs::write_json_atomic;

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("kernel '{0}' is not registered")]
  KernelNotRegistered(String),

  #[error("failed to read manifest {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write manifest {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// How the manifest was obtained by [`ManifestStore::load_with_outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
  /// Read and valid.
  Loaded,
  /// No file existed; defaults were written.
  Created,
  /// The file was unparsable or violated invariants and has been rewritten.
  Healed { reason: String },
}

#[derive(Debug, Clone)]
pub struct ManifestStore {
  path: PathBuf,
}

impl ManifestStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Load the manifest, self-healing a missing or corrupt file.
  pub fn load(&self) -> Result<Manifest, ManifestError> {
    self.load_with_outcome().map(|(manifest, _)| manifest)
  }

  /// Load the manifest and report whether it had to be created or healed.
  pub fn load_with_outcome(&self) -> Result<(Manifest, LoadOutcome), ManifestError> {
    self.ensure_dir()?;

    let content = match std::fs::read(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "manifest missing, initializing");
        let manifest = Manifest::default();
        self.save(&manifest)?;
        return Ok((manifest, LoadOutcome::Created));
      }
      Err(e) => {
        return Err(ManifestError::Read {
          path: self.path.clone(),
          source: e,
        });
      }
    };

    let mut manifest = match serde_json::from_slice::<Manifest>(&content) {
      Ok(manifest) => manifest,
      Err(e) => return self.reset(&e.to_string()),
    };

    let repairs = manifest.repair();
    if repairs.is_empty() {
      return Ok((manifest, LoadOutcome::Loaded));
    }

    for repair in &repairs {
      warn!(path = %self.path.display(), repair = %repair, "repaired manifest");
    }
    self.save(&manifest)?;
    Ok((
      manifest,
      LoadOutcome::Healed {
        reason: repairs.join("; "),
      },
    ))
  }

  fn reset(&self, error: &str) -> Result<(Manifest, LoadOutcome), ManifestError> {
    warn!(path = %self.path.display(), error, "manifest corrupt, resetting");
    let manifest = Manifest::default();
    self.save(&manifest)?;
    Ok((
      manifest,
      LoadOutcome::Healed {
        reason: format!("manifest was unparsable ({error}); reset to defaults"),
      },
    ))
  }

  pub fn save(&self, manifest: &Manifest) -> Result<(), ManifestError> {
    write_json_atomic(&self.path, manifest).map_err(|e| ManifestError::Write {
      path: self.path.clone(),
      source: e,
    })
  }

  /// Record an installed kernel, replacing any entry with the same id.
  pub fn upsert(&self, id: &str, version: Option<&str>, path: &Path) -> Result<Manifest, ManifestError> {
    self.record(KernelEntry {
      id: id.to_string(),
      version: version.map(str::to_string),
      path: path.to_path_buf(),
      repo: None,
    })
  }

  /// Like [`ManifestStore::upsert`], keeping every field of `entry`.
  pub fn record(&self, entry: KernelEntry) -> Result<Manifest, ManifestError> {
    self.modify(|manifest| {
      info!(
        id = %entry.id,
        version = entry.version.as_deref().unwrap_or("-"),
        path = %entry.path.display(),
        "recorded kernel"
      );
      manifest.put(entry);
      Ok(())
    })
  }

  /// Forget a kernel; the default moves to the first remaining entry.
  pub fn remove(&self, id: &str) -> Result<(KernelEntry, Manifest), ManifestError> {
    let mut removed = None;
    let manifest = self.modify(|manifest| {
      removed = Some(
        manifest
          .remove(id)
          .ok_or_else(|| ManifestError::KernelNotRegistered(id.to_string()))?,
      );
      Ok(())
    })?;
    let removed = removed.ok_or_else(|| ManifestError::KernelNotRegistered(id.to_string()))?;
    info!(id, "removed kernel from manifest");
    Ok((removed, manifest))
  }

  pub fn set_default(&self, id: &str) -> Result<Manifest, ManifestError> {
    self.modify(|manifest| {
      if !manifest.exists(id) {
        return Err(ManifestError::KernelNotRegistered(id.to_string()));
      }
      manifest.default_kernel = Some(id.to_string());
      Ok(())
    })
  }

  /// Record when kernel updates were last checked.
  pub fn touch_update_check(&self, now: u64) -> Result<Manifest, ManifestError> {
    self.modify(|manifest| {
      manifest.last_update_check = Some(now);
      Ok(())
    })
  }

  pub fn exists(&self, id: &str) -> Result<bool, ManifestError> {
    Ok(self.load()?.exists(id))
  }

  pub fn get_path(&self, id: &str) -> Result<Option<PathBuf>, ManifestError> {
    Ok(self.load()?.get(id).map(|k| k.path.clone()))
  }

  pub fn get(&self, id: &str) -> Result<Option<KernelEntry>, ManifestError> {
    Ok(self.load()?.get(id).cloned())
  }

  /// Read-modify-write; nothing is written when `f` fails.
  fn modify<F>(&self, f: F) -> Result<Manifest, ManifestError>
  where
    F: FnOnce(&mut Manifest) -> Result<(), ManifestError>,
  {
    let mut manifest = self.load()?;
    f(&mut manifest)?;
    self.save(&manifest)?;
    Ok(manifest)
  }

  fn ensure_dir(&self) -> Result<(), ManifestError> {
    match self.path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => {
        std::fs::create_dir_all(parent).map_err(|e| ManifestError::Write {
          path: self.path.clone(),
          source: e,
        })
      }
      _ => Ok(()),
    }
  }

  /// Overwrite the file with raw bytes, bypassing validation.
  #[cfg(test)]
  fn write_raw(&self, contents: impl AsRef<[u8]>) {
    crate::util::fs::write_atomic(&self.path, contents.as_ref()).unwrap();
  }
}
