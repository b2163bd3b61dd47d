//! Manifest types for runkit.
//!
//! # Example
//!
//! ```json
//! {
//!   "defaultKernel": "native",
//!   "installedKernels": [
//!     { "id": "native", "version": "1.4.0", "path": "/home/me/.local/share/runkit/bin/native" }
//!   ],
//!   "lastUpdateCheck": 1760000000
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One installed kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelEntry {
  pub id: String,
  pub version: Option<String>,
  pub path: PathBuf,
  /// Release repository given with `--repo`; updates follow it.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
  #[serde(default)]
  pub default_kernel: Option<String>,
  #[serde(default)]
  pub installed_kernels: Vec<KernelEntry>,
  /// Unix seconds of the last kernel update check.
  #[serde(default)]
  pub last_update_check: Option<u64>,
}

impl Manifest {
  pub fn get(&self, id: &str) -> Option<&KernelEntry> {
    self.installed_kernels.iter().find(|k| k.id == id)
  }

  pub fn exists(&self, id: &str) -> bool {
    self.get(id).is_some()
  }

  /// The entry `defaultKernel` points at, if any.
  pub fn default_entry(&self) -> Option<&KernelEntry> {
    self.default_kernel.as_deref().and_then(|id| self.get(id))
  }

  /// Insert or replace the entry for `id`, keeping its list position.
  ///
  /// Becomes the default when no default is set.
  pub fn upsert(&mut self, id: &str, version: Option<&str>, path: &Path) {
    self.put(KernelEntry {
      id: id.to_string(),
      version: version.map(str::to_string),
      path: path.to_path_buf(),
      repo: None,
    });
  }

  /// [`Manifest::upsert`] with a fully built entry.
  pub fn put(&mut self, entry: KernelEntry) {
    if self.default_kernel.is_none() {
      self.default_kernel = Some(entry.id.clone());
    }

    match self.installed_kernels.iter_mut().find(|k| k.id == entry.id) {
      Some(existing) => *existing = entry,
      None => self.installed_kernels.push(entry),
    }
  }

  /// Remove the entry for `id`, returning it.
  ///
  /// Removing the default hands the default to the first remaining entry.
  pub fn remove(&mut self, id: &str) -> Option<KernelEntry> {
    let index = self.installed_kernels.iter().position(|k| k.id == id)?;
    let removed = self.installed_kernels.remove(index);

    if self.default_kernel.as_deref() == Some(id) {
      self.default_kernel = self.installed_kernels.first().map(|k| k.id.clone());
    }

    Some(removed)
  }

  /// Enforce the manifest invariants, returning a description of each repair.
  ///
  /// Duplicate ids keep their first occurrence; a default that names no
  /// entry moves to the first entry (or null).
  pub fn repair(&mut self) -> Vec<String> {
    let mut repairs = Vec::new();

    let mut seen = HashSet::new();
    self.installed_kernels.retain(|k| {
      let first = seen.insert(k.id.clone());
      if !first {
        repairs.push(format!("dropped duplicate entry for kernel '{}'", k.id));
      }
      first
    });

    if let Some(default) = &self.default_kernel
      && !seen.contains(default)
    {
      repairs.push(format!("default kernel '{}' is not installed", default));
      self.default_kernel = self.installed_kernels.first().map(|k| k.id.clone());
    }

    repairs
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(manifest: &Manifest) -> Vec<&str> {
    manifest.installed_kernels.iter().map(|k| k.id.as_str()).collect()
  }

  #[test]
  fn first_upsert_becomes_default() {
    let mut manifest = Manifest::default();
    manifest.upsert("native", Some("1.0.0"), Path::new("/bin/native"));
    manifest.upsert("jvm", Some("2.0.0"), Path::new("/bin/jvm.jar"));

    assert_eq!(manifest.default_kernel.as_deref(), Some("native"));
    assert_eq!(ids(&manifest), ["native", "jvm"]);
  }

  #[test]
  fn upsert_replaces_in_place() {
    let mut manifest = Manifest::default();
    manifest.upsert("native", Some("1.0.0"), Path::new("/bin/native"));
    manifest.upsert("jvm", Some("2.0.0"), Path::new("/bin/jvm.jar"));
    manifest.upsert("native", Some("1.1.0"), Path::new("/bin/native"));

    assert_eq!(ids(&manifest), ["native", "jvm"]);
    assert_eq!(manifest.get("native").unwrap().version.as_deref(), Some("1.1.0"));
  }

  #[test]
  fn install_sequences_never_duplicate_ids() {
    let mut manifest = Manifest::default();
    let sequence = ["native", "jvm", "native", "python", "jvm", "jvm", "native"];
    for (i, id) in sequence.iter().enumerate() {
      manifest.upsert(id, Some(&format!("0.{i}.0")), Path::new("/bin/x"));
      let mut unique = ids(&manifest);
      unique.sort();
      unique.dedup();
      assert_eq!(unique.len(), manifest.installed_kernels.len());
    }
  }

  #[test]
  fn removing_default_reassigns_to_first_remaining() {
    let mut manifest = Manifest::default();
    manifest.upsert("native", None, Path::new("/bin/native"));
    manifest.upsert("jvm", None, Path::new("/bin/jvm.jar"));
    manifest.upsert("python", None, Path::new("/bin/python.sh"));

    manifest.remove("native");
    assert_eq!(manifest.default_kernel.as_deref(), Some("jvm"));

    manifest.remove("jvm");
    assert_eq!(manifest.default_kernel.as_deref(), Some("python"));

    manifest.remove("python");
    assert_eq!(manifest.default_kernel, None);
  }

  #[test]
  fn removing_non_default_keeps_default() {
    let mut manifest = Manifest::default();
    manifest.upsert("native", None, Path::new("/bin/native"));
    manifest.upsert("jvm", None, Path::new("/bin/jvm.jar"));

    assert!(manifest.remove("jvm").is_some());
    assert!(manifest.remove("jvm").is_none());
    assert_eq!(manifest.default_kernel.as_deref(), Some("native"));
  }

  #[test]
  fn repair_fixes_duplicates_and_dangling_default() {
    let mut manifest = Manifest {
      default_kernel: Some("ghost".to_string()),
      installed_kernels: vec![
        KernelEntry {
          id: "jvm".to_string(),
          version: Some("1".to_string()),
          path: PathBuf::from("/a"),
          repo: None,
        },
        KernelEntry {
          id: "jvm".to_string(),
          version: Some("2".to_string()),
          path: PathBuf::from("/b"),
          repo: None,
        },
      ],
      last_update_check: None,
    };

    let repairs = manifest.repair();

    assert_eq!(repairs.len(), 2);
    assert_eq!(manifest.installed_kernels.len(), 1);
    assert_eq!(manifest.get("jvm").unwrap().version.as_deref(), Some("1"));
    assert_eq!(manifest.default_kernel.as_deref(), Some("jvm"));
  }

  #[test]
  fn serializes_with_camel_case_keys() {
    let mut manifest = Manifest::default();
    manifest.upsert("native", Some("1.0.0"), Path::new("/bin/native"));

    let json = serde_json::to_value(&manifest).unwrap();
    assert_eq!(json["defaultKernel"], "native");
    assert_eq!(json["installedKernels"][0]["id"], "native");
    assert_eq!(json["installedKernels"][0]["version"], "1.0.0");
    assert!(json["lastUpdateCheck"].is_null());
  }
}
