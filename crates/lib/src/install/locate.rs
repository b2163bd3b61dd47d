//! Finding the installable artifact inside an extracted release.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

fn files(root: &Path) -> impl Iterator<Item = DirEntry> {
  WalkDir::new(root)
    .sort_by_file_name()
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
}

/// The shallowest file under `root` named exactly `name`.
pub fn find_file_named(root: &Path, name: &str) -> Option<PathBuf> {
  files(root)
    .filter(|e| e.file_name() == name)
    .min_by_key(|e| e.depth())
    .map(DirEntry::into_path)
}

/// Locate a native kernel binary: `binary_name` first, then a file named
/// after the kernel id with or without an extension.
pub fn find_native(root: &Path, binary_name: &str, id: &str) -> Option<PathBuf> {
  find_file_named(root, binary_name).or_else(|| {
    files(root)
      .filter(|e| {
        let path = e.path();
        path.file_name().is_some_and(|n| n == id) || path.file_stem().is_some_and(|s| s == id)
      })
      .min_by_key(|e| e.depth())
      .map(DirEntry::into_path)
  })
}

/// All `.jar` files under `root`.
pub fn find_jars(root: &Path) -> Vec<PathBuf> {
  files(root)
    .filter(|e| {
      e.path()
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
    })
    .map(DirEntry::into_path)
    .collect()
}
