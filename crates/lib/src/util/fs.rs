//! Atomic file replacement and JSON record persistence.
//!
//! Every state file runkit owns is written to a sibling temp file first and
//! then renamed over the target, so readers never observe a partial write.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Replace `path` with `contents` via a temp file in the same directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
  let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
  std::fs::create_dir_all(dir)?;

  let mut temp = tempfile::NamedTempFile::new_in(dir)?;
  temp.write_all(contents)?;
  temp.as_file().sync_all()?;
  temp.persist(path).map_err(|e| e.error)?;

  debug!(path = %path.display(), bytes = contents.len(), "wrote file atomically");
  Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
  let mut content = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
  content.push(b'\n');
  write_atomic(path, &content)
}

/// Read a JSON record, treating a missing or unparsable file as absent.
///
/// Unparsable files are logged; callers rewrite them on their next save.
pub fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> Option<T> {
  let content = match std::fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
    Err(e) => {
      warn!(path = %path.display(), error = %e, "failed to read record, ignoring");
      return None;
    }
  };

  match serde_json::from_str(&content) {
    Ok(value) => Some(value),
    Err(e) => {
      warn!(path = %path.display(), error = %e, "ignoring corrupt record");
      None
    }
  }
}
