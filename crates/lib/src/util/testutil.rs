//! Test utilities for runkit-lib.
//!
//! Builders for configs rooted in temp directories and for the archives the
//! installer consumes.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::config::Config;

/// A config whose state and cache live under `root`, with auto-update off and
/// all HTTP pointed at `server_url`.
pub fn test_config(root: &Path, server_url: &str) -> Config {
  let mut config = Config::with_dirs(&root.join("state"), &root.join("cache"));
  config.api_base = server_url.to_string();
  config.download_base = server_url.to_string();
  config.auto_update = false;
  config
}

/// Build an in-memory `.tar.gz` from `(path, contents, mode)` entries.
pub fn tar_gz(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
  let encoder = GzEncoder::new(Vec::new(), Compression::default());
  let mut builder = tar::Builder::new(encoder);
  for (path, contents, mode) in entries {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(*mode);
    header.set_cksum();
    builder.append_data(&mut header, path, *contents).unwrap();
  }
  builder.into_inner().unwrap().finish().unwrap()
}

/// Build an in-memory `.zip` from `(path, contents)` entries.
pub fn zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
  let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
  let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
  for (path, contents) in entries {
    writer.start_file(*path, options).unwrap();
    writer.write_all(contents).unwrap();
  }
  writer.finish().unwrap().into_inner()
}

/// Write `contents` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
  let path = dir.join(name);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(&path, contents).unwrap();
  path
}

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}
