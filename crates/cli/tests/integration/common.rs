//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Nothing listens here; tests that must not touch the network point at it.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Isolated test environment.
///
/// Each test gets its own state and cache directories; auto-update is off and
/// HTTP goes nowhere unless a test points it at a mock server.
pub struct TestEnv {
  pub temp: TempDir,
  pub server_url: String,
}

impl TestEnv {
  pub fn new() -> Self {
    Self::with_server(UNREACHABLE)
  }

  pub fn with_server(url: &str) -> Self {
    Self {
      temp: TempDir::new().unwrap(),
      server_url: url.to_string(),
    }
  }

  pub fn state_path(&self) -> PathBuf {
    let p = self.temp.path().join("state");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn cache_path(&self) -> PathBuf {
    let p = self.temp.path().join("cache");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn bin_path(&self) -> PathBuf {
    self.state_path().join("bin")
  }

  pub fn manifest_path(&self) -> PathBuf {
    self.state_path().join("manifest.json")
  }

  pub fn manifest(&self) -> serde_json::Value {
    let content = std::fs::read_to_string(self.manifest_path()).unwrap();
    serde_json::from_str(&content).unwrap()
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Write an executable shell script relative to the temp directory.
  #[cfg(unix)]
  pub fn write_script(&self, relative_path: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = self.write_file(relative_path, &format!("#!/bin/sh\n{}", body));
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
  }

  /// Get a pre-configured Command for the runkit binary.
  pub fn runkit_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("runkit");
    for var in ["RUNKIT_BIN_DIR", "RUNKIT_MANIFEST", "RUNKIT_REPO", "RUNKIT_RUN_TIMEOUT", "GITHUB_TOKEN", "RUST_LOG"] {
      cmd.env_remove(var);
    }
    cmd.env("RUNKIT_HOME", self.state_path());
    cmd.env("RUNKIT_CACHE_DIR", self.cache_path());
    cmd.env("RUNKIT_NO_AUTO_UPDATE", "1");
    cmd.env("RUNKIT_API_URL", &self.server_url);
    cmd.env("RUNKIT_DOWNLOAD_URL", &self.server_url);
    cmd
  }

  /// Install `path` under `id` through the CLI.
  pub fn install_local(&self, id: &str, path: &Path) {
    self
      .runkit_cmd()
      .args(["kernel", "install", id, "--path"])
      .arg(path)
      .assert()
      .success();
  }
}
