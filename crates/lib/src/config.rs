//! Runtime configuration.
//!
//! All environment-derived settings are read once into a [`Config`] which is
//! then passed to each component. Nothing below this module reads `RUNKIT_*`
//! variables on its own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::consts::{
  DEFAULT_API_BASE, DEFAULT_DOWNLOAD_BASE, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_REPO, DEFAULT_UPDATE_INTERVAL_SECS,
};
use crate::kernel::KernelKind;
use crate::platform::paths;

pub const ENV_HOME: &str = "RUNKIT_HOME";
pub const ENV_BIN_DIR: &str = "RUNKIT_BIN_DIR";
pub const ENV_CACHE_DIR: &str = "RUNKIT_CACHE_DIR";
pub const ENV_MANIFEST: &str = "RUNKIT_MANIFEST";
pub const ENV_UPDATE_INTERVAL: &str = "RUNKIT_UPDATE_INTERVAL";
pub const ENV_NO_AUTO_UPDATE: &str = "RUNKIT_NO_AUTO_UPDATE";
pub const ENV_REPO: &str = "RUNKIT_REPO";
pub const ENV_SELF_REPO: &str = "RUNKIT_SELF_REPO";
pub const ENV_API_URL: &str = "RUNKIT_API_URL";
pub const ENV_DOWNLOAD_URL: &str = "RUNKIT_DOWNLOAD_URL";
pub const ENV_HTTP_TIMEOUT: &str = "RUNKIT_HTTP_TIMEOUT";
pub const ENV_RUN_TIMEOUT: &str = "RUNKIT_RUN_TIMEOUT";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_JAVA_HOME: &str = "JAVA_HOME";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  /// An environment override holds a value that cannot be interpreted.
  #[error("configuration corrupt: {var}={value:?} ({reason})")]
  Corrupt {
    var: String,
    value: String,
    reason: &'static str,
  },

  #[error("cannot determine a default {what} directory; set {var}")]
  NoDefaultDir { what: &'static str, var: &'static str },
}

#[derive(Debug, Clone)]
pub struct Config {
  /// Root for persistent state: manifest, lock, runtimes.
  pub state_dir: PathBuf,
  /// Where kernel executables are placed.
  pub bin_dir: PathBuf,
  /// Downloads, release manifests and update records.
  pub cache_dir: PathBuf,
  pub manifest_path: PathBuf,
  pub update_interval: Duration,
  pub auto_update: bool,
  pub default_repo: String,
  /// Per-kind repository overrides (`RUNKIT_REPO_<KIND>`).
  pub kind_repos: BTreeMap<KernelKind, String>,
  /// Repository runkit itself is released from.
  pub self_repo: String,
  pub api_base: String,
  pub download_base: String,
  pub http_timeout: Duration,
  pub run_timeout: Option<Duration>,
  pub github_token: Option<String>,
  /// JDK used to launch `.jar` kernels; `java` from `PATH` when unset.
  pub java_home: Option<PathBuf>,
}

impl Config {
  /// Build the configuration from the process environment.
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Build the configuration from an arbitrary variable lookup.
  ///
  /// Directory defaults that are not overridden fall back to the platform
  /// locations in [`crate::platform::paths`].
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let state_dir = match get(ENV_HOME) {
      Some(dir) => PathBuf::from(dir),
      None => paths::data_dir().ok_or(ConfigError::NoDefaultDir {
        what: "state",
        var: ENV_HOME,
      })?,
    };
    let cache_dir = match get(ENV_CACHE_DIR) {
      Some(dir) => PathBuf::from(dir),
      None => paths::cache_dir().ok_or(ConfigError::NoDefaultDir {
        what: "cache",
        var: ENV_CACHE_DIR,
      })?,
    };

    let mut config = Self::with_dirs(&state_dir, &cache_dir);

    if let Some(dir) = get(ENV_BIN_DIR) {
      config.bin_dir = PathBuf::from(dir);
    }
    if let Some(path) = get(ENV_MANIFEST) {
      config.manifest_path = PathBuf::from(path);
    }
    if let Some(raw) = get(ENV_UPDATE_INTERVAL) {
      config.update_interval = Duration::from_secs(parse_secs(ENV_UPDATE_INTERVAL, &raw)?);
    }
    if let Some(raw) = get(ENV_NO_AUTO_UPDATE) {
      config.auto_update = !parse_flag(ENV_NO_AUTO_UPDATE, &raw)?;
    }
    if let Some(repo) = get(ENV_REPO) {
      config.default_repo = parse_repo(ENV_REPO, repo)?;
    }
    config.self_repo = match get(ENV_SELF_REPO) {
      Some(repo) => parse_repo(ENV_SELF_REPO, repo)?,
      None => config.default_repo.clone(),
    };
    for kind in KernelKind::ALL {
      if let Some(repo) = get(kind.repo_env_var()) {
        config.kind_repos.insert(kind, parse_repo(kind.repo_env_var(), repo)?);
      }
    }
    if let Some(url) = get(ENV_API_URL) {
      config.api_base = url.trim_end_matches('/').to_string();
    }
    if let Some(url) = get(ENV_DOWNLOAD_URL) {
      config.download_base = url.trim_end_matches('/').to_string();
    }
    if let Some(raw) = get(ENV_HTTP_TIMEOUT) {
      config.http_timeout = Duration::from_secs(parse_secs(ENV_HTTP_TIMEOUT, &raw)?);
    }
    if let Some(raw) = get(ENV_RUN_TIMEOUT) {
      config.run_timeout = Some(Duration::from_secs(parse_secs(ENV_RUN_TIMEOUT, &raw)?));
    }
    config.github_token = get(ENV_GITHUB_TOKEN);
    config.java_home = get(ENV_JAVA_HOME).map(PathBuf::from);

    Ok(config)
  }

  /// Defaults rooted at explicit state and cache directories.
  pub fn with_dirs(state_dir: &Path, cache_dir: &Path) -> Self {
    Self {
      state_dir: state_dir.to_path_buf(),
      bin_dir: state_dir.join("bin"),
      cache_dir: cache_dir.to_path_buf(),
      manifest_path: state_dir.join("manifest.json"),
      update_interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS),
      auto_update: true,
      default_repo: DEFAULT_REPO.to_string(),
      kind_repos: BTreeMap::new(),
      self_repo: DEFAULT_REPO.to_string(),
      api_base: DEFAULT_API_BASE.to_string(),
      download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
      http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
      run_timeout: None,
      github_token: None,
      java_home: None,
    }
  }

  /// Repository kernels of `kind` are released from.
  pub fn repo_for(&self, kind: KernelKind) -> &str {
    self.kind_repos.get(&kind).map(String::as_str).unwrap_or(&self.default_repo)
  }

  pub fn downloads_dir(&self) -> PathBuf {
    self.cache_dir.join("downloads")
  }

  pub fn releases_dir(&self) -> PathBuf {
    self.cache_dir.join("releases")
  }

  pub fn runtimes_dir(&self) -> PathBuf {
    self.state_dir.join("runtimes")
  }
}

fn parse_secs(var: &str, raw: &str) -> Result<u64, ConfigError> {
  raw.trim().parse::<u64>().map_err(|_| ConfigError::Corrupt {
    var: var.to_string(),
    value: raw.to_string(),
    reason: "expected a whole number of seconds",
  })
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    _ => Err(ConfigError::Corrupt {
      var: var.to_string(),
      value: raw.to_string(),
      reason: "expected 1/0, true/false, yes/no or on/off",
    }),
  }
}

fn parse_repo(var: &str, raw: String) -> Result<String, ConfigError> {
  let repo = raw.trim().trim_matches('/');
  match repo.split_once('/') {
    Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(repo.to_string()),
    _ => Err(ConfigError::Corrupt {
      var: var.to_string(),
      value: raw.clone(),
      reason: "expected <owner>/<repo>",
    }),
  }
}
