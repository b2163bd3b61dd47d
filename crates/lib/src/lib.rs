//! runkit-lib: core logic for runkit.
//!
//! runkit installs per-platform runtime executables ("kernels") from release
//! assets or local files and dispatches compose workloads to them:
//! - `manifest`: the persistent record of installed kernels
//! - `release`: platform, version and asset resolution
//! - `install`: the fetch/extract/locate/place pipeline
//! - `update`: interval-gated self-update and kernel auto-update
//! - `run`: argument translation, execution and result extraction

pub mod archive;
pub mod config;
pub mod consts;
pub mod fetch;
pub mod install;
pub mod kernel;
pub mod manifest;
pub mod platform;
pub mod release;
pub mod run;
pub mod store_lock;
pub mod update;
pub mod util;

/// Current Unix time in seconds.
pub fn now_unix() -> u64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}
