//! Dispatching compose workloads to installed kernels.
//!
//! A run selects a kernel from the manifest, translates the user's arguments
//! into the kernel's command line, runs it with stdout captured, and splits
//! the captured output into the JSON result and everything else.

pub mod args;
pub mod invocation;
pub mod output;

use std::path::PathBuf;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::kernel::{ARGS_FLAG, KernelKind};
use crate::manifest::{KernelEntry, Manifest, ManifestError, ManifestStore};

pub use args::translate_args;
pub use invocation::{Invocation, Launcher};
pub use output::{Projection, project_output};

#[derive(Debug, Error)]
pub enum RunError {
  #[error("no kernel selected and no default kernel set; install one with `runkit kernel install`")]
  NoDefaultKernel,

  #[error("kernel '{0}' is not registered")]
  KernelNotRegistered(String),

  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("kernel '{id}' is registered but its binary is missing: {path}")]
  MissingBinary { id: String, path: PathBuf },

  #[error("failed to start {program}: {source}")]
  Spawn {
    program: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("kernel did not finish within {}s", .0.as_secs())]
  Timeout(Duration),

  #[error(transparent)]
  Manifest(#[from] ManifestError),
}

/// Result of one kernel run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
  pub kernel: String,
  /// Exit code to propagate.
  pub code: i32,
  pub projection: Projection,
}

/// Pick the kernel to run: `explicit` beats the manifest default.
pub fn select_kernel(manifest: &Manifest, explicit: Option<&str>) -> Result<KernelEntry, RunError> {
  let id = match explicit {
    Some(id) => id,
    None => manifest.default_kernel.as_deref().ok_or(RunError::NoDefaultKernel)?,
  };
  manifest
    .get(id)
    .cloned()
    .ok_or_else(|| RunError::KernelNotRegistered(id.to_string()))
}

/// Flag the kernel `id` receives its inline arguments under.
pub fn args_flag_for(id: &str) -> &'static str {
  KernelKind::from_id(id).map(|k| k.args_flag()).unwrap_or(ARGS_FLAG)
}

pub struct Dispatcher<'a> {
  config: &'a Config,
  store: ManifestStore,
}

impl<'a> Dispatcher<'a> {
  pub fn new(config: &'a Config) -> Self {
    Self {
      config,
      store: ManifestStore::new(&config.manifest_path),
    }
  }

  /// Resolve the kernel entry a run would use.
  pub fn select(&self, explicit: Option<&str>) -> Result<KernelEntry, RunError> {
    select_kernel(&self.store.load()?, explicit)
  }

  /// Run `entry` with the user's `args`.
  pub async fn dispatch(&self, entry: &KernelEntry, args: &[String]) -> Result<RunOutput, RunError> {
    if !entry.path.is_file() {
      return Err(RunError::MissingBinary {
        id: entry.id.clone(),
        path: entry.path.clone(),
      });
    }

    let translated = translate_args(args, args_flag_for(&entry.id))?;
    let invocation = Invocation::classify(&entry.path, self.config.java_home.as_deref());
    info!(kernel = %entry.id, launcher = ?invocation.launcher, "dispatching");
    debug!(program = %invocation.program.display(), args = ?translated, "kernel command line");

    let (code, stdout) = execute(&invocation, &translated, self.config.run_timeout).await?;

    Ok(RunOutput {
      kernel: entry.id.clone(),
      code,
      projection: project_output(&stdout),
    })
  }
}

/// Run with stdin and stderr inherited and stdout captured.
pub async fn execute(
  invocation: &Invocation,
  args: &[String],
  timeout: Option<Duration>,
) -> Result<(i32, Vec<u8>), RunError> {
  let child = invocation
    .command(args)
    .stdin(Stdio::inherit())
    .stderr(Stdio::inherit())
    .stdout(Stdio::piped())
    .kill_on_drop(true)
    .spawn()
    .map_err(|e| RunError::Spawn {
      program: invocation.program.clone(),
      source: e,
    })?;

  let wait = child.wait_with_output();
  let output = match timeout {
    Some(limit) => tokio::time::timeout(limit, wait)
      .await
      .map_err(|_| RunError::Timeout(limit))?,
    None => wait.await,
  }
  .map_err(|e| RunError::Spawn {
    program: invocation.program.clone(),
    source: e,
  })?;

  let code = exit_code(output.status);
  debug!(code, bytes = output.stdout.len(), "kernel exited");
  Ok((code, output.stdout))
}

/// Exit code of a finished process; signal deaths map to 128 + signal.
pub fn exit_code(status: ExitStatus) -> i32 {
  if let Some(code) = status.code() {
    return code;
  }

  #[cfg(unix)]
  {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = status.signal() {
      return 128 + signal;
    }
  }

  1
}
