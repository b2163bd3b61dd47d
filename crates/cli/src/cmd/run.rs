//! Implementation of the `runkit run` command.
//!
//! Selects the kernel, gives the auto-updater a chance to refresh runkit and
//! that kernel, then runs the compose and prints the kernel's JSON result.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::warn;

use runkit_lib::fetch::HttpClient;
use runkit_lib::run::Dispatcher;
use runkit_lib::update::{self, AutoUpdateReport, KernelUpdateOutcome, SelfUpdateOutcome};

use super::{check_manifest, load_config, runtime};
use crate::output::{print_notice, print_warning, symbols, write_streams};

pub fn cmd_run(kernel: Option<&str>, args: Vec<String>) -> Result<ExitCode> {
  let config = load_config()?;
  check_manifest(&config)?;
  let rt = runtime()?;

  let dispatcher = Dispatcher::new(&config);
  let entry = dispatcher.select(kernel)?;

  if config.auto_update {
    match HttpClient::new(&config) {
      Ok(client) => {
        let report = rt.block_on(update::before_run(&config, &client, &entry.id));
        report_updates(&report);
      }
      Err(e) => warn!(error = %e, "skipping auto-update"),
    }
  }

  // The update pass may have moved the kernel.
  let entry = dispatcher.select(Some(&entry.id))?;
  let output = rt
    .block_on(dispatcher.dispatch(&entry, &args))
    .with_context(|| format!("Failed to run kernel '{}'", entry.id))?;

  write_streams(&output.projection.stdout(), output.projection.stderr())?;

  Ok(ExitCode::from(u8::try_from(output.code).unwrap_or(1)))
}

fn report_updates(report: &AutoUpdateReport) {
  if let Some(SelfUpdateOutcome::Updated { from, to }) = &report.tool {
    print_notice(&format!(
      "runkit updated {} {} {}; the new version takes effect on the next command",
      from,
      symbols::ARROW,
      to
    ));
  }

  match &report.kernel {
    KernelUpdateOutcome::Updated { from, to } => {
      print_notice(&format!("Kernel updated {} {} {}", from, symbols::ARROW, to));
    }
    KernelUpdateOutcome::Failed { version, error } => {
      print_warning(&format!("Kernel update failed, staying on {}: {}", version, error));
    }
    _ => {}
  }
}
