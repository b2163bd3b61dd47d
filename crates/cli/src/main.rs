use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::{
  KernelInstallArgs, cmd_cache_clean, cmd_kernel_default, cmd_kernel_install, cmd_kernel_ls, cmd_kernel_remove,
  cmd_run, cmd_self_update, cmd_version,
};
use output::{OutputFormat, print_error};

/// runkit - install kernels and run composes on them
#[derive(Parser)]
#[command(name = "runkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Manage installed kernels
  Kernel {
    #[command(subcommand)]
    command: KernelCommands,
  },

  /// Run a compose on a kernel
  Run {
    /// Kernel to run on (default kernel if omitted)
    #[arg(short, long)]
    kernel: Option<String>,

    /// Compose file followed by key=value arguments and kernel flags
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
  },

  /// Manage the download cache
  Cache {
    #[command(subcommand)]
    command: CacheCommands,
  },

  /// Show the runkit version and the latest known release
  Version,

  /// Update runkit to the latest release now
  SelfUpdate,
}

#[derive(Subcommand)]
enum KernelCommands {
  /// Install a kernel from a release or a local file
  Install {
    /// Kernel id (native, python, jvm, or a custom name with --path)
    id: String,

    /// Local binary or archive to install
    #[arg(long, conflicts_with = "from_release")]
    path: Option<PathBuf>,

    /// Install from the release repository (default without --path)
    #[arg(long)]
    from_release: bool,

    /// Version to install (latest if omitted)
    #[arg(long)]
    version: Option<String>,

    /// Target platform, e.g. x86_64-linux (host if omitted)
    #[arg(long)]
    platform: Option<String>,

    /// Release repository as owner/repo
    #[arg(long)]
    repo: Option<String>,

    /// Reinstall even if the same version is present
    #[arg(short, long)]
    force: bool,
  },

  /// List installed kernels
  Ls {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Remove an installed kernel
  Remove {
    /// Kernel id
    id: String,
  },

  /// Set the default kernel
  Default {
    /// Kernel id
    id: String,
  },
}

#[derive(Subcommand)]
enum CacheCommands {
  /// Delete downloads, release manifests and update records
  Clean,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Kernel { command } => match command {
      KernelCommands::Install {
        id,
        path,
        from_release: _,
        version,
        platform,
        repo,
        force,
      } => cmd_kernel_install(KernelInstallArgs {
        id,
        path,
        version,
        platform,
        repo,
        force,
      }),
      KernelCommands::Ls { output } => cmd_kernel_ls(output),
      KernelCommands::Remove { id } => cmd_kernel_remove(&id),
      KernelCommands::Default { id } => cmd_kernel_default(&id),
    }
    .map(|_| ExitCode::SUCCESS),
    Commands::Run { kernel, args } => cmd_run(kernel.as_deref(), args),
    Commands::Cache { command } => match command {
      CacheCommands::Clean => cmd_cache_clean().map(|_| ExitCode::SUCCESS),
    },
    Commands::Version => cmd_version().map(|_| ExitCode::SUCCESS),
    Commands::SelfUpdate => cmd_self_update().map(|_| ExitCode::SUCCESS),
  };

  match result {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
