//! Kernel kinds and their packaging conventions.
//!
//! Each built-in kind has a fixed id, a conventional set of release asset
//! names, and a flag under which it receives inline compose arguments.

use std::fmt;

use crate::platform::Platform;

/// Flag carrying the inline JSON argument object for most kernels.
pub const ARGS_FLAG: &str = "--args";

/// Flag carrying the inline JSON argument object for script-runtime kernels.
pub const SCRIPT_ARGS_FLAG: &str = "--args-json";

/// Runtime family of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KernelKind {
  /// A self-contained native executable per platform.
  Native,
  /// Python sources plus a prebuilt interpreter per platform.
  Python,
  /// A single `.jar` package run by the host JVM.
  Jvm,
}

impl KernelKind {
  pub const ALL: [KernelKind; 3] = [KernelKind::Native, KernelKind::Python, KernelKind::Jvm];

  /// Map a kernel id to a built-in kind.
  pub fn from_id(id: &str) -> Option<Self> {
    match id {
      "native" => Some(Self::Native),
      "python" => Some(Self::Python),
      "jvm" => Some(Self::Jvm),
      _ => None,
    }
  }

  pub fn id(&self) -> &'static str {
    match self {
      Self::Native => "native",
      Self::Python => "python",
      Self::Jvm => "jvm",
    }
  }

  /// Environment variable overriding the release repository for this kind.
  pub fn repo_env_var(&self) -> &'static str {
    match self {
      Self::Native => "RUNKIT_REPO_NATIVE",
      Self::Python => "RUNKIT_REPO_PYTHON",
      Self::Jvm => "RUNKIT_REPO_JVM",
    }
  }

  /// Stem shared by all primary asset names of this kind.
  fn asset_stem(&self) -> &'static str {
    match self {
      Self::Native => "native-kernel",
      Self::Python => "python-runtime",
      Self::Jvm => "jvm-kernel",
    }
  }

  /// Whether the primary asset differs per platform.
  pub fn is_platform_specific(&self) -> bool {
    !matches!(self, Self::Jvm)
  }

  /// Conventional file name of the primary release asset.
  pub fn primary_asset_name(&self, platform: Platform) -> String {
    match self {
      Self::Native => format!("{}-{}.{}", self.asset_stem(), platform, platform.archive_ext()),
      Self::Python => format!("{}-{}.tar.gz", self.asset_stem(), platform),
      Self::Jvm => format!("{}.zip", self.asset_stem()),
    }
  }

  /// Prefix a platform-qualified primary asset name starts with.
  pub fn primary_asset_prefix(&self, platform: Platform) -> String {
    if self.is_platform_specific() {
      format!("{}-{}", self.asset_stem(), platform)
    } else {
      self.asset_stem().to_string()
    }
  }

  /// Conventional name of the companion source archive, for kinds that ship one.
  pub fn source_asset_name(&self) -> Option<&'static str> {
    match self {
      Self::Python => Some("python-kernel-src.tar.gz"),
      _ => None,
    }
  }

  /// Name of the executable expected inside a native archive.
  pub fn binary_name(&self, platform: Platform) -> String {
    format!("{}{}", self.asset_stem(), platform.exe_suffix())
  }

  /// Flag under which the kernel receives the inline argument object.
  pub fn args_flag(&self) -> &'static str {
    match self {
      Self::Python => SCRIPT_ARGS_FLAG,
      _ => ARGS_FLAG,
    }
  }
}

impl fmt::Display for KernelKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.id())
  }
}
