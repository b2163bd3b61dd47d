pub mod arch;
pub mod os;
pub mod paths;
pub mod permissions;

use arch::Arch;
use os::Os;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
  #[error("unsupported platform: {os}/{arch} (supported: {supported})")]
  Unsupported {
    os: String,
    arch: String,
    supported: String,
  },

  #[error("invalid platform identifier '{0}' (expected <arch>-<os>, e.g. x86_64-linux)")]
  InvalidIdentifier(String),
}

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  /// Every platform kernels are published for.
  pub const SUPPORTED: [Platform; 6] = [
    Platform::new(Arch::X86_64, Os::Linux),
    Platform::new(Arch::Aarch64, Os::Linux),
    Platform::new(Arch::X86_64, Os::MacOs),
    Platform::new(Arch::Aarch64, Os::MacOs),
    Platform::new(Arch::X86_64, Os::Windows),
    Platform::new(Arch::Aarch64, Os::Windows),
  ];

  /// Create a new platform identifier
  pub const fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Map an (OS, architecture) pair to one of the supported platforms.
  pub fn from_parts(os: &str, arch: &str) -> Result<Self, PlatformError> {
    match (Os::from_name(os), Arch::from_name(arch)) {
      (Some(os), Some(arch)) => Ok(Self { arch, os }),
      _ => Err(PlatformError::Unsupported {
        os: os.to_string(),
        arch: arch.to_string(),
        supported: Self::SUPPORTED.iter().map(|p| p.triple()).collect::<Vec<_>>().join(", "),
      }),
    }
  }

  /// Detect the current platform at runtime
  pub fn current() -> Result<Self, PlatformError> {
    Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }

  pub fn is_windows(&self) -> bool {
    self.os == Os::Windows
  }

  /// Archive extension used for platform-specific release assets.
  pub fn archive_ext(&self) -> &'static str {
    if self.is_windows() { "zip" } else { "tar.gz" }
  }

  /// Executable file suffix on this platform.
  pub fn exe_suffix(&self) -> &'static str {
    if self.is_windows() { ".exe" } else { "" }
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

impl FromStr for Platform {
  type Err = PlatformError;

  /// Parses `<arch>-<os>` identifiers such as `x86_64-linux` or `arm64-macos`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (arch, os) = s
      .split_once('-')
      .ok_or_else(|| PlatformError::InvalidIdentifier(s.to_string()))?;
    Self::from_parts(os, arch)
  }
}

/// Returns the platform triple for the current system (e.g., "aarch64-darwin")
///
/// Returns `None` if the current platform is not supported
pub fn platform_triple() -> Option<String> {
  Platform::current().ok().map(|p| p.triple())
}
