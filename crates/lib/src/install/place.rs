//! Destination naming and atomic placement into the bin directory.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::kernel::KernelKind;
use crate::platform::Platform;
use crate::platform::permissions::{clear_trust_marker, set_executable};

/// Extensions that decide how a kernel is launched and so survive placement.
const INVOCATION_EXTENSIONS: &[&str] = &["jar", "py", "js", "mjs", "cjs", "sh", "cmd", "bat", "ps1", "exe"];

/// `<bin>/<id>` plus the artifact's extension when it affects invocation.
pub fn destination(bin_dir: &Path, id: &str, artifact: &Path) -> PathBuf {
  let ext = artifact
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase())
    .filter(|e| INVOCATION_EXTENSIONS.contains(&e.as_str()));

  match ext {
    Some(ext) => bin_dir.join(format!("{}.{}", id, ext)),
    None => bin_dir.join(id),
  }
}

/// Where a release install of `kind` will land, known before any download.
pub fn release_destination(bin_dir: &Path, kind: KernelKind, platform: Platform) -> PathBuf {
  let id = kind.id();
  match kind {
    KernelKind::Native => bin_dir.join(format!("{}{}", id, platform.exe_suffix())),
    KernelKind::Jvm => bin_dir.join(format!("{}.jar", id)),
    KernelKind::Python if platform.is_windows() => bin_dir.join(format!("{}.cmd", id)),
    KernelKind::Python => bin_dir.join(format!("{}.sh", id)),
  }
}

/// Copy `artifact` next to `dest`, mark it executable and rename it over `dest`.
pub fn place(artifact: &Path, dest: &Path) -> io::Result<()> {
  let dir = dest.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
  std::fs::create_dir_all(dir)?;

  let mut temp = tempfile::Builder::new().prefix(".placing-").tempfile_in(dir)?;
  let mut source = File::open(artifact)?;
  io::copy(&mut source, temp.as_file_mut())?;
  temp.as_file().sync_all()?;

  set_executable(temp.path()).map_err(io::Error::other)?;
  temp.persist(dest).map_err(|e| e.error)?;

  debug!(from = %artifact.display(), to = %dest.display(), "placed kernel");
  Ok(())
}

/// Platform fix-ups after placement. Never fatal.
pub fn post_process(dest: &Path) {
  if let Err(e) = clear_trust_marker(dest) {
    warn!(path = %dest.display(), error = %e, "could not clear quarantine attribute");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::{arch::Arch, os::Os};
  use crate::util::testutil::write_file;
  use tempfile::TempDir;

  #[test]
  fn destination_keeps_meaningful_extensions_only() {
    let bin = Path::new("/bin");
    assert_eq!(destination(bin, "jvm", Path::new("/t/kernel-1.0.jar")), bin.join("jvm.jar"));
    assert_eq!(destination(bin, "py", Path::new("/t/wrapper.SH")), bin.join("py.sh"));
    assert_eq!(destination(bin, "native", Path::new("/t/native-kernel")), bin.join("native"));
    assert_eq!(destination(bin, "k", Path::new("/t/k.1.2.3")), bin.join("k"));
  }

  #[test]
  fn release_destination_matches_located_artifacts() {
    let bin = Path::new("/bin");
    let linux = Platform::new(Arch::X86_64, Os::Linux);
    let windows = Platform::new(Arch::X86_64, Os::Windows);

    assert_eq!(release_destination(bin, KernelKind::Native, linux), bin.join("native"));
    assert_eq!(release_destination(bin, KernelKind::Native, windows), bin.join("native.exe"));
    assert_eq!(release_destination(bin, KernelKind::Jvm, linux), bin.join("jvm.jar"));
    assert_eq!(release_destination(bin, KernelKind::Python, windows), bin.join("python.cmd"));
  }

  #[test]
  fn place_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let dest = write_file(temp.path(), "bin/native", b"old");
    let artifact = write_file(temp.path(), "staging/native-kernel", b"new");

    place(&artifact, &dest).unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    assert!(artifact.exists());
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      assert_eq!(std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777, 0o755);
    }
  }
}
