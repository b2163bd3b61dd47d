//! Packaging for script-runtime kernels.
//!
//! A script kernel ships as two archives: a prebuilt interpreter tree marked
//! by a `PYTHON.json` descriptor, and the kernel sources with a `main.py`
//! entry point. Both are unpacked into a versioned slot under
//! `<state>/runtimes/python/<version>/` and a small wrapper script that pins
//! the interpreter environment becomes the placed kernel.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::InstallError;
use super::locate::find_file_named;
use crate::util::fs::read_json_lenient;

pub const RUNTIME_DESCRIPTOR: &str = "PYTHON.json";
const ENTRY_POINT: &str = "main.py";
const REQUIREMENTS: &str = "requirements.txt";
const DEPS_DIR: &str = ".deps";

/// Interpreter locations searched when the descriptor names none.
const INTERPRETER_CANDIDATES: &[&str] = &[
  "bin/python3",
  "bin/python",
  "python.exe",
  "python3.exe",
  "install/bin/python3",
  "install/python.exe",
];

#[derive(Debug, Default, Deserialize)]
struct RuntimeDescriptor {
  #[serde(default)]
  python_exe: Option<String>,
}

/// Resolved on-disk layout of an installed script kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLayout {
  pub runtime: PathBuf,
  pub interpreter: PathBuf,
  pub src: PathBuf,
}

impl ScriptLayout {
  pub fn entry_point(&self) -> PathBuf {
    self.src.join(ENTRY_POINT)
  }

  pub fn deps(&self) -> PathBuf {
    self.src.join(DEPS_DIR)
  }

  /// The same layout after its tree moved from `from` to `to`.
  pub fn rebased(&self, from: &Path, to: &Path) -> Self {
    let rebase = |path: &Path| match path.strip_prefix(from) {
      Ok(rel) => to.join(rel),
      Err(_) => path.to_path_buf(),
    };
    Self {
      runtime: rebase(&self.runtime),
      interpreter: rebase(&self.interpreter),
      src: rebase(&self.src),
    }
  }
}

/// Move the interpreter tree found under `extracted` into `<slot>/runtime`.
pub fn install_runtime(extracted: &Path, slot: &Path) -> Result<PathBuf, InstallError> {
  let descriptor = find_file_named(extracted, RUNTIME_DESCRIPTOR).ok_or_else(|| InstallError::BinaryNotFound {
    id: "python".to_string(),
    searched: format!("{} under {}", RUNTIME_DESCRIPTOR, extracted.display()),
  })?;
  let root = descriptor.parent().unwrap_or(extracted);

  let runtime = slot.join("runtime");
  std::fs::create_dir_all(slot).map_err(|e| InstallError::io(super::InstallStage::LocateBinary, slot, e))?;
  std::fs::rename(root, &runtime).map_err(|e| InstallError::io(super::InstallStage::LocateBinary, &runtime, e))?;

  debug!(runtime = %runtime.display(), "installed script runtime");
  Ok(runtime)
}

/// Interpreter named by the runtime descriptor, else the first known location.
pub fn interpreter(runtime: &Path) -> Result<PathBuf, InstallError> {
  let descriptor: RuntimeDescriptor = read_json_lenient(&runtime.join(RUNTIME_DESCRIPTOR)).unwrap_or_default();

  if let Some(exe) = descriptor.python_exe {
    let path = runtime.join(exe);
    if path.is_file() {
      return Ok(path);
    }
    debug!(path = %path.display(), "descriptor interpreter missing, searching");
  }

  INTERPRETER_CANDIDATES
    .iter()
    .map(|c| runtime.join(c))
    .find(|p| p.is_file())
    .ok_or_else(|| InstallError::BinaryNotFound {
      id: "python".to_string(),
      searched: format!("interpreter under {}", runtime.display()),
    })
}

/// The directory holding `main.py` inside unpacked sources.
pub fn source_root(src: &Path) -> Result<PathBuf, InstallError> {
  find_file_named(src, ENTRY_POINT)
    .and_then(|p| p.parent().map(Path::to_path_buf))
    .ok_or_else(|| InstallError::BinaryNotFound {
      id: "python".to_string(),
      searched: format!("{} under {}", ENTRY_POINT, src.display()),
    })
}

/// Install `requirements.txt` into the private dependency directory, if present.
pub async fn install_requirements(layout: &ScriptLayout) -> Result<(), InstallError> {
  let requirements = layout.src.join(REQUIREMENTS);
  if !requirements.is_file() {
    return Ok(());
  }

  info!(requirements = %requirements.display(), "installing kernel dependencies");
  let output = Command::new(&layout.interpreter)
    .args(["-m", "pip", "install", "--disable-pip-version-check", "--target"])
    .arg(layout.deps())
    .arg("-r")
    .arg(&requirements)
    .env("PYTHONHOME", &layout.runtime)
    .env("PYTHONNOUSERSITE", "1")
    .output()
    .await
    .map_err(|e| InstallError::DependencyInstall {
      message: format!("failed to start {}: {}", layout.interpreter.display(), e),
    })?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    return Err(InstallError::DependencyInstall {
      message: format!("pip exited with {}: {}", output.status, stderr.trim()),
    });
  }

  Ok(())
}

fn sh_quote(path: &Path) -> String {
  format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

/// Wrapper script launching the entry point with a pinned environment.
pub fn wrapper_script(layout: &ScriptLayout, windows: bool) -> String {
  if windows {
    format!(
      "@echo off\r\n\
       set \"PYTHONHOME={runtime}\"\r\n\
       set \"PYTHONPATH={src};{deps}\"\r\n\
       set \"PYTHONNOUSERSITE=1\"\r\n\
       \"{interpreter}\" \"{entry}\" %*\r\n\
       exit /b %ERRORLEVEL%\r\n",
      runtime = layout.runtime.display(),
      src = layout.src.display(),
      deps = layout.deps().display(),
      interpreter = layout.interpreter.display(),
      entry = layout.entry_point().display(),
    )
  } else {
    format!(
      "#!/bin/sh\n\
       PYTHONHOME={runtime}\n\
       PYTHONPATH={src}:{deps}\n\
       PYTHONNOUSERSITE=1\n\
       export PYTHONHOME PYTHONPATH PYTHONNOUSERSITE\n\
       exec {interpreter} {entry} \"$@\"\n",
      runtime = sh_quote(&layout.runtime),
      src = sh_quote(&layout.src),
      deps = sh_quote(&layout.deps()),
      interpreter = sh_quote(&layout.interpreter),
      entry = sh_quote(&layout.entry_point()),
    )
  }
}

/// Write the wrapper into `dir`, returning its path.
pub fn write_wrapper(dir: &Path, layout: &ScriptLayout, windows: bool) -> Result<PathBuf, InstallError> {
  let name = if windows { "python.cmd" } else { "python.sh" };
  let path = dir.join(name);
  std::fs::write(&path, wrapper_script(layout, windows))
    .map_err(|e| InstallError::io(super::InstallStage::LocateBinary, &path, e))?;
  Ok(path)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_file;
  use tempfile::TempDir;

  fn layout() -> ScriptLayout {
    ScriptLayout {
      runtime: PathBuf::from("/rt/python/1.0/runtime"),
      interpreter: PathBuf::from("/rt/python/1.0/runtime/bin/python3"),
      src: PathBuf::from("/rt/python/1.0/src"),
    }
  }

  #[test]
  fn interpreter_prefers_descriptor() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), RUNTIME_DESCRIPTOR, br#"{"python_exe":"custom/py"}"#);
    write_file(temp.path(), "custom/py", b"");
    write_file(temp.path(), "bin/python3", b"");

    assert_eq!(interpreter(temp.path()).unwrap(), temp.path().join("custom/py"));
  }

  #[test]
  fn interpreter_searches_known_locations() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), RUNTIME_DESCRIPTOR, b"{}");
    write_file(temp.path(), "python.exe", b"");

    assert_eq!(interpreter(temp.path()).unwrap(), temp.path().join("python.exe"));
  }

  #[test]
  fn missing_interpreter_is_binary_not_found() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), RUNTIME_DESCRIPTOR, b"{}");

    assert!(matches!(
      interpreter(temp.path()),
      Err(InstallError::BinaryNotFound { .. })
    ));
  }

  #[test]
  fn runtime_is_moved_into_slot() {
    let temp = TempDir::new().unwrap();
    let extracted = temp.path().join("extract");
    write_file(&extracted, "python/PYTHON.json", b"{}");
    write_file(&extracted, "python/bin/python3", b"");
    let slot = temp.path().join("runtimes/python/3.0.0");

    let runtime = install_runtime(&extracted, &slot).unwrap();

    assert_eq!(runtime, slot.join("runtime"));
    assert!(runtime.join("bin/python3").exists());
    assert!(!extracted.join("python").exists());
  }

  #[test]
  fn source_root_finds_nested_entry_point() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "python-kernel-1.0/main.py", b"print(1)");

    assert_eq!(source_root(temp.path()).unwrap(), temp.path().join("python-kernel-1.0"));
  }

  #[test]
  fn rebased_layout_follows_moved_tree() {
    let moved = layout().rebased(Path::new("/rt/python/1.0"), Path::new("/opt/python/1.0"));

    assert_eq!(moved.runtime, PathBuf::from("/opt/python/1.0/runtime"));
    assert_eq!(moved.interpreter, PathBuf::from("/opt/python/1.0/runtime/bin/python3"));
    assert_eq!(moved.entry_point(), PathBuf::from("/opt/python/1.0/src/main.py"));
  }

  #[test]
  fn posix_wrapper_pins_environment() {
    let script = wrapper_script(&layout(), false);

    assert!(script.starts_with("#!/bin/sh\n"));
    assert!(script.contains("PYTHONHOME='/rt/python/1.0/runtime'"));
    assert!(script.contains("PYTHONPATH='/rt/python/1.0/src':'/rt/python/1.0/src/.deps'"));
    assert!(script.contains("PYTHONNOUSERSITE=1"));
    assert!(script.contains("exec '/rt/python/1.0/runtime/bin/python3' '/rt/python/1.0/src/main.py' \"$@\""));
  }

  #[test]
  fn windows_wrapper_forwards_arguments() {
    let script = wrapper_script(&layout(), true);

    assert!(script.starts_with("@echo off\r\n"));
    assert!(script.contains("set \"PYTHONNOUSERSITE=1\""));
    assert!(script.contains("%*"));
  }

  #[tokio::test]
  async fn no_requirements_means_no_pip() {
    let temp = TempDir::new().unwrap();
    let layout = ScriptLayout {
      runtime: temp.path().join("runtime"),
      interpreter: temp.path().join("does-not-exist"),
      src: temp.path().join("src"),
    };

    install_requirements(&layout).await.unwrap();
  }
}
