//! Choosing how to launch an installed kernel file.

use std::ffi::OsString;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launcher {
  /// Executed directly.
  Native,
  Java,
  Python,
  Node,
  /// Shell or batch script, executed directly.
  Script,
  PowerShell,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub launcher: Launcher,
  pub program: PathBuf,
  /// Arguments placed before the translated kernel arguments.
  pub leading: Vec<OsString>,
}

impl Invocation {
  /// Classify `path` for the host.
  pub fn classify(path: &Path, java_home: Option<&Path>) -> Self {
    Self::classify_with(path, java_home, cfg!(windows))
  }

  pub fn classify_with(path: &Path, java_home: Option<&Path>, windows: bool) -> Self {
    let ext = path
      .extension()
      .and_then(|e| e.to_str())
      .map(|e| e.to_ascii_lowercase());

    let launcher = match ext.as_deref() {
      Some("jar") => Launcher::Java,
      Some("py") => Launcher::Python,
      Some("js" | "mjs" | "cjs") => Launcher::Node,
      Some("sh" | "cmd" | "bat") => Launcher::Script,
      Some("ps1") => Launcher::PowerShell,
      Some("exe") => Launcher::Native,
      _ => sniff_shebang(path).unwrap_or(Launcher::Native),
    };

    let path_arg = || path.as_os_str().to_os_string();
    let (program, leading) = match launcher {
      Launcher::Native | Launcher::Script => (path.to_path_buf(), Vec::new()),
      Launcher::Java => {
        let java = match java_home {
          Some(home) => home.join("bin").join(if windows { "java.exe" } else { "java" }),
          None => PathBuf::from("java"),
        };
        (java, vec![OsString::from("-jar"), path_arg()])
      }
      Launcher::Python => (
        PathBuf::from(if windows { "python" } else { "python3" }),
        vec![path_arg()],
      ),
      Launcher::Node => (PathBuf::from("node"), vec![path_arg()]),
      Launcher::PowerShell => (
        PathBuf::from("powershell"),
        vec![
          OsString::from("-NoProfile"),
          OsString::from("-ExecutionPolicy"),
          OsString::from("Bypass"),
          OsString::from("-File"),
          path_arg(),
        ],
      ),
    };

    Self {
      launcher,
      program,
      leading,
    }
  }

  /// A command running this invocation with `args` appended.
  pub fn command(&self, args: &[String]) -> Command {
    let mut command = Command::new(&self.program);
    command.args(&self.leading).args(args);
    command
  }
}

/// Interpreter named on a `#!` line, for extensionless scripts.
fn sniff_shebang(path: &Path) -> Option<Launcher> {
  let mut head = [0u8; 128];
  let n = File::open(path).and_then(|mut f| f.read(&mut head)).ok()?;
  let line = head[..n].split(|b| *b == b'\n').next()?;
  let line = std::str::from_utf8(line.strip_prefix(b"#!")?).ok()?;

  if line.contains("python") {
    Some(Launcher::Python)
  } else if line.contains("node") {
    Some(Launcher::Node)
  } else {
    None
  }
}
