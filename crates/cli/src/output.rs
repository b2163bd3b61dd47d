//! CLI output formatting utilities.
//!
//! Status lines go to stdout, problems to stderr, both colored only when the
//! stream supports it.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const DEFAULT: &str = "*";
}

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

/// Age of a Unix timestamp relative to `now`, e.g. "3h 12m ago".
pub fn format_age(then: u64, now: u64) -> String {
  // Minute granularity keeps the output short.
  let secs = now.saturating_sub(then) / 60 * 60;
  if secs == 0 {
    return "just now".to_string();
  }
  format!("{} ago", humantime::format_duration(Duration::from_secs(secs)))
}

pub fn dir_size(path: &Path) -> u64 {
  let Ok(entries) = std::fs::read_dir(path) else {
    return 0;
  };

  let mut size = 0;
  for entry in entries.flatten() {
    let Ok(file_type) = entry.file_type() else {
      continue;
    };
    if file_type.is_dir() {
      size += dir_size(&entry.path());
    } else {
      size += entry.metadata().map(|m| m.len()).unwrap_or(0);
    }
  }
  size
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

/// Like [`print_warning`], for notices that must not mix into stdout.
pub fn print_notice(message: &str) {
  eprintln!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stderr, |s| s.blue()),
    message
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Write raw bytes to stdout and stderr, flushing both.
pub fn write_streams(stdout: &[u8], stderr: &[u8]) -> anyhow::Result<()> {
  if !stderr.is_empty() {
    let mut err = std::io::stderr().lock();
    err.write_all(stderr).context("Failed to write to stderr")?;
    err.flush().context("Failed to write to stderr")?;
  }
  let mut out = std::io::stdout().lock();
  out.write_all(stdout).context("Failed to write to stdout")?;
  out.flush().context("Failed to write to stdout")?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_bytes() {
    assert_eq!(format_bytes(500), "500 B");
    assert_eq!(format_bytes(1024), "1.0 KB");
    assert_eq!(format_bytes(1536), "1.5 KB");
    assert_eq!(format_bytes(1048576), "1.0 MB");
    assert_eq!(format_bytes(1073741824), "1.0 GB");
  }

  #[test]
  fn test_format_age() {
    assert_eq!(format_age(1_000, 1_030), "just now");
    assert_eq!(format_age(1_000, 1_000 + 3 * 3600 + 12 * 60 + 7), "3h 12m ago");
    assert_eq!(format_age(2_000, 1_000), "just now");
  }

  #[test]
  fn test_dir_size() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("a/b")).unwrap();
    std::fs::write(temp.path().join("a/one"), [0u8; 10]).unwrap();
    std::fs::write(temp.path().join("a/b/two"), [0u8; 5]).unwrap();

    assert_eq!(dir_size(temp.path()), 15);
    assert_eq!(dir_size(&temp.path().join("missing")), 0);
  }
}
