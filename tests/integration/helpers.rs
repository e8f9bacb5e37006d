//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Targets every prebuilt fixture covers
pub const TARGETS: &[&str] = &["linux_amd64", "darwin_arm64", "windows_amd64"];

/// A throwaway project directory with a railyard.toml
pub struct TestProject {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestProject {
  /// Create a project with the given config
  pub fn new(config: &str) -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();
    std::fs::write(path.join("railyard.toml"), config)?;
    Ok(Self { _root: root, path })
  }

  /// Project with one prebuilt build for [`TARGETS`].
  ///
  /// `top` holds extra top-level keys, `tables` extra tables after the build.
  pub fn prebuilt(top: &str, tables: &str) -> Result<Self> {
    let targets = TARGETS.iter().map(|t| format!("\"{}\"", t)).collect::<Vec<_>>().join(", ");
    let config = format!(
      r#"project_name = "demo"
{}

[[builds]]
id = "demo"
prebuilt = "bin/{{target}}/demo"
targets = [{}]
{}"#,
      top, targets, tables
    );
    let project = Self::new(&config)?;
    for target in TARGETS {
      project.write_file(&format!("bin/{}/demo", target), &format!("binary for {}", target))?;
    }
    Ok(project)
  }

  /// Write a file relative to the project root, creating parent directories
  pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
    let full = self.path.join(path);
    if let Some(parent) = full.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(full, content)?;
    Ok(())
  }

  /// Check if a file exists
  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }

  /// Read a file
  pub fn read_file(&self, path: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(path))?)
  }

  /// File names directly under `dir`, sorted
  pub fn list_dir(&self, dir: &str) -> Result<Vec<String>> {
    let mut names = std::fs::read_dir(self.path.join(dir))?
      .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
      .collect::<std::io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
  }
}

/// Run the railyard CLI, returning its output whatever the exit status
pub fn run_railyard(cwd: &Path, args: &[&str]) -> Result<Output> {
  Command::new(env!("CARGO_BIN_EXE_railyard"))
    .current_dir(cwd)
    .args(args)
    .env_remove("RAILYARD_CURRENT_TAG")
    .env("RAILYARD_LOG", "railyard=warn")
    .output()
    .context("Failed to run railyard")
}

/// Run the railyard CLI and fail unless it exits successfully
pub fn run_railyard_ok(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = run_railyard(cwd, args)?;
  if !output.status.success() {
    anyhow::bail!(
      "railyard command failed: railyard {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      String::from_utf8_lossy(&output.stdout),
      String::from_utf8_lossy(&output.stderr)
    );
  }
  Ok(output)
}

/// stdout and stderr of a run, concatenated
pub fn combined(output: &Output) -> String {
  format!(
    "{}{}",
    String::from_utf8_lossy(&output.stdout),
    String::from_utf8_lossy(&output.stderr)
  )
}
