//! Integration tests for `railyard build`, `check` and `healthcheck`

use crate::helpers::{TestProject, combined, run_railyard, run_railyard_ok};
use anyhow::Result;

#[test]
fn test_build_only_produces_binaries() -> Result<()> {
  let project = TestProject::prebuilt("", "")?;
  run_railyard_ok(&project.path, &["build", "--snapshot"])?;

  assert!(project.file_exists("dist/demo_linux_amd64/demo"));
  assert!(project.file_exists("dist/demo_darwin_arm64/demo"));
  assert!(project.file_exists("dist/demo_windows_amd64/demo.exe"));
  assert!(!project.list_dir("dist")?.iter().any(|n| n.ends_with(".tar.gz")));
  assert_eq!(project.read_file("dist/demo_linux_amd64/demo")?, "binary for linux_amd64");
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_build_command_and_hooks() -> Result<()> {
  let project = TestProject::new(
    r#"project_name = "tool"
version = "0.3.0"

[before]
hooks = ["touch before.marker"]

[[builds]]
targets = ["linux_amd64", "linux_arm64"]
command = ["sh", "-c", "echo $RAILYARD_TARGET > {output}"]

[builds.hooks]
post = ["touch post-{target}.marker"]
"#,
  )?;

  run_railyard_ok(&project.path, &["build", "--parallelism", "2"])?;

  assert_eq!(project.read_file("dist/tool_linux_amd64/tool")?.trim(), "linux_amd64");
  assert_eq!(project.read_file("dist/tool_linux_arm64/tool")?.trim(), "linux_arm64");
  assert!(project.file_exists("before.marker"));
  assert!(project.file_exists("post-linux_amd64.marker"));
  assert!(project.file_exists("post-linux_arm64.marker"));
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_build_skip_hooks() -> Result<()> {
  let project = TestProject::new(
    r#"project_name = "tool"
version = "0.3.0"

[before]
hooks = ["touch before.marker"]

[[builds]]
targets = ["linux_amd64"]
command = ["sh", "-c", "echo built > {output}"]

[builds.hooks]
pre = ["touch pre.marker"]
"#,
  )?;

  let output = run_railyard_ok(&project.path, &["build", "--skip", "before,pre-hooks"])?;

  assert!(project.file_exists("dist/tool_linux_amd64/tool"));
  assert!(!project.file_exists("before.marker"));
  assert!(!project.file_exists("pre.marker"));
  assert!(combined(&output).contains("before"));
  Ok(())
}

#[test]
fn test_check_valid_config() -> Result<()> {
  let project = TestProject::prebuilt("", "")?;
  let output = run_railyard_ok(&project.path, &["check"])?;
  assert!(String::from_utf8_lossy(&output.stdout).contains("Config is valid"));
  assert!(!project.file_exists("dist"));
  Ok(())
}

#[test]
fn test_check_json_shows_defaults() -> Result<()> {
  let project = TestProject::prebuilt("", "")?;
  let output = run_railyard_ok(&project.path, &["check", "--json"])?;
  let config: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(config["archives"][0]["format"], "tar.gz");
  assert_eq!(config["checksum"]["algorithm"], "sha256");
  Ok(())
}

#[test]
fn test_healthcheck_passes() -> Result<()> {
  let project = TestProject::prebuilt("version = \"1.0.0\"", "")?;
  let output = run_railyard_ok(&project.path, &["healthcheck"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("dependencies"));
  assert!(stdout.contains("version"));
  Ok(())
}

#[test]
fn test_healthcheck_reports_missing_tool() -> Result<()> {
  let project = TestProject::new(
    r#"project_name = "tool"

[[builds]]
targets = ["linux_amd64"]
command = ["railyard-no-such-compiler", "{output}"]
"#,
  )?;

  let output = run_railyard(&project.path, &["healthcheck", "--json"])?;
  assert_eq!(output.status.code(), Some(3));
  let results: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  let dependencies = results
    .as_array()
    .and_then(|all| all.iter().find(|r| r["check_name"] == "dependencies"))
    .cloned()
    .unwrap_or_default();
  assert_eq!(dependencies["passed"], false);
  Ok(())
}
