//! Integration tests for `railyard release`

use crate::helpers::{TestProject, combined, run_railyard_ok};
use anyhow::Result;

const ARCHIVES: &str = r#"
[[archives]]
id = "default"
wrap_in_directory = true

[[archives.format_overrides]]
os = "windows"
format = "zip"
"#;

#[test]
fn test_snapshot_release_packages_every_target() -> Result<()> {
  let project = TestProject::prebuilt("", &format!("{}\n[[uploads]]\ntarget = \"out\"\n", ARCHIVES))?;

  let output = run_railyard_ok(&project.path, &["release", "--snapshot", "--parallelism", "2"])?;
  let text = combined(&output);

  let dist = project.list_dir("dist")?;
  let archives: Vec<&str> = dist
    .iter()
    .map(String::as_str)
    .filter(|n| n.ends_with(".tar.gz") || n.ends_with(".zip"))
    .collect();
  assert_eq!(
    archives,
    vec![
      "demo_0.0.0-SNAPSHOT_darwin_arm64.tar.gz",
      "demo_0.0.0-SNAPSHOT_linux_amd64.tar.gz",
      "demo_0.0.0-SNAPSHOT_windows_amd64.zip",
    ]
  );

  let checksums = project.read_file("dist/demo_0.0.0-SNAPSHOT_checksums.txt")?;
  assert_eq!(checksums.lines().count(), 3, "checksums:\n{}", checksums);
  assert!(checksums.lines().all(|l| l.split("  ").next().map(|s| s.len()) == Some(64)));

  assert!(project.file_exists("dist/metadata.json"));
  assert!(project.file_exists("dist/artifacts.json"));

  // snapshots never publish
  assert!(!project.file_exists("out"));
  assert!(text.contains("disabled during snapshot mode"), "output:\n{}", text);
  Ok(())
}

#[test]
fn test_release_uploads_archives_and_checksums() -> Result<()> {
  let project = TestProject::prebuilt(
    "version = \"1.2.0\"",
    &format!("{}\n[[uploads]]\ntarget = \"out\"\n", ARCHIVES),
  )?;

  run_railyard_ok(&project.path, &["release"])?;

  assert_eq!(
    project.list_dir("out")?,
    vec![
      "demo_1.2.0_checksums.txt",
      "demo_1.2.0_darwin_arm64.tar.gz",
      "demo_1.2.0_linux_amd64.tar.gz",
      "demo_1.2.0_windows_amd64.zip",
    ]
  );
  Ok(())
}

#[test]
fn test_release_version_flag() -> Result<()> {
  let project = TestProject::prebuilt("", "")?;
  run_railyard_ok(&project.path, &["release", "--release-version", "v3.0.0", "--skip", "publish"])?;

  assert!(project.file_exists("dist/demo_3.0.0_linux_amd64.tar.gz"));
  let metadata: serde_json::Value = serde_json::from_str(&project.read_file("dist/metadata.json")?)?;
  assert_eq!(metadata["tag"], "v3.0.0");
  assert_eq!(metadata["version"], "3.0.0");
  Ok(())
}

#[test]
fn test_skip_archive() -> Result<()> {
  let project = TestProject::prebuilt("", "")?;
  let output = run_railyard_ok(&project.path, &["release", "--snapshot", "--skip", "archive"])?;
  let text = combined(&output);

  assert!(!project.list_dir("dist")?.iter().any(|n| n.ends_with(".tar.gz")));
  assert!(text.contains("archiving is disabled"), "output:\n{}", text);
  assert!(text.contains("no artifacts to checksum"), "output:\n{}", text);
  Ok(())
}

#[test]
fn test_clean_replaces_previous_dist() -> Result<()> {
  let project = TestProject::prebuilt("", "")?;
  project.write_file("dist/stale.txt", "old")?;

  run_railyard_ok(&project.path, &["release", "--snapshot", "--clean"])?;

  assert!(!project.file_exists("dist/stale.txt"));
  assert!(project.file_exists("dist/demo_0.0.0-SNAPSHOT_linux_amd64.tar.gz"));
  Ok(())
}

#[test]
fn test_json_report() -> Result<()> {
  let project = TestProject::prebuilt("", "")?;
  let output = run_railyard_ok(&project.path, &["release", "--snapshot", "--json"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);

  let start = stdout.find('{').unwrap_or(0);
  let end = stdout.rfind('}').map(|i| i + 1).unwrap_or(stdout.len());
  let report: serde_json::Value = serde_json::from_str(&stdout[start..end])?;
  let stages = report["stages"].as_array().cloned().unwrap_or_default();
  assert_eq!(stages.len(), 11);
  assert_eq!(stages[3]["name"], "build");
  assert_eq!(stages[3]["state"], "done");
  Ok(())
}
