//! Integration tests for failing runs: config errors, missing tools, dist state

use crate::helpers::{TestProject, combined, run_railyard};
use anyhow::Result;

#[test]
fn test_duplicate_archive_ids() -> Result<()> {
  let project = TestProject::prebuilt(
    "",
    r#"
[[archives]]
id = "a"

[[archives]]
id = "a"
"#,
  )?;

  let output = run_railyard(&project.path, &["release", "--snapshot"])?;
  let text = combined(&output);

  assert_eq!(output.status.code(), Some(1));
  assert!(text.contains("found 2"), "output:\n{}", text);
  assert!(text.contains("'a'"), "output:\n{}", text);
  // defaults failed, so nothing ran
  assert!(!project.file_exists("dist"));
  Ok(())
}

#[test]
fn test_disallowed_skip() -> Result<()> {
  let project = TestProject::prebuilt("", "")?;
  let output = run_railyard(&project.path, &["build", "--skip", "publish"])?;
  let text = combined(&output);

  assert_eq!(output.status.code(), Some(1));
  assert!(text.contains("publish"), "output:\n{}", text);
  assert!(!project.file_exists("dist"));
  Ok(())
}

#[test]
fn test_unknown_skip() -> Result<()> {
  let project = TestProject::prebuilt("", "")?;
  let output = run_railyard(&project.path, &["release", "--skip", "docs"])?;
  assert!(!output.status.success());
  assert!(combined(&output).contains("docs"));
  Ok(())
}

#[test]
fn test_missing_tools_reported_together() -> Result<()> {
  let project = TestProject::new(
    r#"project_name = "tool"
version = "1.0.0"

[[builds]]
id = "one"
targets = ["linux_amd64"]
command = ["railyard-no-such-compiler", "{output}"]

[[builds]]
id = "two"
targets = ["linux_amd64"]
command = ["railyard-no-such-linker", "{output}"]
"#,
  )?;

  let output = run_railyard(&project.path, &["release"])?;
  let text = combined(&output);

  assert_eq!(output.status.code(), Some(3));
  assert!(text.contains("one or more needed tools are not present"), "output:\n{}", text);
  assert!(text.contains("railyard-no-such-compiler"), "output:\n{}", text);
  assert!(text.contains("railyard-no-such-linker"), "output:\n{}", text);
  // preflight runs before any stage
  assert!(!project.file_exists("dist"));
  Ok(())
}

#[test]
fn test_skipped_stage_needs_no_tools() -> Result<()> {
  let project = TestProject::prebuilt(
    "",
    r#"
[[signs]]
cmd = "railyard-no-such-signer"
artifacts = "checksum"
"#,
  )?;

  let output = run_railyard(&project.path, &["release", "--snapshot", "--skip", "sign"])?;
  assert!(output.status.success(), "output:\n{}", combined(&output));
  assert!(combined(&output).contains("artifact signing is disabled"));
  Ok(())
}

#[test]
fn test_dirty_dist_without_clean() -> Result<()> {
  let project = TestProject::prebuilt("", "")?;
  project.write_file("dist/leftover.tar.gz", "old")?;

  let output = run_railyard(&project.path, &["release", "--snapshot"])?;
  let text = combined(&output);

  assert!(!output.status.success());
  assert!(text.contains("is not empty"), "output:\n{}", text);
  assert!(text.contains("--clean"), "output:\n{}", text);
  assert!(project.file_exists("dist/leftover.tar.gz"));
  Ok(())
}

#[test]
fn test_invalid_version_fails_release() -> Result<()> {
  let project = TestProject::prebuilt("version = \"not-a-version\"", "")?;
  let output = run_railyard(&project.path, &["release"])?;
  assert!(!output.status.success());
  assert!(combined(&output).contains("invalid version"));
  Ok(())
}

#[test]
fn test_upload_failure_fails_run_after_everything_else() -> Result<()> {
  let project = TestProject::prebuilt(
    "version = \"1.0.0\"",
    r#"
[[uploads]]
target = "blocked/out"
"#,
  )?;
  // a file where the upload directory's parent should be
  project.write_file("blocked", "not a directory")?;

  let output = run_railyard(&project.path, &["release"])?;
  let text = combined(&output);

  assert_eq!(output.status.code(), Some(1));
  assert!(text.contains("could not prepare upload target"), "output:\n{}", text);
  assert!(project.file_exists("dist/metadata.json"));
  assert!(project.file_exists("dist/demo_1.0.0_checksums.txt"));
  Ok(())
}
