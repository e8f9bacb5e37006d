//! Checks on the run's working state: the dist directory and the version

use super::trait_def::{Check, CheckContext, CheckResult};
use crate::core::error::YardResult;
use std::fs;

/// A leftover dist directory fails the `dist` stage unless `--clean` is given
pub struct DistCheck;

impl Check for DistCheck {
  fn name(&self) -> &str {
    "dist"
  }

  fn description(&self) -> &str {
    "Checks that the dist directory is empty or will be cleaned"
  }

  fn run(&self, cc: &CheckContext) -> YardResult<CheckResult> {
    let dist = cc.ctx.dist();
    let has_entries = match fs::read_dir(&dist) {
      Ok(mut entries) => entries.next().is_some(),
      Err(_) => false,
    };

    if has_entries && !cc.ctx.clean {
      return Ok(CheckResult::warning(
        self.name(),
        format!("{} is not empty", dist.display()),
        Some("Remove it or run with --clean"),
      ));
    }
    Ok(CheckResult::pass(self.name(), format!("{} is usable", dist.display())))
  }
}

/// Releases need a semver version; snapshots fall back to a placeholder
pub struct VersionCheck;

impl Check for VersionCheck {
  fn name(&self) -> &str {
    "version"
  }

  fn description(&self) -> &str {
    "Checks that the release version is valid semver"
  }

  fn run(&self, cc: &CheckContext) -> YardResult<CheckResult> {
    let ctx = cc.ctx;
    if ctx.version.is_empty() {
      return Ok(CheckResult::warning(
        self.name(),
        "No release version configured",
        Some("Set `version` in railyard.toml or pass --release-version"),
      ));
    }
    match semver::Version::parse(ctx.version_number()) {
      Ok(v) => Ok(CheckResult::pass(self.name(), format!("Releasing {}", v))),
      Err(e) => Ok(CheckResult::warning(
        self.name(),
        format!("{} is not a semantic version: {}", ctx.version, e),
        Some("Use MAJOR.MINOR.PATCH, optionally prefixed with v"),
      )),
    }
  }
}
