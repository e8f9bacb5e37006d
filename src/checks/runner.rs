//! Check registry and batch execution

use super::dependencies::DependencyCheck;
use super::trait_def::{Check, CheckContext, CheckResult};
use super::workspace::{DistCheck, VersionCheck};
use crate::core::error::YardResult;
use tracing::debug;

/// Runs registered checks in registration order
pub struct CheckRunner {
  checks: Vec<Box<dyn Check>>,
}

impl CheckRunner {
  pub fn new() -> Self {
    Self { checks: Vec::new() }
  }

  pub fn register(&mut self, check: Box<dyn Check>) {
    self.checks.push(check);
  }

  /// Run every check. A check that errors out is reported as a failed result
  /// rather than aborting the batch.
  pub fn run_all(&self, cc: &CheckContext) -> Vec<CheckResult> {
    self
      .checks
      .iter()
      .map(|check| {
        debug!(check = check.name(), "running check");
        match check.run(cc) {
          Ok(result) => result,
          Err(e) => CheckResult::error(
            check.name(),
            format!("check could not run: {:#}", e),
            None::<String>,
          ),
        }
      })
      .collect()
  }

  /// Run a single check by name
  pub fn run_one(&self, name: &str, cc: &CheckContext) -> YardResult<Option<CheckResult>> {
    match self.checks.iter().find(|c| c.name() == name) {
      Some(check) => Ok(Some(check.run(cc)?)),
      None => Ok(None),
    }
  }

  /// (name, description) of every registered check
  pub fn list(&self) -> Vec<(&str, &str)> {
    self.checks.iter().map(|c| (c.name(), c.description())).collect()
  }
}

impl Default for CheckRunner {
  fn default() -> Self {
    Self::new()
  }
}

/// Runner with every built-in check registered
pub fn create_default_runner() -> CheckRunner {
  let mut runner = CheckRunner::new();
  runner.register(Box::new(DependencyCheck));
  runner.register(Box::new(DistCheck));
  runner.register(Box::new(VersionCheck));
  runner
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::Project;
  use crate::core::context::Context;

  struct Broken;

  impl Check for Broken {
    fn name(&self) -> &str {
      "broken"
    }
    fn description(&self) -> &str {
      "always errors"
    }
    fn run(&self, _cc: &CheckContext) -> YardResult<CheckResult> {
      anyhow::bail!("no access")
    }
  }

  #[test]
  fn test_default_runner_lists_checks() {
    let runner = create_default_runner();
    let names: Vec<&str> = runner.list().iter().map(|(n, _)| *n).collect();
    assert_eq!(names, vec!["dependencies", "dist", "version"]);
  }

  #[test]
  fn test_failing_check_becomes_result() {
    let ctx = Context::new("/tmp", Project::default());
    let mut runner = CheckRunner::new();
    runner.register(Box::new(Broken));
    let results = runner.run_all(&CheckContext { ctx: &ctx, stages: &[] });
    assert_eq!(results.len(), 1);
    assert!(results[0].is_blocking());
    assert!(results[0].message.contains("no access"));
    assert!(runner.run_one("missing", &CheckContext { ctx: &ctx, stages: &[] }).unwrap().is_none());
  }
}
