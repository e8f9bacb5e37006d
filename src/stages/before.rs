//! Global hooks run before anything is built

use super::run_hooks;
use crate::core::context::Context;
use crate::core::error::YardResult;
use crate::core::exec::split_line;
use crate::core::tmpl::Template;
use crate::pipe::{Dependencies, Runner, Skip, Skipper, Stage};
use crate::skips::Key;

pub struct Before;

impl Stage for Before {
  fn name(&self) -> &str {
    "before"
  }

  fn as_skipper(&self) -> Option<&dyn Skipper> {
    Some(self)
  }

  fn as_dependencies(&self) -> Option<&dyn Dependencies> {
    Some(self)
  }

  fn as_runner(&self) -> Option<&dyn Runner> {
    Some(self)
  }
}

impl Skipper for Before {
  fn skip(&self, ctx: &Context) -> YardResult<bool> {
    Ok(ctx.config.before.hooks.is_empty() || ctx.skips.any(&[Key::Before]))
  }

  fn skip_reason(&self, ctx: &Context) -> Skip {
    if ctx.skips.any(&[Key::Before]) {
      Skip::new("before hooks are disabled")
    } else {
      Skip::new("no before hooks configured")
    }
  }
}

impl Dependencies for Before {
  fn dependencies(&self, ctx: &Context) -> Vec<String> {
    ctx
      .config
      .before
      .hooks
      .iter()
      .filter_map(|hook| split_line(hook).ok()?.into_iter().next())
      .filter(|program| !program.contains('{'))
      .collect()
  }
}

impl Runner for Before {
  fn run(&self, ctx: &Context) -> YardResult<()> {
    run_hooks(ctx, &Template::new(ctx), &ctx.config.before.hooks, &[])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::Project;
  use tempfile::TempDir;

  fn ctx(dir: &TempDir, hooks: &[&str]) -> Context {
    let mut project = Project::default();
    project.before.hooks = hooks.iter().map(|s| s.to_string()).collect();
    project.project_name = "demo".to_string();
    Context::new(dir.path(), project)
  }

  #[test]
  fn test_skip_without_hooks() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx(&dir, &[]);
    assert!(Before.skip(&ctx).unwrap());
    assert_eq!(Before.skip_reason(&ctx).reason(), "no before hooks configured");
  }

  #[test]
  fn test_dependencies_are_hook_programs() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx(&dir, &["make docs", "sh -c 'echo hi'"]);
    assert_eq!(Before.dependencies(&ctx), vec!["make", "sh"]);
  }

  #[cfg(unix)]
  #[test]
  fn test_hooks_run_in_project_root() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx(&dir, &["touch {project}.stamp"]);
    Before.run(&ctx).unwrap();
    assert!(dir.path().join("demo.stamp").exists());
  }

  #[cfg(unix)]
  #[test]
  fn test_failing_hook_stops() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx(&dir, &["false", "touch never"]);
    assert!(Before.run(&ctx).is_err());
    assert!(!dir.path().join("never").exists());
  }
}
