//! Run context - build once, pass everywhere
//!
//! A [`Context`] owns all state scoped to one pipeline run: the loaded project
//! configuration, the artifact catalog, the skip registry and the run options.
//! Nothing here is global; two runs in one process never share state.
//!
//! ```text
//! main.rs:
//!   Context::new(root, project) -> Context
//!   |
//!   v
//! pipeline::run(&mut ctx, stages)
//!   defaults(&mut Context)  -> run(&Context) -> publish(&Context)
//! ```

use crate::artifact::Catalog;
use crate::core::config::{Project, parse_env};
use crate::skips::Skips;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Version used when none is configured
pub const FALLBACK_VERSION: &str = "0.0.0";

pub struct Context {
  /// Project root directory (absolute path)
  pub root: PathBuf,

  /// Project configuration; stages normalize it during defaults
  pub config: Project,

  /// Every artifact produced so far
  pub artifacts: Catalog,

  /// Skips requested for this run, read-only once the pipeline starts
  pub skips: Skips,

  /// Maximum concurrent tasks inside one stage
  pub parallelism: usize,

  /// Snapshot run: no publishing, relaxed validation
  pub snapshot: bool,

  /// Remove a non-empty dist directory instead of failing
  pub clean: bool,

  /// Stop at the first failure even for stages that continue on error
  pub fail_fast: bool,

  /// Deadline for each external command
  pub command_timeout: Option<Duration>,

  /// Version being released
  pub version: String,

  /// Run start time
  pub date: DateTime<Utc>,

  /// Environment passed to external commands (process env is inherited too)
  pub env: BTreeMap<String, String>,
}

impl Context {
  pub fn new(root: impl Into<PathBuf>, config: Project) -> Self {
    let env = parse_env(&config.env).into_iter().collect();
    let version = config.version.clone().unwrap_or_default();
    Self {
      root: root.into(),
      config,
      artifacts: Catalog::new(),
      skips: Skips::new(),
      parallelism: default_parallelism(),
      snapshot: false,
      clean: false,
      fail_fast: false,
      command_timeout: None,
      version,
      date: Utc::now(),
      env,
    }
  }

  /// Absolute dist directory
  pub fn dist(&self) -> PathBuf {
    self.root.join(&self.config.dist)
  }

  /// Project root (convenience)
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Version with the leading `v` removed
  pub fn version_number(&self) -> &str {
    self.version.strip_prefix('v').unwrap_or(&self.version)
  }
}

fn default_parallelism() -> usize {
  std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_context() {
    let project = Project {
      project_name: "demo".to_string(),
      version: Some("v1.2.3".to_string()),
      env: vec!["A=1".to_string()],
      ..Project::default()
    };
    let ctx = Context::new("/tmp/demo", project);
    assert_eq!(ctx.version_number(), "1.2.3");
    assert_eq!(ctx.env.get("A").map(String::as_str), Some("1"));
    assert_eq!(ctx.dist(), PathBuf::from("/tmp/demo/dist"));
    assert!(ctx.parallelism >= 1);
    assert!(ctx.artifacts.is_empty());
  }
}
