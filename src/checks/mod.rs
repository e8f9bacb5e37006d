//! Health checks
//!
//! The pipeline runs [`preflight`] once after every stage applied its defaults
//! and before any stage runs: it resolves every external command the active
//! stages declare and reports all missing ones together. The `healthcheck`
//! command runs the full [`create_default_runner`] set and prints each result.
//!
//! # Built-in Checks
//!
//! - **dependencies**: external tools declared by active stages are on PATH
//! - **dist**: the dist directory is empty or `--clean` was given
//! - **version**: the release version is valid semver

mod dependencies;
mod runner;
mod trait_def;
mod workspace;

pub use dependencies::DependencyCheck;
pub use runner::{CheckRunner, create_default_runner};
pub use trait_def::{Check, CheckContext, CheckResult, Severity};

use crate::core::context::Context;
use crate::core::error::{DetailedError, ExitCode, YardResult};
use crate::pipe::Stage;
use anyhow::anyhow;

/// Fail when an active stage needs a tool that is not installed
pub fn preflight(ctx: &Context, stages: &[Box<dyn Stage>]) -> YardResult<()> {
  let result = DependencyCheck.run(&CheckContext { ctx, stages })?;
  if !result.is_blocking() {
    return Ok(());
  }

  let mut err = DetailedError::wrap(anyhow!("{}", result.message))
    .with_message("one or more needed tools are not present")
    .with_exit(ExitCode::Validation.as_i32());
  if let Some(serde_json::Value::Object(missing)) = &result.details {
    for (tool, stages) in missing {
      let users = stages
        .as_array()
        .map(|a| a.iter().filter_map(|s| s.as_str()).collect::<Vec<_>>().join(", "))
        .unwrap_or_default();
      err = err.with_detail(tool.clone(), users);
    }
  }
  Err(err.into())
}
