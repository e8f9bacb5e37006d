//! CLI commands for railyard
//!
//! ## Pipelines
//! - **release**: build, package, checksum, sign and publish
//! - **build**: build binaries only
//!
//! ## Inspection
//! - **check**: load the config and apply every stage's defaults
//! - **healthcheck**: run the built-in checks and print each result
//!
//! Every command takes [`RunOptions`] and builds its own run context.

pub mod check;
pub mod healthcheck;
pub mod release;

pub use check::run_check;
pub use healthcheck::run_healthcheck;
pub use release::{run_build, run_release};

use crate::core::config::Project;
use crate::core::context::Context;
use crate::core::error::YardResult;
use crate::skips::Key;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Environment variable consulted when no version is given on the command line
pub const VERSION_ENV: &str = "RAILYARD_CURRENT_TAG";

/// Options shared by every command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  pub root: PathBuf,
  /// Explicit config file, relative to `root`
  pub config: Option<PathBuf>,
  pub snapshot: bool,
  /// Raw `--skip` values
  pub skip: Vec<String>,
  /// 0 keeps the default (available cores)
  pub parallelism: usize,
  pub clean: bool,
  pub version: Option<String>,
  pub fail_fast: bool,
  pub timeout: Option<Duration>,
  /// Print the run report as JSON
  pub json: bool,
}

/// Load config and build the run context, accepting only `allowed` skip keys
pub fn prepare(opts: &RunOptions, allowed: &[Key]) -> YardResult<Context> {
  let config = match &opts.config {
    Some(path) => Project::load_from(&opts.root.join(path))?,
    None => Project::load(&opts.root)?,
  };

  let mut ctx = Context::new(&opts.root, config);
  ctx.skips.set_from(allowed, &opts.skip)?;
  ctx.snapshot = opts.snapshot;
  ctx.clean = opts.clean;
  ctx.fail_fast = opts.fail_fast;
  ctx.command_timeout = opts.timeout;
  if opts.parallelism > 0 {
    ctx.parallelism = opts.parallelism;
  }

  if let Some(version) = &opts.version {
    ctx.version = version.clone();
  } else if ctx.version.is_empty()
    && let Ok(tag) = std::env::var(VERSION_ENV)
  {
    ctx.version = tag;
  }

  debug!(root = %opts.root.display(), version = %ctx.version, parallelism = ctx.parallelism, "context ready");
  Ok(ctx)
}
