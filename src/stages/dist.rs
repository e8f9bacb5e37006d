//! The output directory

use crate::core::context::Context;
use crate::core::error::{DetailedError, YardResult};
use crate::pipe::{Runner, Stage};
use anyhow::anyhow;
use std::fs;
use tracing::info;

/// Creates dist, refusing to reuse a non-empty one unless `clean` is set
pub struct Dist;

impl Stage for Dist {
  fn name(&self) -> &str {
    "dist"
  }

  fn as_runner(&self) -> Option<&dyn Runner> {
    Some(self)
  }
}

impl Runner for Dist {
  fn run(&self, ctx: &Context) -> YardResult<()> {
    let dist = ctx.dist();
    if let Ok(mut entries) = fs::read_dir(&dist)
      && entries.next().is_some()
    {
      if !ctx.clean {
        return Err(
          DetailedError::wrap(anyhow!("{} is not empty", dist.display()))
            .with_message("remove the dist directory before running, or use --clean")
            .with_detail("dist", dist.display())
            .into(),
        );
      }
      info!(dist = %dist.display(), "cleaning dist");
      fs::remove_dir_all(&dist)?;
    }
    fs::create_dir_all(&dist)?;
    Ok(())
  }
}
