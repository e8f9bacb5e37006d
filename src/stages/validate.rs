//! Release version validation

use crate::core::context::{Context, FALLBACK_VERSION};
use crate::core::error::{DetailedError, YardResult};
use crate::pipe::{Defaulter, Runner, SKIP_VALIDATE_ENABLED, SNAPSHOT_ENABLED, Skip, Skipper, Stage};
use crate::skips::Key;
use anyhow::anyhow;

/// Fills the project name and, for snapshots, a placeholder version; checks
/// that a real release has a semantic version.
pub struct Validate;

impl Stage for Validate {
  fn name(&self) -> &str {
    "validate"
  }

  fn as_defaulter(&self) -> Option<&dyn Defaulter> {
    Some(self)
  }

  fn as_skipper(&self) -> Option<&dyn Skipper> {
    Some(self)
  }

  fn as_runner(&self) -> Option<&dyn Runner> {
    Some(self)
  }
}

impl Defaulter for Validate {
  fn defaults(&self, ctx: &mut Context) -> YardResult<()> {
    if ctx.config.project_name.is_empty() {
      ctx.config.project_name = ctx
        .root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    }
    if ctx.version.is_empty() && ctx.snapshot {
      ctx.version = format!("{}-SNAPSHOT", FALLBACK_VERSION);
    }
    Ok(())
  }
}

impl Skipper for Validate {
  fn skip(&self, ctx: &Context) -> YardResult<bool> {
    Ok(ctx.skips.any(&[Key::Validate]))
  }

  fn skip_reason(&self, _ctx: &Context) -> Skip {
    SKIP_VALIDATE_ENABLED
  }
}

impl Runner for Validate {
  fn run(&self, ctx: &Context) -> YardResult<()> {
    if ctx.snapshot {
      return Err(SNAPSHOT_ENABLED.into());
    }
    if ctx.version.is_empty() {
      return Err(
        DetailedError::wrap(anyhow!("no version to release"))
          .with_message("set `version` in railyard.toml or pass --release-version")
          .into(),
      );
    }
    semver::Version::parse(ctx.version_number()).map_err(|e| {
      DetailedError::wrap(anyhow!("invalid version {:?}: {}", ctx.version, e)).with_detail("version", &ctx.version)
    })?;
    Ok(())
  }
}
