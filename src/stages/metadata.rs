//! Run metadata files in the dist directory
//!
//! - `metadata.json`: project, version, tag, date and the host platform
//! - `artifacts.json`: the whole catalog, written last so it lists everything
//!   produced before it, `metadata.json` included

use crate::artifact::{Artifact, ArtifactType};
use crate::core::context::Context;
use crate::core::error::YardResult;
use crate::pipe::{Runner, Stage};
use anyhow::Context as _;
use serde::Serialize;
use std::fs;
use tracing::info;

pub const METADATA_FILE: &str = "metadata.json";
pub const ARTIFACTS_FILE: &str = "artifacts.json";

pub struct Metadata;

#[derive(Serialize)]
struct RunInfo<'a> {
  project_name: &'a str,
  tag: &'a str,
  version: &'a str,
  date: String,
  runtime: Runtime,
}

#[derive(Serialize)]
struct Runtime {
  os: &'static str,
  arch: &'static str,
}

impl Stage for Metadata {
  fn name(&self) -> &str {
    "metadata"
  }

  fn as_runner(&self) -> Option<&dyn Runner> {
    Some(self)
  }
}

impl Runner for Metadata {
  fn run(&self, ctx: &Context) -> YardResult<()> {
    let dist = ctx.dist();

    let info = RunInfo {
      project_name: &ctx.config.project_name,
      tag: &ctx.version,
      version: ctx.version_number(),
      date: ctx.date.to_rfc3339(),
      runtime: Runtime {
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
      },
    };
    let path = dist.join(METADATA_FILE);
    fs::write(&path, serde_json::to_string_pretty(&info)?)
      .with_context(|| format!("failed to write {}", path.display()))?;
    ctx.artifacts.add(Artifact::new(ArtifactType::Metadata, METADATA_FILE, path));

    let path = dist.join(ARTIFACTS_FILE);
    fs::write(&path, ctx.artifacts.to_json()?).with_context(|| format!("failed to write {}", path.display()))?;
    info!(artifacts = ctx.artifacts.len(), "wrote metadata");
    Ok(())
  }
}
