//! Checksum file
//!
//! One line per uploadable artifact, `"<digest>  <name>"`, sorted by name. The
//! registered artifact carries a refresh hook, so when a later stage changes a
//! file the checksum file is rewritten before anything is published.

use crate::artifact::filter::{by_ids, by_types};
use crate::artifact::{ALGORITHMS, Artifact, ArtifactType, Catalog, Filter, extra};
use crate::core::context::Context;
use crate::core::error::{ConfigError, YardResult};
use crate::core::tmpl::Template;
use crate::group::{Group, Parallel};
use crate::pipe::{Defaulter, Runner, Skip, Skipper, Stage, skip};
use anyhow::Context as _;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Artifact kinds that get a checksum line
pub const CHECKSUMMED: &[ArtifactType] = &[
  ArtifactType::UploadableArchive,
  ArtifactType::UploadableBinary,
  ArtifactType::UploadableSourceArchive,
  ArtifactType::UploadableFile,
  ArtifactType::LinuxPackage,
  ArtifactType::Sbom,
];

pub struct Checksum;

impl Stage for Checksum {
  fn name(&self) -> &str {
    "checksum"
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

impl Defaulter for Checksum {
  fn defaults(&self, ctx: &mut Context) -> YardResult<()> {
    let checksum = &mut ctx.config.checksum;
    if checksum.name_template.is_empty() {
      checksum.name_template = "{project}_{version}_checksums.txt".to_string();
    }
    if checksum.algorithm.is_empty() {
      checksum.algorithm = "sha256".to_string();
    }
    if !ALGORITHMS.contains(&checksum.algorithm.as_str()) {
      return Err(
        ConfigError::InvalidValue {
          field: "checksum.algorithm".to_string(),
          value: checksum.algorithm.clone(),
          expected: ALGORITHMS.join(", "),
        }
        .into(),
      );
    }
    Ok(())
  }
}

impl Skipper for Checksum {
  fn skip(&self, ctx: &Context) -> YardResult<bool> {
    Ok(ctx.config.checksum.disable)
  }

  fn skip_reason(&self, _ctx: &Context) -> Skip {
    Skip::new("checksum calculation is disabled")
  }
}

impl Runner for Checksum {
  fn run(&self, ctx: &Context) -> YardResult<()> {
    let config = &ctx.config.checksum;
    let selection = selection(&config.ids);
    let targets = ctx.artifacts.filter(selection.clone()).list();
    if targets.is_empty() {
      return Err(skip("no artifacts to checksum"));
    }

    let lines: Mutex<Vec<String>> = Mutex::new(Vec::with_capacity(targets.len()));
    let mut group = Parallel::new(ctx.parallelism);
    for artifact in &targets {
      let lines = &lines;
      let algorithm = config.algorithm.as_str();
      group.go(move || {
        let line = line_for(artifact, algorithm)?;
        lines.lock().unwrap_or_else(PoisonError::into_inner).push(line);
        Ok(())
      });
    }
    group.wait()?;

    let name = Template::new(ctx).apply(&config.name_template)?;
    let path = ctx.dist().join(&name);
    let mut lines = lines.into_inner().unwrap_or_else(PoisonError::into_inner);
    write_file(&path, &mut lines)?;
    info!(file = %name, artifacts = targets.len(), "wrote checksums");

    let algorithm = config.algorithm.clone();
    let refresher = Arc::new(move |artifact: &mut Artifact, catalog: &Catalog| {
      let mut lines = catalog
        .filter(selection.clone())
        .list()
        .iter()
        .map(|a| line_for(a, &algorithm))
        .collect::<YardResult<Vec<_>>>()?;
      write_file(&artifact.path, &mut lines)
    });

    ctx.artifacts.add(
      Artifact::new(ArtifactType::Checksum, name, path)
        .with_extra(extra::CHECKSUM, config.algorithm.clone())
        .with_refresher(refresher),
    );
    Ok(())
  }
}

fn selection(ids: &[String]) -> Filter {
  by_types(CHECKSUMMED).and(by_ids(ids))
}

fn line_for(artifact: &Artifact, algorithm: &str) -> YardResult<String> {
  let sum = artifact
    .checksum(algorithm)
    .with_context(|| format!("failed to checksum {}", artifact.name))?;
  Ok(format!("{}  {}\n", sum, artifact.name))
}

fn write_file(path: &Path, lines: &mut [String]) -> YardResult<()> {
  lines.sort_by(|a, b| a.split_once("  ").map(|x| x.1).cmp(&b.split_once("  ").map(|x| x.1)));
  fs::write(path, lines.concat()).with_context(|| format!("failed to write {}", path.display()))
}
