//! Directory uploads
//!
//! The only built-in publisher: copies uploadable artifacts into a target
//! directory (a mounted share, a synced bucket folder). Failures are recorded
//! and the run carries on with the remaining publishers.

use crate::artifact::filter::{by_ids, by_types};
use crate::artifact::{ArtifactType, Filter};
use crate::core::config::UploadConfig;
use crate::core::context::Context;
use crate::core::error::{DetailedError, YardResult};
use crate::group::{Group, Parallel};
use crate::pipe::{Defaulter, Publisher, Skip, SkipMemento, Skipper, Stage, ensure_unique_ids, is_skip, skip};
use crate::ui::progress::{self, TaskProgress};
use std::fs;
use tracing::info;

const SHIPPED: &[ArtifactType] = &[
  ArtifactType::UploadableArchive,
  ArtifactType::UploadableBinary,
  ArtifactType::UploadableSourceArchive,
  ArtifactType::UploadableFile,
  ArtifactType::LinuxPackage,
  ArtifactType::Sbom,
];

const INTEGRITY: &[ArtifactType] = &[ArtifactType::Checksum, ArtifactType::Signature, ArtifactType::Certificate];

pub struct Upload;

impl Stage for Upload {
  fn name(&self) -> &str {
    "upload"
  }

  fn as_defaulter(&self) -> Option<&dyn Defaulter> {
    Some(self)
  }

  fn as_skipper(&self) -> Option<&dyn Skipper> {
    Some(self)
  }

  fn as_publisher(&self) -> Option<&dyn Publisher> {
    Some(self)
  }

  fn continue_on_error(&self) -> bool {
    true
  }
}

impl Defaulter for Upload {
  fn defaults(&self, ctx: &mut Context) -> YardResult<()> {
    for (i, upload) in ctx.config.uploads.iter_mut().enumerate() {
      if upload.name.is_empty() {
        upload.name = if i == 0 { "default".to_string() } else { format!("upload-{}", i) };
      }
    }
    ensure_unique_ids("uploads", ctx.config.uploads.iter().map(|u| u.name.as_str()))
  }
}

impl Skipper for Upload {
  fn skip(&self, ctx: &Context) -> YardResult<bool> {
    Ok(ctx.config.uploads.is_empty())
  }

  fn skip_reason(&self, _ctx: &Context) -> Skip {
    Skip::new("no uploads configured")
  }
}

impl Publisher for Upload {
  fn publish(&self, ctx: &Context) -> YardResult<()> {
    let mut memento = SkipMemento::new();
    for upload in &ctx.config.uploads {
      match upload_one(ctx, upload) {
        Err(err) if is_skip(&err) => memento.remember(&err),
        result => result?,
      }
    }
    memento.evaluate()
  }
}

fn selection(upload: &UploadConfig) -> Filter {
  let shipped = by_types(SHIPPED).and(by_ids(&upload.ids));
  if upload.include_checksums {
    shipped.or(by_types(INTEGRITY))
  } else {
    shipped
  }
}

fn upload_one(ctx: &Context, upload: &UploadConfig) -> YardResult<()> {
  let artifacts = ctx.artifacts.filter(selection(upload)).list();
  if artifacts.is_empty() {
    return Err(skip(format!("nothing to upload for {}", upload.name)));
  }

  let target = ctx.root().join(&upload.target);
  fs::create_dir_all(&target).map_err(|e| {
    DetailedError::wrap(e)
      .with_message("could not prepare upload target")
      .with_detail("upload", &upload.name)
      .with_detail("target", target.display())
  })?;

  let bar = TaskProgress::start(artifacts.len(), &format!("upload {}", upload.name));
  let mut group = Parallel::new(ctx.parallelism);
  for artifact in &artifacts {
    let (target, bar) = (&target, &bar);
    group.go(move || {
      let dest = target.join(&artifact.name);
      fs::copy(&artifact.path, &dest).map_err(|e| {
        DetailedError::wrap(e)
          .with_message("upload failed")
          .with_detail("artifact", &artifact.name)
          .with_detail("dest", dest.display())
      })?;
      progress::tick(bar);
      Ok(())
    });
  }
  group.wait()?;
  info!(upload = %upload.name, target = %target.display(), artifacts = artifacts.len(), "uploaded");
  Ok(())
}
