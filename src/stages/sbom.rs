//! Software bills of materials
//!
//! Runs a cataloger (`syft` unless configured otherwise) once per selected
//! artifact, or once for the whole project with `artifacts = "any"`. Every
//! document the command is expected to write must exist afterwards.

use crate::artifact::filter::{by_ids, by_type};
use crate::artifact::{Artifact, ArtifactType, extra};
use crate::core::config::SbomConfig;
use crate::core::context::Context;
use crate::core::error::{ConfigError, DetailedError, YardResult};
use crate::core::exec::Cmd;
use crate::core::tmpl::Template;
use crate::group::{Group, Parallel, SkipAware};
use crate::pipe::{Defaulter, Dependencies, Runner, Skip, Skipper, Stage, ensure_unique_ids, skip};
use crate::skips::Key;
use std::sync::Arc;
use tracing::info;

const SELECTIONS: &[&str] = &["archive", "binary", "any"];

pub struct Sbom;

impl Stage for Sbom {
  fn name(&self) -> &str {
    "sbom"
  }

  fn as_defaulter(&self) -> Option<&dyn Defaulter> {
    Some(self)
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

impl Defaulter for Sbom {
  fn defaults(&self, ctx: &mut Context) -> YardResult<()> {
    for sbom in &mut ctx.config.sboms {
      if sbom.id.is_empty() {
        sbom.id = "default".to_string();
      }
      if sbom.artifacts.is_empty() {
        sbom.artifacts = "archive".to_string();
      }
      if !SELECTIONS.contains(&sbom.artifacts.as_str()) {
        return Err(
          ConfigError::InvalidValue {
            field: format!("sboms.{}.artifacts", sbom.id),
            value: sbom.artifacts.clone(),
            expected: SELECTIONS.join(", "),
          }
          .into(),
        );
      }
      if sbom.documents.is_empty() {
        let document = match sbom.artifacts.as_str() {
          "any" => "{project}_{version}.sbom.json",
          _ => "{artifact}.sbom.json",
        };
        sbom.documents = vec![document.to_string()];
      }
      if sbom.cmd.is_empty() {
        sbom.cmd = "syft".to_string();
      }
      if sbom.args.is_empty() && sbom.cmd == "syft" {
        let source = if sbom.artifacts == "any" { "dir:{root}" } else { "{artifact_path}" };
        sbom.args = vec![
          source.to_string(),
          "--output".to_string(),
          "spdx-json={document}".to_string(),
          "--quiet".to_string(),
        ];
      }
      if sbom.documents.len() > 1 && sbom.args.iter().any(|a| a.contains("{document}")) {
        return Err(
          ConfigError::InvalidValue {
            field: format!("sboms.{}.args", sbom.id),
            value: "{document}".to_string(),
            expected: "{document0}, {document1}, ... when more than one document is configured".to_string(),
          }
          .into(),
        );
      }
    }
    ensure_unique_ids("sboms", ctx.config.sboms.iter().map(|s| s.id.as_str()))
  }
}

impl Skipper for Sbom {
  fn skip(&self, ctx: &Context) -> YardResult<bool> {
    Ok(ctx.skips.any(&[Key::Sbom]) || ctx.config.sboms.is_empty())
  }

  fn skip_reason(&self, ctx: &Context) -> Skip {
    if ctx.skips.any(&[Key::Sbom]) {
      Skip::new("sbom cataloging is disabled")
    } else {
      Skip::new("no sboms configured")
    }
  }
}

impl Dependencies for Sbom {
  fn dependencies(&self, ctx: &Context) -> Vec<String> {
    ctx.config.sboms.iter().map(|s| s.cmd.clone()).collect()
  }
}

impl Runner for Sbom {
  fn run(&self, ctx: &Context) -> YardResult<()> {
    let mut group = SkipAware::new(Parallel::new(ctx.parallelism));
    for sbom in &ctx.config.sboms {
      if sbom.artifacts == "any" {
        group.go(move || catalog(ctx, sbom, None));
        continue;
      }
      let kind = match sbom.artifacts.as_str() {
        "binary" => ArtifactType::Binary,
        _ => ArtifactType::UploadableArchive,
      };
      let selected = ctx.artifacts.filter(by_type(kind).and(by_ids(&sbom.ids))).list();
      if selected.is_empty() {
        let id = sbom.id.clone();
        group.go(move || Err(skip(format!("no {} artifacts to catalog for sbom {}", kind, id))));
        continue;
      }
      for artifact in selected {
        group.go(move || catalog(ctx, sbom, Some(&artifact)));
      }
    }
    group.wait()
  }
}

fn catalog(ctx: &Context, sbom: &SbomConfig, artifact: Option<&Arc<Artifact>>) -> YardResult<()> {
  let mut template = Template::new(ctx).with("root", ctx.root().display().to_string());
  if let Some(artifact) = artifact {
    template = template.with_artifact(artifact);
  }

  let mut documents = Vec::with_capacity(sbom.documents.len());
  for (i, document) in sbom.documents.iter().enumerate() {
    let name = template.apply(document)?;
    let path = ctx.dist().join(&name);
    let rendered = path.display().to_string();
    template = template.with(&format!("document{}", i), rendered.clone());
    if i == 0 {
      template = template.with("document", rendered);
    }
    documents.push((name, path));
  }

  let mut argv = vec![sbom.cmd.clone()];
  argv.extend(template.apply_all(&sbom.args)?);
  info!(sbom = %sbom.id, artifact = artifact.map(|a| a.name.as_str()).unwrap_or("project"), "cataloging");
  Cmd::from_argv(&argv)?.in_context(ctx).dir(&ctx.dist()).run()?;

  for (name, path) in documents {
    if !path.exists() {
      return Err(
        DetailedError::wrap(anyhow::anyhow!("sbom document was not written"))
          .with_detail("sbom", &sbom.id)
          .with_detail("document", path.display())
          .into(),
      );
    }
    let mut document = Artifact::new(ArtifactType::Sbom, name, path).with_extra(extra::ID, sbom.id.clone());
    if let Some(artifact) = artifact {
      document = document.with_platform_of(artifact);
    }
    ctx.artifacts.add(document);
  }
  Ok(())
}
