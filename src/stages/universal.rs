//! macOS universal binaries
//!
//! Combines the darwin binaries of the configured builds with `lipo`. With
//! `replace = true` the single-arch inputs leave the catalog, so archives only
//! see the universal binary.

use crate::artifact::filter::{by_ids, by_os, by_type};
use crate::artifact::{Artifact, ArtifactType, Filter, extra};
use crate::core::config::UniversalBinaryConfig;
use crate::core::context::Context;
use crate::core::error::YardResult;
use crate::core::exec::Cmd;
use crate::core::tmpl::Template;
use crate::group::{Group, Parallel, SkipAware};
use crate::pipe::{Defaulter, Dependencies, Runner, Skip, Skipper, Stage, ensure_unique_ids, skip};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub struct Universal;

impl Stage for Universal {
  fn name(&self) -> &str {
    "universal"
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

impl Defaulter for Universal {
  fn defaults(&self, ctx: &mut Context) -> YardResult<()> {
    let project = ctx.config.project_name.clone();
    for unibin in &mut ctx.config.universal_binaries {
      super::default_id(&mut unibin.id, &project);
      if unibin.ids.is_empty() {
        unibin.ids = vec![unibin.id.clone()];
      }
      if unibin.name_template.is_empty() {
        unibin.name_template = "{project}".to_string();
      }
    }
    ensure_unique_ids(
      "universal_binaries",
      ctx.config.universal_binaries.iter().map(|u| u.id.as_str()),
    )
  }
}

impl Skipper for Universal {
  fn skip(&self, ctx: &Context) -> YardResult<bool> {
    Ok(ctx.config.universal_binaries.is_empty())
  }

  fn skip_reason(&self, _ctx: &Context) -> Skip {
    Skip::new("no universal binaries configured")
  }
}

impl Dependencies for Universal {
  fn dependencies(&self, _ctx: &Context) -> Vec<String> {
    vec!["lipo".to_string()]
  }
}

impl Runner for Universal {
  fn run(&self, ctx: &Context) -> YardResult<()> {
    let mut group = SkipAware::new(Parallel::new(ctx.parallelism));
    for unibin in &ctx.config.universal_binaries {
      group.go(move || make_universal(ctx, unibin));
    }
    group.wait()
  }
}

fn make_universal(ctx: &Context, unibin: &UniversalBinaryConfig) -> YardResult<()> {
  let inputs = ctx
    .artifacts
    .filter(by_type(ArtifactType::Binary).and(by_os("darwin")).and(by_ids(&unibin.ids)))
    .list();
  if inputs.is_empty() {
    return Err(skip(format!("no darwin binaries found for ids {:?}", unibin.ids)));
  }

  let template = Template::new(ctx).with("id", unibin.id.clone());
  let name = template.apply(&unibin.name_template)?;
  let output = ctx.dist().join(format!("{}_darwin_all", unibin.id)).join(&name);
  if let Some(parent) = output.parent() {
    fs::create_dir_all(parent)?;
  }

  let mut argv = vec!["lipo".to_string(), "-create".to_string(), "-output".to_string()];
  argv.push(output.display().to_string());
  argv.extend(inputs.iter().map(|a| a.path.display().to_string()));
  info!(id = %unibin.id, inputs = inputs.len(), "creating universal binary");
  Cmd::from_argv(&argv)?.in_context(ctx).run()?;

  let mut universal = Artifact::new(ArtifactType::UniversalBinary, name.clone(), &output)
    .with_extra(extra::ID, unibin.id.clone())
    .with_extra(extra::BINARY, name)
    .with_extra(extra::REPLACES, unibin.replace);
  universal.os = "darwin".to_string();
  universal.arch = "all".to_string();

  if unibin.replace {
    remove_inputs(ctx, inputs.iter().map(|a| a.path.clone()).collect());
  }
  ctx.artifacts.add(universal);
  Ok(())
}

fn remove_inputs(ctx: &Context, paths: HashSet<PathBuf>) {
  let removed = ctx.artifacts.remove(&Filter::new(move |a| {
    a.kind == ArtifactType::Binary && paths.contains(&a.path)
  }));
  info!(removed, "replaced single-arch binaries");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::Project;
  use crate::pipe::is_skip;

  fn darwin_binary(ctx: &Context, arch: &str, id: &str) {
    let mut a = Artifact::new(ArtifactType::Binary, "demo", format!("/dist/{}_{}/demo", id, arch))
      .with_extra(extra::ID, id);
    a.os = "darwin".to_string();
    a.arch = arch.to_string();
    ctx.artifacts.add(a);
  }

  #[test]
  fn test_defaults() {
    let mut project = Project {
      project_name: "demo".to_string(),
      ..Project::default()
    };
    project.universal_binaries.push(UniversalBinaryConfig::default());
    let mut ctx = Context::new("/tmp", project);
    Universal.defaults(&mut ctx).unwrap();
    let unibin = &ctx.config.universal_binaries[0];
    assert_eq!(unibin.id, "demo");
    assert_eq!(unibin.ids, vec!["demo"]);
    assert_eq!(unibin.name_template, "{project}");
    assert!(Universal.skip(&Context::new("/tmp", Project::default())).unwrap());
  }

  #[test]
  fn test_no_inputs_is_skip() {
    let mut project = Project::default();
    project.universal_binaries.push(UniversalBinaryConfig {
      id: "demo".to_string(),
      ids: vec!["other".to_string()],
      name_template: "{project}".to_string(),
      replace: false,
    });
    let ctx = Context::new("/tmp", project);
    darwin_binary(&ctx, "amd64", "demo");
    let err = Universal.run(&ctx).unwrap_err();
    assert!(is_skip(&err));
  }

  #[test]
  fn test_remove_inputs() {
    let ctx = Context::new("/tmp", Project::default());
    darwin_binary(&ctx, "amd64", "demo");
    darwin_binary(&ctx, "arm64", "demo");
    darwin_binary(&ctx, "arm64", "other");
    let paths = ctx
      .artifacts
      .filter(by_ids(&["demo"]))
      .paths()
      .into_iter()
      .collect();
    remove_inputs(&ctx, paths);
    assert_eq!(ctx.artifacts.len(), 1);
    assert_eq!(ctx.artifacts.list()[0].id(), "other");
  }
}
