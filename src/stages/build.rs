//! Builds binaries, one task per (build, target)
//!
//! The configured command runs once per target with the output path and the
//! target as template fields (and as `RAILYARD_*` environment variables). A
//! build may instead import a `prebuilt` file. The first task runs alone before
//! the rest fan out, so tool caches are warm when the parallel builds start.

use super::run_hooks;
use crate::artifact::{Artifact, ArtifactType, extra};
use crate::core::config::{BuildConfig, parse_env};
use crate::core::context::Context;
use crate::core::error::{ConfigError, DetailedError, YardResult};
use crate::core::exec::Cmd;
use crate::core::tmpl::Template;
use crate::group::{BlockingFirst, Group, Parallel};
use crate::pipe::{Defaulter, Dependencies, Runner, Skip, Skipper, Stage, ensure_unique_ids};
use crate::skips::Key;
use crate::ui::progress::{TaskProgress, tick};
use anyhow::{anyhow, bail};
use std::fs;
use std::path::PathBuf;
use tracing::info;

const DEFAULT_TARGETS: &[&str] = &["linux_amd64", "linux_arm64", "darwin_amd64", "darwin_arm64", "windows_amd64"];

pub struct Build;

impl Stage for Build {
  fn name(&self) -> &str {
    "build"
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

impl Defaulter for Build {
  fn defaults(&self, ctx: &mut Context) -> YardResult<()> {
    let project = ctx.config.project_name.clone();
    for build in &mut ctx.config.builds {
      super::default_id(&mut build.id, &project);
      if build.binary.is_empty() {
        build.binary = project.clone();
      }
      if build.targets.is_empty() {
        build.targets = DEFAULT_TARGETS.iter().map(|t| t.to_string()).collect();
      }
      if build.command.is_empty() && build.prebuilt.is_none() && !build.skip {
        return Err(
          ConfigError::MissingField {
            field: format!("builds.command (build '{}')", build.id),
          }
          .into(),
        );
      }
      for target in &build.targets {
        Target::parse(target)?;
      }
    }
    ensure_unique_ids("builds", ctx.config.builds.iter().map(|b| b.id.as_str()))
  }
}

impl Skipper for Build {
  fn skip(&self, ctx: &Context) -> YardResult<bool> {
    Ok(ctx.config.builds.iter().all(|b| b.skip))
  }

  fn skip_reason(&self, ctx: &Context) -> Skip {
    if ctx.config.builds.is_empty() {
      Skip::new("no builds configured")
    } else {
      Skip::new("every build has skip set")
    }
  }
}

impl Dependencies for Build {
  fn dependencies(&self, ctx: &Context) -> Vec<String> {
    ctx
      .config
      .builds
      .iter()
      .filter(|b| !b.skip && b.prebuilt.is_none())
      .filter_map(|b| b.command.first().cloned())
      .filter(|program| !program.contains('{'))
      .collect()
  }
}

impl Runner for Build {
  fn run(&self, ctx: &Context) -> YardResult<()> {
    let jobs: Vec<(&BuildConfig, Target)> = ctx
      .config
      .builds
      .iter()
      .filter(|b| !b.skip)
      .flat_map(|b| b.targets.iter().map(move |t| Target::parse(t).map(|target| (b, target))))
      .collect::<YardResult<_>>()?;

    let progress = TaskProgress::start(jobs.len(), "building");
    let mut group = BlockingFirst::new(Parallel::new(ctx.parallelism));
    for (build, target) in jobs {
      let progress = progress.clone();
      group.go(move || {
        let result = build_one(ctx, build, &target);
        tick(&progress);
        result
      });
    }
    group.wait()
  }
}

fn build_one(ctx: &Context, build: &BuildConfig, target: &Target) -> YardResult<()> {
  let ext = target.ext();
  let output = output_path(ctx, build, target);
  let dir = output.parent().map(PathBuf::from).unwrap_or_else(|| ctx.dist());
  let name = format!("{}{}", build.binary, ext);

  let mut binary = Artifact::new(ArtifactType::Binary, name, &output)
    .with_extra(extra::ID, build.id.clone())
    .with_extra(extra::BINARY, build.binary.clone())
    .with_extra(extra::EXT, ext);
  target.apply(&mut binary);

  let template = Template::new(ctx)
    .with_artifact(&binary)
    .with("output", output.display().to_string());
  let mut env = parse_env(&build.env);
  env.extend(target.env());
  env.push(("RAILYARD_OUTPUT".to_string(), output.display().to_string()));

  fs::create_dir_all(&dir)?;

  if !ctx.skips.any(&[Key::PreBuildHooks]) {
    run_hooks(ctx, &template, &build.hooks.pre, &env)?;
  }

  match &build.prebuilt {
    Some(prebuilt) => {
      let source = ctx.root().join(template.apply(prebuilt)?);
      if !source.is_file() {
        return Err(
          DetailedError::wrap(anyhow!("prebuilt binary not found: {}", source.display()))
            .with_detail("build", &build.id)
            .with_detail("target", &target.raw)
            .into(),
        );
      }
      fs::copy(&source, &output)?;
    }
    None => {
      let argv = template.apply_all(&build.command)?;
      info!(build = %build.id, target = %target.raw, "building");
      Cmd::from_argv(&argv)?.in_context(ctx).envs(env.clone()).run()?;
      if !output.is_file() {
        return Err(
          DetailedError::wrap(anyhow!("build command did not produce {}", output.display()))
            .with_detail("build", &build.id)
            .with_detail("target", &target.raw)
            .into(),
        );
      }
    }
  }

  if !ctx.skips.any(&[Key::PostBuildHooks]) {
    run_hooks(ctx, &template, &build.hooks.post, &env)?;
  }

  ctx.artifacts.add(binary);
  Ok(())
}

/// A build target: `os_arch` or `os_arch_variant`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
  pub raw: String,
  pub os: String,
  pub arch: String,
  pub arm: String,
  pub amd64: String,
  pub mips: String,
}

impl Target {
  pub fn parse(raw: &str) -> YardResult<Self> {
    let parts: Vec<&str> = raw.split('_').collect();
    let (os, arch, variant) = match parts.as_slice() {
      [os, arch] => (*os, *arch, None),
      [os, arch, variant] => (*os, *arch, Some(*variant)),
      _ => bail!(invalid_target(raw, "expected os_arch or os_arch_variant")),
    };
    if os.is_empty() || arch.is_empty() {
      bail!(invalid_target(raw, "expected os_arch or os_arch_variant"));
    }

    let mut target = Self {
      raw: raw.to_string(),
      os: os.to_string(),
      arch: arch.to_string(),
      arm: String::new(),
      amd64: String::new(),
      mips: String::new(),
    };

    match (arch, variant) {
      ("amd64", v) => target.amd64 = v.unwrap_or("v1").to_string(),
      ("arm", v) => target.arm = v.unwrap_or("6").to_string(),
      ("mips" | "mipsle" | "mips64" | "mips64le", v) => target.mips = v.unwrap_or("hardfloat").to_string(),
      (_, None) => {}
      (_, Some(_)) => bail!(invalid_target(raw, "variants are only supported for amd64, arm and mips")),
    }
    Ok(target)
  }

  /// Directory name inside dist, e.g. `linux_amd64_v1`
  fn dir_name(&self) -> String {
    let variant = [&self.amd64, &self.arm, &self.mips]
      .into_iter()
      .find(|v| !v.is_empty())
      .cloned()
      .unwrap_or_default();
    if variant.is_empty() {
      format!("{}_{}", self.os, self.arch)
    } else {
      format!("{}_{}_{}", self.os, self.arch, variant)
    }
  }

  fn ext(&self) -> &'static str {
    if self.os == "windows" { ".exe" } else { "" }
  }

  fn apply(&self, artifact: &mut Artifact) {
    artifact.os = self.os.clone();
    artifact.arch = self.arch.clone();
    artifact.arm = self.arm.clone();
    artifact.amd64 = self.amd64.clone();
    artifact.mips = self.mips.clone();
  }

  fn env(&self) -> Vec<(String, String)> {
    vec![
      ("RAILYARD_OS".to_string(), self.os.clone()),
      ("RAILYARD_ARCH".to_string(), self.arch.clone()),
      ("RAILYARD_TARGET".to_string(), self.raw.clone()),
    ]
  }
}

fn invalid_target(raw: &str, expected: &str) -> ConfigError {
  ConfigError::InvalidValue {
    field: "builds.targets".to_string(),
    value: raw.to_string(),
    expected: expected.to_string(),
  }
}

/// Path of a built binary, for tests and tools that predict outputs
pub fn output_path(ctx: &Context, build: &BuildConfig, target: &Target) -> PathBuf {
  ctx
    .dist()
    .join(format!("{}_{}", build.id, target.dir_name()))
    .join(format!("{}{}", build.binary, target.ext()))
}
