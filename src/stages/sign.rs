//! Detached signatures
//!
//! Each `[[signs]]` entry picks a class of artifacts and runs its command once
//! per artifact. The catalog is refreshed first so a checksum file reflects
//! everything built so far before it gets signed.

use crate::artifact::filter::{by_ids, by_type, by_types};
use crate::artifact::{Artifact, ArtifactType, Filter, extra};
use crate::core::config::SignConfig;
use crate::core::context::Context;
use crate::core::error::{ConfigError, DetailedError, YardResult};
use crate::core::exec::Cmd;
use crate::core::tmpl::Template;
use crate::group::{Group, Parallel, SkipAware};
use crate::pipe::{Defaulter, Dependencies, Runner, SKIP_SIGN_ENABLED, Skip, Skipper, Stage, ensure_unique_ids, skip};
use crate::skips::Key;
use std::sync::Arc;
use tracing::info;

const SELECTIONS: &[&str] = &["none", "all", "checksum", "archive", "binary", "sbom"];

pub struct Sign;

impl Stage for Sign {
  fn name(&self) -> &str {
    "sign"
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

impl Defaulter for Sign {
  fn defaults(&self, ctx: &mut Context) -> YardResult<()> {
    for sign in &mut ctx.config.signs {
      if sign.id.is_empty() {
        sign.id = "default".to_string();
      }
      if sign.cmd.is_empty() {
        sign.cmd = "gpg".to_string();
      }
      if sign.signature.is_empty() {
        sign.signature = "{artifact}.sig".to_string();
      }
      if sign.args.is_empty() {
        sign.args = ["--output", "{signature}", "--detach-sig", "{artifact_path}"]
          .iter()
          .map(|s| s.to_string())
          .collect();
      }
      if sign.artifacts.is_empty() {
        sign.artifacts = "none".to_string();
      }
      if !SELECTIONS.contains(&sign.artifacts.as_str()) {
        return Err(
          ConfigError::InvalidValue {
            field: format!("signs.{}.artifacts", sign.id),
            value: sign.artifacts.clone(),
            expected: SELECTIONS.join(", "),
          }
          .into(),
        );
      }
    }
    ensure_unique_ids("signs", ctx.config.signs.iter().map(|s| s.id.as_str()))
  }
}

impl Skipper for Sign {
  fn skip(&self, ctx: &Context) -> YardResult<bool> {
    Ok(ctx.skips.any(&[Key::Sign]) || ctx.config.signs.is_empty())
  }

  fn skip_reason(&self, ctx: &Context) -> Skip {
    if ctx.skips.any(&[Key::Sign]) {
      SKIP_SIGN_ENABLED
    } else {
      Skip::new("no signing configured")
    }
  }
}

impl Dependencies for Sign {
  fn dependencies(&self, ctx: &Context) -> Vec<String> {
    ctx
      .config
      .signs
      .iter()
      .filter(|s| s.artifacts != "none")
      .map(|s| s.cmd.clone())
      .collect()
  }
}

impl Runner for Sign {
  fn run(&self, ctx: &Context) -> YardResult<()> {
    ctx.artifacts.refresh()?;

    let mut group = SkipAware::new(Parallel::new(ctx.parallelism));
    for sign in &ctx.config.signs {
      if sign.artifacts == "none" {
        let id = sign.id.clone();
        group.go(move || Err(skip(format!("signing disabled for {}", id))));
        continue;
      }
      let selected = ctx.artifacts.filter(selection(sign)).list();
      if selected.is_empty() {
        let (id, artifacts) = (sign.id.clone(), sign.artifacts.clone());
        group.go(move || Err(skip(format!("no {} artifacts to sign for {}", artifacts, id))));
        continue;
      }
      for artifact in selected {
        group.go(move || sign_one(ctx, sign, &artifact));
      }
    }
    group.wait()
  }
}

fn selection(sign: &SignConfig) -> Filter {
  let kinds = match sign.artifacts.as_str() {
    "checksum" => return by_type(ArtifactType::Checksum),
    "archive" => by_type(ArtifactType::UploadableArchive),
    "binary" => by_type(ArtifactType::UploadableBinary),
    "sbom" => by_type(ArtifactType::Sbom),
    _ => by_types(&[
      ArtifactType::UploadableArchive,
      ArtifactType::UploadableBinary,
      ArtifactType::UploadableSourceArchive,
      ArtifactType::LinuxPackage,
      ArtifactType::Sbom,
    ])
    .or(by_type(ArtifactType::Checksum)),
  };
  // checksum files carry no build id, so the id filter never excludes them
  kinds.and(by_ids(&sign.ids).or(by_type(ArtifactType::Checksum)))
}

fn sign_one(ctx: &Context, sign: &SignConfig, artifact: &Arc<Artifact>) -> YardResult<()> {
  let template = Template::new(ctx).with_artifact(artifact);
  let name = template.apply(&sign.signature)?;
  let path = ctx.dist().join(&name);
  let template = template.with("signature", path.display().to_string());

  let mut argv = vec![sign.cmd.clone()];
  argv.extend(template.apply_all(&sign.args)?);
  info!(sign = %sign.id, artifact = %artifact.name, "signing");
  Cmd::from_argv(&argv)?.in_context(ctx).dir(&ctx.dist()).run()?;

  if !path.exists() {
    return Err(
      DetailedError::wrap(anyhow::anyhow!("signature was not written"))
        .with_detail("sign", &sign.id)
        .with_detail("signature", path.display())
        .into(),
    );
  }
  ctx.artifacts.add(
    Artifact::new(ArtifactType::Signature, name, path)
      .with_platform_of(artifact)
      .with_extra(extra::ID, sign.id.clone()),
  );
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::Project;
  use crate::pipe::is_skip;
  use std::fs;
  use tempfile::TempDir;

  fn context(dir: &TempDir, signs: Vec<SignConfig>) -> Context {
    fs::create_dir_all(dir.path().join("dist")).unwrap();
    let project = Project {
      project_name: "demo".to_string(),
      version: Some("1.0.0".to_string()),
      signs,
      ..Project::default()
    };
    let mut ctx = Context::new(dir.path(), project);
    Sign.defaults(&mut ctx).unwrap();
    ctx
  }

  fn add(ctx: &Context, kind: ArtifactType, name: &str, id: &str) {
    let path = ctx.dist().join(name);
    fs::write(&path, name).unwrap();
    let mut artifact = Artifact::new(kind, name, path);
    if !id.is_empty() {
      artifact = artifact.with_extra(extra::ID, id);
    }
    ctx.artifacts.add(artifact);
  }

  #[test]
  fn test_defaults() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, vec![SignConfig::default()]);
    let sign = &ctx.config.signs[0];
    assert_eq!(sign.id, "default");
    assert_eq!(sign.cmd, "gpg");
    assert_eq!(sign.signature, "{artifact}.sig");
    assert_eq!(sign.artifacts, "none");
    assert!(Sign.dependencies(&ctx).is_empty());
  }

  #[test]
  fn test_skip_reason_from_key() {
    let mut ctx = Context::new("/tmp", Project::default());
    ctx.config.signs.push(SignConfig::default());
    assert!(!Sign.skip(&ctx).unwrap());
    ctx.skips.set(Key::Sign);
    assert!(Sign.skip(&ctx).unwrap());
    assert_eq!(Sign.skip_reason(&ctx).reason(), "artifact signing is disabled");
  }

  #[test]
  fn test_none_is_skip() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, vec![SignConfig::default()]);
    assert!(is_skip(&Sign.run(&ctx).unwrap_err()));
  }

  #[test]
  fn test_selection() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, Vec::new());
    add(&ctx, ArtifactType::UploadableArchive, "a.tar.gz", "x");
    add(&ctx, ArtifactType::UploadableArchive, "b.tar.gz", "y");
    add(&ctx, ArtifactType::Checksum, "checksums.txt", "");
    add(&ctx, ArtifactType::Binary, "demo", "x");

    let sign = |artifacts: &str, ids: &[&str]| SignConfig {
      artifacts: artifacts.to_string(),
      ids: ids.iter().map(|s| s.to_string()).collect(),
      ..SignConfig::default()
    };
    assert_eq!(ctx.artifacts.filter(selection(&sign("checksum", &[]))).len(), 1);
    assert_eq!(ctx.artifacts.filter(selection(&sign("archive", &[]))).len(), 2);
    assert_eq!(ctx.artifacts.filter(selection(&sign("archive", &["y"]))).len(), 1);
    assert_eq!(ctx.artifacts.filter(selection(&sign("all", &["x"]))).len(), 2);
    assert_eq!(ctx.artifacts.filter(selection(&sign("binary", &[]))).len(), 0);
  }

  #[cfg(unix)]
  #[test]
  fn test_signs_checksum() {
    let dir = TempDir::new().unwrap();
    let ctx = context(
      &dir,
      vec![SignConfig {
        cmd: "cp".to_string(),
        args: vec!["{artifact_path}".to_string(), "{signature}".to_string()],
        artifacts: "checksum".to_string(),
        ..SignConfig::default()
      }],
    );
    add(&ctx, ArtifactType::Checksum, "checksums.txt", "");

    Sign.run(&ctx).unwrap();

    let sigs = ctx.artifacts.filter(by_type(ArtifactType::Signature)).list();
    assert_eq!(sigs.len(), 1);
    assert_eq!(sigs[0].name, "checksums.txt.sig");
    assert_eq!(fs::read_to_string(&sigs[0].path).unwrap(), "checksums.txt");
  }

  #[cfg(unix)]
  #[test]
  fn test_missing_signature_fails() {
    let dir = TempDir::new().unwrap();
    let ctx = context(
      &dir,
      vec![SignConfig {
        cmd: "true".to_string(),
        artifacts: "checksum".to_string(),
        ..SignConfig::default()
      }],
    );
    add(&ctx, ArtifactType::Checksum, "checksums.txt", "");
    let err = Sign.run(&ctx).unwrap_err();
    assert!(!is_skip(&err));
  }
}
