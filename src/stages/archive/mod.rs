//! Archives
//!
//! For each archive config, binaries are grouped by platform and each group
//! becomes one archive (one task per group). Format `binary` skips packing and
//! registers every binary as an uploadable binary instead.

mod writer;

pub use writer::{Entry, Format};

use crate::artifact::filter::{by_ids, by_types, only_replacing_universal};
use crate::artifact::{Artifact, ArtifactType, extra};
use crate::core::config::ArchiveConfig;
use crate::core::context::Context;
use crate::core::error::{ConfigError, YardResult};
use crate::core::tmpl::Template;
use crate::group::{Group, Parallel};
use crate::pipe::{Defaulter, Runner, Skip, Skipper, Stage, ensure_unique_ids, skip};
use crate::skips::Key;
use crate::ui::progress::{TaskProgress, tick};
use anyhow::bail;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

const DEFAULT_NAME_TEMPLATE: &str = "{project}_{version}_{os}_{arch}{variant}";
const DEFAULT_BINARY_NAME_TEMPLATE: &str = "{binary}_{version}_{os}_{arch}{variant}";

pub struct Archive;

impl Stage for Archive {
  fn name(&self) -> &str {
    "archive"
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

impl Defaulter for Archive {
  fn defaults(&self, ctx: &mut Context) -> YardResult<()> {
    if ctx.config.archives.is_empty() {
      ctx.config.archives.push(ArchiveConfig::default());
    }
    for archive in &mut ctx.config.archives {
      if archive.id.is_empty() {
        archive.id = "default".to_string();
      }
      if archive.format.is_empty() {
        archive.format = "tar.gz".to_string();
      }
      if archive.name_template.is_empty() {
        archive.name_template = if archive.format == Format::Binary.as_str() {
          DEFAULT_BINARY_NAME_TEMPLATE
        } else {
          DEFAULT_NAME_TEMPLATE
        }
        .to_string();
      }
      let formats = std::iter::once(archive.format.as_str())
        .chain(archive.format_overrides.iter().map(|o| o.format.as_str()));
      for format in formats {
        if Format::parse(format).is_none() {
          return Err(
            ConfigError::InvalidValue {
              field: format!("archives.format (archive '{}')", archive.id),
              value: format.to_string(),
              expected: "tar, tar.gz, tgz, zip or binary".to_string(),
            }
            .into(),
          );
        }
      }
    }
    ensure_unique_ids("archives", ctx.config.archives.iter().map(|a| a.id.as_str()))
  }
}

impl Skipper for Archive {
  fn skip(&self, ctx: &Context) -> YardResult<bool> {
    Ok(ctx.skips.any(&[Key::Archive]))
  }

  fn skip_reason(&self, _ctx: &Context) -> Skip {
    Skip::new("archiving is disabled")
  }
}

impl Runner for Archive {
  fn run(&self, ctx: &Context) -> YardResult<()> {
    let mut work: Vec<(&ArchiveConfig, Vec<Arc<Artifact>>)> = Vec::new();
    for archive in &ctx.config.archives {
      let view = ctx.artifacts.filter(
        by_types(&[ArtifactType::Binary, ArtifactType::UniversalBinary])
          .and(by_ids(&archive.ids))
          .and(only_replacing_universal()),
      );
      let groups = view.group_by_platform();
      if groups.is_empty() {
        warn!(archive = %archive.id, ids = ?archive.ids, "no binaries match archive");
        continue;
      }
      work.extend(groups.into_values().map(|binaries| (archive, binaries)));
    }

    if work.is_empty() {
      return Err(skip("no binaries to archive"));
    }

    let progress = TaskProgress::start(work.len(), "archiving");
    let names = Names::default();
    let names = &names;
    let mut group = Parallel::new(ctx.parallelism);
    for (archive, binaries) in work {
      let progress = progress.clone();
      group.go(move || {
        let result = create(ctx, archive, &binaries, names);
        tick(&progress);
        result
      });
    }
    group.wait()
  }
}

/// Output names claimed so far in one run
#[derive(Default)]
struct Names(Mutex<HashSet<String>>);

impl Names {
  fn claim(&self, name: &str) -> YardResult<()> {
    let mut taken = self.0.lock().unwrap_or_else(PoisonError::into_inner);
    if !taken.insert(name.to_string()) {
      bail!("archive named {} already exists. Check your archive name template", name);
    }
    Ok(())
  }
}

/// Format for a platform, honoring per-OS overrides
fn format_for(archive: &ArchiveConfig, os: &str) -> YardResult<Format> {
  let raw = archive
    .format_overrides
    .iter()
    .find(|o| o.os == os)
    .map(|o| o.format.as_str())
    .unwrap_or(archive.format.as_str());
  match Format::parse(raw) {
    Some(format) => Ok(format),
    None => bail!("invalid archive format: {}", raw),
  }
}

fn create(ctx: &Context, archive: &ArchiveConfig, binaries: &[Arc<Artifact>], names: &Names) -> YardResult<()> {
  let Some(first) = binaries.first() else {
    return Ok(());
  };
  let format = format_for(archive, &first.os)?;
  let template = Template::new(ctx).with_artifact(first).with("id", archive.id.clone());
  let base = template.apply(&archive.name_template)?;

  if format == Format::Binary {
    return register_binaries(ctx, archive, binaries, names);
  }

  let name = format!("{}{}", base, format.ext());
  names.claim(&name)?;
  let path = ctx.dist().join(&name);
  if path.exists() {
    bail!("archive named {} already exists. Check your archive name template", name);
  }
  let prefix = if archive.wrap_in_directory { format!("{}/", base) } else { String::new() };

  let mut entries: Vec<Entry> = binaries
    .iter()
    .map(|binary| Entry {
      source: binary.path.clone(),
      name: format!("{}{}", prefix, binary.name),
    })
    .collect();
  for file in &archive.files {
    let source = ctx.root().join(file);
    if !source.is_file() {
      bail!("archive '{}': file not found: {}", archive.id, file.display());
    }
    let file_name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    entries.push(Entry {
      source,
      name: format!("{}{}", prefix, file_name),
    });
  }

  info!(archive = %name, binaries = binaries.len(), "creating archive");
  writer::write(format, &path, &entries)?;

  let names: Vec<String> = binaries.iter().map(|b| b.name.clone()).collect();
  let artifact = Artifact::new(ArtifactType::UploadableArchive, name, path)
    .with_platform_of(first)
    .with_extra(extra::ID, archive.id.clone())
    .with_extra(extra::FORMAT, format.as_str())
    .with_extra(extra::EXT, format.ext())
    .with_extra(extra::WRAPPED_IN, prefix.trim_end_matches('/'))
    .with_extra(extra::BINARIES, names);
  ctx.artifacts.add(artifact);
  Ok(())
}

fn register_binaries(
  ctx: &Context,
  archive: &ArchiveConfig,
  binaries: &[Arc<Artifact>],
  names: &Names,
) -> YardResult<()> {
  for binary in binaries {
    let template = Template::new(ctx).with_artifact(binary).with("id", archive.id.clone());
    let ext = binary.extra.get_str(extra::EXT).unwrap_or("");
    let name = format!("{}{}", template.apply(&archive.name_template)?, ext);
    names.claim(&name)?;
    let uploadable = Artifact::new(ArtifactType::UploadableBinary, name, binary.path.clone())
      .with_platform_of(binary)
      .with_extra(extra::ID, archive.id.clone())
      .with_extra(extra::FORMAT, Format::Binary.as_str())
      .with_extra(extra::EXT, ext)
      .with_extra(extra::BINARY, binary.extra.get_str(extra::BINARY).unwrap_or(&binary.name));
    ctx.artifacts.add(uploadable);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::artifact::filter::by_type;
  use crate::core::config::{FormatOverride, Project};
  use std::fs;
  use tempfile::TempDir;

  fn binary(ctx: &Context, dir: &TempDir, os: &str, arch: &str) {
    named_binary(ctx, dir, "demo", os, arch);
  }

  fn named_binary(ctx: &Context, dir: &TempDir, name: &str, os: &str, arch: &str) {
    let folder = dir.path().join(format!("dist/{}_{}_{}", name, os, arch));
    fs::create_dir_all(&folder).unwrap();
    let ext = if os == "windows" { ".exe" } else { "" };
    let path = folder.join(format!("{}{}", name, ext));
    fs::write(&path, format!("{}-{}", os, arch)).unwrap();

    let mut a = Artifact::new(ArtifactType::Binary, format!("{}{}", name, ext), path)
      .with_extra(extra::ID, name)
      .with_extra(extra::BINARY, name)
      .with_extra(extra::EXT, ext);
    a.os = os.to_string();
    a.arch = arch.to_string();
    ctx.artifacts.add(a);
  }

  fn ctx(dir: &TempDir) -> Context {
    let project = Project {
      project_name: "demo".to_string(),
      version: Some("v1.0.0".to_string()),
      ..Project::default()
    };
    Context::new(dir.path(), project)
  }

  #[test]
  fn test_defaults() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ctx(&dir);
    Archive.defaults(&mut ctx).unwrap();
    Archive.defaults(&mut ctx).unwrap();
    assert_eq!(ctx.config.archives.len(), 1);
    assert_eq!(ctx.config.archives[0].id, "default");
    assert_eq!(ctx.config.archives[0].format, "tar.gz");
  }

  #[test]
  fn test_defaults_reject_unknown_format() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ctx(&dir);
    ctx.config.archives.push(ArchiveConfig {
      format: "rar".to_string(),
      ..ArchiveConfig::default()
    });
    assert!(Archive.defaults(&mut ctx).is_err());
  }

  #[test]
  fn test_duplicate_archive_ids() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ctx(&dir);
    for _ in 0..2 {
      ctx.config.archives.push(ArchiveConfig {
        id: "a".to_string(),
        ..ArchiveConfig::default()
      });
    }
    let err = Archive.defaults(&mut ctx).unwrap_err().to_string();
    assert!(err.contains("found 2"));
    assert!(err.contains("'a'"));
  }

  #[test]
  fn test_one_archive_per_platform() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ctx(&dir);
    ctx.parallelism = 2;
    fs::create_dir_all(dir.path().join("dist")).unwrap();
    fs::write(dir.path().join("LICENSE"), "MIT").unwrap();
    binary(&ctx, &dir, "linux", "amd64");
    binary(&ctx, &dir, "linux", "arm64");
    binary(&ctx, &dir, "windows", "amd64");
    ctx.config.archives.push(ArchiveConfig {
      format_overrides: vec![FormatOverride {
        os: "windows".to_string(),
        format: "zip".to_string(),
      }],
      files: vec!["LICENSE".into()],
      wrap_in_directory: true,
      ..ArchiveConfig::default()
    });
    Archive.defaults(&mut ctx).unwrap();
    Archive.run(&ctx).unwrap();

    let archives = ctx.artifacts.filter(by_type(ArtifactType::UploadableArchive)).list();
    assert_eq!(archives.len(), 3);

    let mut names: Vec<&str> = archives.iter().map(|a| a.name.as_str()).collect();
    names.sort();
    assert_eq!(
      names,
      vec![
        "demo_1.0.0_linux_amd64.tar.gz",
        "demo_1.0.0_linux_arm64.tar.gz",
        "demo_1.0.0_windows_amd64.zip",
      ]
    );
    for archive in &archives {
      assert!(archive.path.is_file());
      assert_eq!(archive.id(), "default");
    }
    let zip = archives.iter().find(|a| a.os == "windows").unwrap();
    assert_eq!(zip.extra.get_str(extra::FORMAT), Some("zip"));
    assert_eq!(zip.extra.get_str(extra::WRAPPED_IN), Some("demo_1.0.0_windows_amd64"));
  }

  #[test]
  fn test_binary_format() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ctx(&dir);
    binary(&ctx, &dir, "linux", "amd64");
    ctx.config.archives.push(ArchiveConfig {
      format: "binary".to_string(),
      name_template: "{binary}_{os}_{arch}".to_string(),
      ..ArchiveConfig::default()
    });
    Archive.defaults(&mut ctx).unwrap();
    Archive.run(&ctx).unwrap();

    let uploadable = ctx.artifacts.filter(by_type(ArtifactType::UploadableBinary)).list();
    assert_eq!(uploadable.len(), 1);
    assert_eq!(uploadable[0].name, "demo_linux_amd64");
  }

  #[test]
  fn test_binary_format_default_name_per_binary() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ctx(&dir);
    named_binary(&ctx, &dir, "cli", "linux", "amd64");
    named_binary(&ctx, &dir, "server", "linux", "amd64");
    ctx.config.archives.push(ArchiveConfig {
      format: "binary".to_string(),
      ..ArchiveConfig::default()
    });
    Archive.defaults(&mut ctx).unwrap();
    assert_eq!(ctx.config.archives[0].name_template, DEFAULT_BINARY_NAME_TEMPLATE);
    Archive.run(&ctx).unwrap();

    let mut names: Vec<String> = ctx
      .artifacts
      .filter(by_type(ArtifactType::UploadableBinary))
      .list()
      .iter()
      .map(|a| a.name.clone())
      .collect();
    names.sort();
    assert_eq!(names, vec!["cli_1.0.0_linux_amd64", "server_1.0.0_linux_amd64"]);
  }

  #[test]
  fn test_colliding_binary_names_fail() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ctx(&dir);
    named_binary(&ctx, &dir, "cli", "linux", "amd64");
    named_binary(&ctx, &dir, "server", "linux", "amd64");
    ctx.config.archives.push(ArchiveConfig {
      format: "binary".to_string(),
      name_template: "{project}_{os}_{arch}".to_string(),
      ..ArchiveConfig::default()
    });
    Archive.defaults(&mut ctx).unwrap();
    let err = Archive.run(&ctx).unwrap_err();
    assert!(!crate::pipe::is_skip(&err));
    assert!(err.to_string().contains("archive named demo_linux_amd64 already exists"), "{}", err);
  }

  #[test]
  fn test_existing_archive_file_fails() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ctx(&dir);
    binary(&ctx, &dir, "linux", "amd64");
    fs::write(dir.path().join("dist/demo_1.0.0_linux_amd64.tar.gz"), "old").unwrap();
    Archive.defaults(&mut ctx).unwrap();
    let err = Archive.run(&ctx).unwrap_err();
    assert!(err.to_string().contains("already exists"), "{}", err);
  }

  #[test]
  fn test_no_binaries_is_skip() {
    let dir = TempDir::new().unwrap();
    let mut ctx = ctx(&dir);
    Archive.defaults(&mut ctx).unwrap();
    let err = Archive.run(&ctx).unwrap_err();
    assert!(crate::pipe::is_skip(&err));
  }
}
