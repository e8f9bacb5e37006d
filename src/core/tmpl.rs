//! Name templates
//!
//! Archive names, signature paths, checksum file names and the like are
//! configured as templates with `{key}` placeholders:
//!
//! ```text
//! {project}_{version}_{os}_{arch}{variant}  ->  demo_1.2.0_linux_amd64v3
//! {artifact}.sig                            ->  demo_1.2.0_linux_amd64.tar.gz.sig
//! {env.GPG_KEY}                             ->  value from the run environment
//! ```
//!
//! `{{` and `}}` produce literal braces. An unknown key is an error rather than
//! an empty string, so a typo never silently produces a wrong file name.

use crate::artifact::{Artifact, extra};
use crate::core::context::Context;
use crate::core::error::YardResult;
use anyhow::bail;
use std::collections::BTreeMap;

/// Placeholder values for one expansion
#[derive(Clone)]
pub struct Template<'a> {
  ctx: &'a Context,
  fields: BTreeMap<String, String>,
}

impl<'a> Template<'a> {
  /// Project-wide fields: project, version, tag, major, minor, patch, prerelease, date, timestamp, dist
  pub fn new(ctx: &'a Context) -> Self {
    let mut fields = BTreeMap::new();
    fields.insert("project".to_string(), ctx.config.project_name.clone());
    fields.insert("version".to_string(), ctx.version_number().to_string());
    fields.insert("tag".to_string(), ctx.version.clone());
    fields.insert("date".to_string(), ctx.date.to_rfc3339());
    fields.insert("timestamp".to_string(), ctx.date.timestamp().to_string());
    fields.insert("dist".to_string(), ctx.dist().display().to_string());

    if let Ok(version) = semver::Version::parse(ctx.version_number()) {
      fields.insert("major".to_string(), version.major.to_string());
      fields.insert("minor".to_string(), version.minor.to_string());
      fields.insert("patch".to_string(), version.patch.to_string());
      fields.insert("prerelease".to_string(), version.pre.to_string());
    }

    Self { ctx, fields }
  }

  /// Platform and identity fields of an artifact
  pub fn with_artifact(mut self, artifact: &Artifact) -> Self {
    let variant = artifact.variant().to_string();
    let mut target = format!("{}_{}", artifact.os, artifact.arch);
    if !variant.is_empty() {
      target.push('_');
      target.push_str(&variant);
    }

    self.set("os", &artifact.os);
    self.set("arch", &artifact.arch);
    self.set("arm", &artifact.arm);
    self.set("amd64", &artifact.amd64);
    self.set("mips", &artifact.mips);
    self.set("variant", &variant);
    self.set("target", &target);
    self.set("id", artifact.id());
    self.set("artifact", &artifact.name);
    self.set("artifact_path", &artifact.path.display().to_string());
    self.set("ext", artifact.extra.get_str(extra::EXT).unwrap_or(""));
    if let Some(binary) = artifact.extra.get_str(extra::BINARY) {
      self.set("binary", binary);
    }
    self
  }

  /// Add or replace a single field
  pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
    self.fields.insert(key.to_string(), value.into());
    self
  }

  fn set(&mut self, key: &str, value: &str) {
    self.fields.insert(key.to_string(), value.to_string());
  }

  fn lookup(&self, key: &str) -> Option<String> {
    if let Some(name) = key.strip_prefix("env.") {
      return self
        .ctx
        .env
        .get(name)
        .cloned()
        .or_else(|| std::env::var(name).ok());
    }
    self.fields.get(key).cloned()
  }

  /// Expand every placeholder in `input`
  pub fn apply(&self, input: &str) -> YardResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
      match c {
        '{' if chars.peek() == Some(&'{') => {
          chars.next();
          out.push('{');
        }
        '}' if chars.peek() == Some(&'}') => {
          chars.next();
          out.push('}');
        }
        '{' => {
          let mut key = String::new();
          let mut closed = false;
          for k in chars.by_ref() {
            if k == '}' {
              closed = true;
              break;
            }
            key.push(k);
          }
          if !closed {
            bail!("template: unclosed placeholder in {:?}", input);
          }
          let key = key.trim();
          match self.lookup(key) {
            Some(value) => out.push_str(&value),
            None => bail!("template: unknown key {:?} in {:?}", key, input),
          }
        }
        '}' => bail!("template: unmatched '}}' in {:?}", input),
        other => out.push(other),
      }
    }

    Ok(out)
  }

  /// Expand each entry of a list (command arguments, file lists)
  pub fn apply_all(&self, inputs: &[String]) -> YardResult<Vec<String>> {
    inputs.iter().map(|s| self.apply(s)).collect()
  }
}
