//! Skip registry for the `--skip` flag
//!
//! A run holds a set of [`Key`]s fixed before the pipeline starts. Each pipeline
//! kind accepts its own closed allow-list ([`RELEASE`], [`BUILD`]); anything else
//! is a configuration error.

use crate::core::error::{ConfigError, YardResult};
use std::collections::BTreeSet;
use std::fmt;

/// A named skip flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
  PreBuildHooks,
  PostBuildHooks,
  Publish,
  Sign,
  Validate,
  Sbom,
  Before,
  Archive,
}

impl Key {
  pub const ALL: &'static [Key] = &[
    Key::PreBuildHooks,
    Key::PostBuildHooks,
    Key::Publish,
    Key::Sign,
    Key::Validate,
    Key::Sbom,
    Key::Before,
    Key::Archive,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Key::PreBuildHooks => "pre-hooks",
      Key::PostBuildHooks => "post-hooks",
      Key::Publish => "publish",
      Key::Sign => "sign",
      Key::Validate => "validate",
      Key::Sbom => "sbom",
      Key::Before => "before",
      Key::Archive => "archive",
    }
  }

  pub fn parse(s: &str) -> Option<Key> {
    Key::ALL.iter().copied().find(|k| k.as_str() == s)
  }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Skips accepted by `railyard release`
pub const RELEASE: &[Key] = &[
  Key::Publish,
  Key::Sign,
  Key::Validate,
  Key::Sbom,
  Key::Before,
  Key::Archive,
];

/// Skips accepted by `railyard build`
pub const BUILD: &[Key] = &[Key::PreBuildHooks, Key::PostBuildHooks, Key::Validate, Key::Before];

/// Sorted names of an allow-list
pub fn list(keys: &[Key]) -> Vec<String> {
  let mut names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
  names.sort();
  names
}

/// Allow-list names starting with `prefix`, for shell completion
pub fn complete(keys: &[Key], prefix: &str) -> Vec<String> {
  let prefix = prefix.to_lowercase();
  list(keys).into_iter().filter(|k| k.starts_with(&prefix)).collect()
}

/// The set of skips active for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skips {
  keys: BTreeSet<Key>,
}

impl Skips {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set raw `--skip` values, validating each against `allowed`.
  ///
  /// Empty strings are ignored, so `--skip=` is accepted.
  pub fn set_from<S: AsRef<str>>(&mut self, allowed: &[Key], raw: &[S]) -> YardResult<()> {
    for value in raw {
      let value = value.as_ref().trim();
      if value.is_empty() {
        continue;
      }
      match Key::parse(value).filter(|k| allowed.contains(k)) {
        Some(key) => {
          self.keys.insert(key);
        }
        None => {
          return Err(
            ConfigError::SkipNotAllowed {
              key: value.to_string(),
              allowed: list(allowed),
            }
            .into(),
          );
        }
      }
    }
    Ok(())
  }

  pub fn set(&mut self, key: Key) {
    self.keys.insert(key);
  }

  /// Whether any of `keys` is set
  pub fn any(&self, keys: &[Key]) -> bool {
    keys.iter().any(|k| self.keys.contains(k))
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }

  /// Human listing: `a`, `a and b`, `a, b, and c`
  pub fn describe(&self) -> String {
    let mut names: Vec<&str> = self.keys.iter().map(|k| k.as_str()).collect();
    names.sort_unstable();
    match names.as_slice() {
      [] => String::new(),
      [one] => one.to_string(),
      [first, second] => format!("{} and {}", first, second),
      [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
  }
}
