//! The skip signal: an outcome meaning "intentionally did nothing"
//!
//! A skip travels through the normal error channel so stages can return it with
//! `?`, but it is never a failure. Callers classify it with [`is_skip`], which
//! walks the whole error chain, so a skip wrapped in context or in a
//! [`crate::core::error::DetailedError`] is still recognized.

use crate::core::error::YardResult;
use std::borrow::Cow;
use std::fmt;

/// A single skip with its human-readable reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
  reason: Cow<'static, str>,
}

impl Skip {
  pub fn new(reason: impl Into<String>) -> Self {
    Self {
      reason: Cow::Owned(reason.into()),
    }
  }

  pub const fn from_static(reason: &'static str) -> Self {
    Self {
      reason: Cow::Borrowed(reason),
    }
  }

  pub fn reason(&self) -> &str {
    &self.reason
  }
}

impl fmt::Display for Skip {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.reason)
  }
}

impl std::error::Error for Skip {}

/// Running in snapshot mode; publishing and some validations are off
pub const SNAPSHOT_ENABLED: Skip = Skip::from_static("disabled during snapshot mode");
/// `--skip=publish`
pub const SKIP_PUBLISH_ENABLED: Skip = Skip::from_static("publishing is disabled");
/// Announcing is turned off for this run
pub const SKIP_ANNOUNCE_ENABLED: Skip = Skip::from_static("announcing is disabled");
/// `--skip=sign`
pub const SKIP_SIGN_ENABLED: Skip = Skip::from_static("artifact signing is disabled");
/// `--skip=validate`
pub const SKIP_VALIDATE_ENABLED: Skip = Skip::from_static("validation is disabled");

/// Build a skip error
pub fn skip(reason: impl Into<String>) -> anyhow::Error {
  anyhow::Error::new(Skip::new(reason))
}

/// Several skips merged into one outcome.
///
/// Reasons are kept in arrival order, duplicates included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSkip {
  reasons: Vec<String>,
}

impl MultiSkip {
  pub fn new(reasons: Vec<String>) -> Self {
    Self { reasons }
  }

  pub fn reasons(&self) -> &[String] {
    &self.reasons
  }
}

impl fmt::Display for MultiSkip {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.reasons.join(", "))
  }
}

impl std::error::Error for MultiSkip {}

/// Whether an error is a skip (single or merged) anywhere in its chain
pub fn is_skip(err: &anyhow::Error) -> bool {
  err
    .chain()
    .any(|cause| cause.is::<Skip>() || cause.is::<MultiSkip>())
}

/// Collects skips and reports them all at once, dropping repeated reasons
#[derive(Debug, Default)]
pub struct SkipMemento {
  skips: Vec<String>,
}

impl SkipMemento {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn remember(&mut self, err: &anyhow::Error) {
    let reason = err.to_string();
    if !self.skips.contains(&reason) {
      self.skips.push(reason);
    }
  }

  /// `Ok` if nothing was remembered, else one skip naming every reason
  pub fn evaluate(&self) -> YardResult<()> {
    if self.skips.is_empty() {
      return Ok(());
    }
    Err(skip(self.skips.join(", ")))
  }
}
