//! Check trait abstraction for pre-flight health checks
//!
//! All checks implement the `Check` trait and are registered in a
//! [`super::CheckRunner`], so adding a check never touches the orchestrator.

use crate::core::context::Context;
use crate::core::error::YardResult;
use crate::pipe::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How much a failed check matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Info,
  /// Reported, never stops a run
  Warning,
  /// Stops a run before any stage starts
  Error,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Severity::Info => "INFO",
      Severity::Warning => "WARN",
      Severity::Error => "ERROR",
    })
  }
}

/// Outcome of one check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
  pub check_name: String,
  pub passed: bool,
  pub severity: Severity,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub suggestion: Option<String>,
  /// Structured data for the failure summary (e.g. missing tool -> stages)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<serde_json::Value>,
}

impl CheckResult {
  pub fn pass(check_name: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(check_name.into(), true, Severity::Info, message.into(), None)
  }

  pub fn error(check_name: impl Into<String>, message: impl Into<String>, suggestion: Option<impl Into<String>>) -> Self {
    Self::new(
      check_name.into(),
      false,
      Severity::Error,
      message.into(),
      suggestion.map(Into::into),
    )
  }

  pub fn warning(check_name: impl Into<String>, message: impl Into<String>, suggestion: Option<impl Into<String>>) -> Self {
    Self::new(
      check_name.into(),
      false,
      Severity::Warning,
      message.into(),
      suggestion.map(Into::into),
    )
  }

  fn new(check_name: String, passed: bool, severity: Severity, message: String, suggestion: Option<String>) -> Self {
    Self {
      check_name,
      passed,
      severity,
      message,
      suggestion,
      details: None,
    }
  }

  pub fn with_details(mut self, details: serde_json::Value) -> Self {
    self.details = Some(details);
    self
  }

  /// Failed with error severity
  pub fn is_blocking(&self) -> bool {
    !self.passed && self.severity == Severity::Error
  }
}

/// What a check may look at: the defaulted run context and the stage list
pub struct CheckContext<'a> {
  pub ctx: &'a Context,
  pub stages: &'a [Box<dyn Stage>],
}

/// A named health check, run by the `healthcheck` command and (for
/// [`super::DependencyCheck`]) before every pipeline run
///
/// # Example
///
/// ```rust,ignore
/// struct VersionSet;
///
/// impl Check for VersionSet {
///   fn name(&self) -> &str {
///     "version"
///   }
///
///   fn description(&self) -> &str {
///     "Checks that a release version is known"
///   }
///
///   fn run(&self, cc: &CheckContext) -> YardResult<CheckResult> {
///     if cc.ctx.version.is_empty() {
///       return Ok(CheckResult::warning(self.name(), "no version", Some("pass --release-version")));
///     }
///     Ok(CheckResult::pass(self.name(), "version set"))
///   }
/// }
/// ```
pub trait Check: Send + Sync {
  /// Short unique name shown in reports
  fn name(&self) -> &str;

  /// One line on what is being verified
  fn description(&self) -> &str;

  fn run(&self, cc: &CheckContext) -> YardResult<CheckResult>;
}
