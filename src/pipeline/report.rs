//! Per-stage outcome of a run

use serde::Serialize;
use std::fmt;

/// Lifecycle position of one stage instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageState {
  Unconfigured,
  Defaulted,
  Skipped,
  Ready,
  Ran,
  Published,
  PublishSkipped,
  Done,
  Failed,
}

impl fmt::Display for StageState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      StageState::Unconfigured => "unconfigured",
      StageState::Defaulted => "defaulted",
      StageState::Skipped => "skipped",
      StageState::Ready => "ready",
      StageState::Ran => "ran",
      StageState::Published => "published",
      StageState::PublishSkipped => "publish skipped",
      StageState::Done => "done",
      StageState::Failed => "failed",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
  pub name: String,
  pub state: StageState,
  /// Why the run or publish phase was skipped
  #[serde(skip_serializing_if = "Option::is_none")]
  pub skip_reason: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

/// Outcome of every stage, in pipeline order
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
  pub stages: Vec<StageOutcome>,
}

impl RunReport {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn track(&mut self, name: &str) -> usize {
    self.stages.push(StageOutcome {
      name: name.to_string(),
      state: StageState::Unconfigured,
      skip_reason: None,
      error: None,
    });
    self.stages.len() - 1
  }

  pub(crate) fn set(&mut self, index: usize, state: StageState) {
    if let Some(outcome) = self.stages.get_mut(index) {
      outcome.state = state;
    }
  }

  pub(crate) fn skipped(&mut self, index: usize, state: StageState, reason: String) {
    if let Some(outcome) = self.stages.get_mut(index) {
      outcome.state = state;
      outcome.skip_reason = Some(reason);
    }
  }

  pub(crate) fn failed(&mut self, index: usize, err: &anyhow::Error) {
    if let Some(outcome) = self.stages.get_mut(index) {
      outcome.state = StageState::Failed;
      outcome.error = Some(format!("{:#}", err));
    }
  }

  pub fn state_of(&self, name: &str) -> Option<StageState> {
    self.stages.iter().find(|s| s.name == name).map(|s| s.state)
  }

  /// (stage, reason) for every skipped run or publish phase
  pub fn skips(&self) -> Vec<(&str, &str)> {
    self
      .stages
      .iter()
      .filter_map(|s| s.skip_reason.as_deref().map(|r| (s.name.as_str(), r)))
      .collect()
  }

  /// (stage, error) for every failed stage
  pub fn failures(&self) -> Vec<(&str, &str)> {
    self
      .stages
      .iter()
      .filter_map(|s| s.error.as_deref().map(|e| (s.name.as_str(), e)))
      .collect()
  }
}
