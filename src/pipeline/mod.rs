//! Stage orchestration
//!
//! A [`Pipeline`] drives an ordered stage list through the lifecycle:
//!
//! ```text
//! defaults (every stage)      config errors abort here, nothing has run yet
//!   -> preflight              every missing tool reported at once
//!   -> run (stage by stage)   skip gate, then Runner
//!   -> catalog refresh
//!   -> publish (stage by stage) publish gate, then Publisher
//! ```
//!
//! Stage N finishes running before stage N+1 starts, and every run phase is
//! done before the first publish phase begins. A stage marked
//! `continue_on_error` has its failure recorded and the pipeline keeps going;
//! the run still fails at the end, with that error or with a summary naming
//! every failed stage.

mod report;

pub use report::{RunReport, StageOutcome, StageState};

use crate::checks;
use crate::core::context::Context;
use crate::core::error::{DetailedError, YardResult};
use crate::pipe::{SKIP_PUBLISH_ENABLED, SNAPSHOT_ENABLED, Stage, is_skip};
use crate::skips::Key;
use crate::stages;
use anyhow::{Context as _, anyhow};
use tracing::{info, warn};

/// An ordered stage list
pub struct Pipeline {
  stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
  pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
    Self { stages }
  }

  /// Full release: build, package, sign and publish
  pub fn release() -> Self {
    Self::new(vec![
      Box::new(stages::validate::Validate),
      Box::new(stages::before::Before),
      Box::new(stages::dist::Dist),
      Box::new(stages::build::Build),
      Box::new(stages::universal::Universal),
      Box::new(stages::archive::Archive),
      Box::new(stages::sbom::Sbom),
      Box::new(stages::checksum::Checksum),
      Box::new(stages::sign::Sign),
      Box::new(stages::metadata::Metadata),
      Box::new(stages::upload::Upload),
    ])
  }

  /// Build only: binaries land in dist, nothing is packaged or published
  pub fn build() -> Self {
    Self::new(vec![
      Box::new(stages::validate::Validate),
      Box::new(stages::before::Before),
      Box::new(stages::dist::Dist),
      Box::new(stages::build::Build),
      Box::new(stages::universal::Universal),
      Box::new(stages::metadata::Metadata),
    ])
  }

  pub fn stages(&self) -> &[Box<dyn Stage>] {
    &self.stages
  }

  /// Normalize configuration for every stage.
  ///
  /// Returns the report slot of each stage, in order.
  pub fn defaults(&self, ctx: &mut Context, report: &mut RunReport) -> YardResult<Vec<usize>> {
    let mut slots = Vec::with_capacity(self.stages.len());
    for stage in &self.stages {
      let slot = report.track(stage.name());
      slots.push(slot);
      if let Some(defaulter) = stage.as_defaulter()
        && let Err(err) = defaulter.defaults(ctx)
      {
        report.failed(slot, &err);
        return Err(DetailedError::wrap(err).with_detail("stage", stage.name()).into());
      }
      report.set(slot, StageState::Defaulted);
    }
    Ok(slots)
  }

  /// Run the whole lifecycle
  pub fn run(&self, ctx: &mut Context, report: &mut RunReport) -> YardResult<()> {
    let slots = self.defaults(ctx, report)?;
    let ctx: &Context = ctx;

    checks::preflight(ctx, &self.stages)?;

    let mut deferred: Vec<anyhow::Error> = Vec::new();

    for (stage, &slot) in self.stages.iter().zip(&slots) {
      if skip_gate(stage.as_ref(), ctx, report, slot, StageState::Skipped)? {
        continue;
      }
      report.set(slot, StageState::Ready);

      let Some(runner) = stage.as_runner() else {
        continue;
      };
      info!(stage = stage.name(), "running");
      match runner.run(ctx) {
        Ok(()) => report.set(slot, StageState::Ran),
        Err(err) if is_skip(&err) => {
          warn!(stage = stage.name(), reason = %err, "skipped");
          report.skipped(slot, StageState::Skipped, err.to_string());
        }
        Err(err) => self.fail(stage.as_ref(), ctx, report, slot, err, &mut deferred)?,
      }
    }

    ctx.artifacts.refresh()?;

    for (stage, &slot) in self.stages.iter().zip(&slots) {
      let state = report.stages[slot].state;
      if matches!(state, StageState::Skipped | StageState::Failed) {
        continue;
      }
      let Some(publisher) = stage.as_publisher() else {
        report.set(slot, StageState::Done);
        continue;
      };

      if let Some(reason) = publish_blocked(ctx) {
        info!(stage = stage.name(), reason = %reason, "not publishing");
        report.skipped(slot, StageState::PublishSkipped, reason);
        continue;
      }
      if skip_gate(stage.as_ref(), ctx, report, slot, StageState::PublishSkipped)? {
        continue;
      }

      info!(stage = stage.name(), "publishing");
      match publisher.publish(ctx) {
        Ok(()) => report.set(slot, StageState::Published),
        Err(err) if is_skip(&err) => {
          warn!(stage = stage.name(), reason = %err, "publish skipped");
          report.skipped(slot, StageState::PublishSkipped, err.to_string());
          continue;
        }
        Err(err) => {
          self.fail(stage.as_ref(), ctx, report, slot, err, &mut deferred)?;
          continue;
        }
      }
      report.set(slot, StageState::Done);
    }

    match deferred.len() {
      0 => Ok(()),
      1 => Err(deferred.remove(0)),
      n => {
        let names = report
          .failures()
          .iter()
          .map(|(name, _)| *name)
          .collect::<Vec<_>>()
          .join(", ");
        Err(anyhow!("{} stages failed: {}", n, names))
      }
    }
  }

  fn fail(
    &self,
    stage: &dyn Stage,
    ctx: &Context,
    report: &mut RunReport,
    slot: usize,
    err: anyhow::Error,
    deferred: &mut Vec<anyhow::Error>,
  ) -> YardResult<()> {
    report.failed(slot, &err);
    let err = DetailedError::wrap(err).with_detail("stage", stage.name());
    if stage.continue_on_error() && !ctx.fail_fast {
      warn!(stage = stage.name(), error = %err, "failed, continuing");
      deferred.push(err.into());
      return Ok(());
    }
    Err(err.into())
  }
}

/// Evaluate a stage's skipper; records the skip and returns true when it says so
fn skip_gate(stage: &dyn Stage, ctx: &Context, report: &mut RunReport, slot: usize, state: StageState) -> YardResult<bool> {
  let Some(skipper) = stage.as_skipper() else {
    return Ok(false);
  };
  let skip = skipper
    .skip(ctx)
    .with_context(|| format!("skip {}", stage.name()))?;
  if skip {
    let reason = skipper.skip_reason(ctx).to_string();
    info!(stage = stage.name(), reason = %reason, "skipped");
    report.skipped(slot, state, reason);
  }
  Ok(skip)
}

fn publish_blocked(ctx: &Context) -> Option<String> {
  if ctx.skips.any(&[Key::Publish]) {
    return Some(SKIP_PUBLISH_ENABLED.to_string());
  }
  if ctx.snapshot {
    return Some(SNAPSHOT_ENABLED.to_string());
  }
  None
}
