//! External tool availability

use super::trait_def::{Check, CheckContext, CheckResult};
use crate::core::context::Context;
use crate::core::error::YardResult;
use crate::core::exec::look_path;
use crate::pipe::Stage;
use std::collections::BTreeMap;
use tracing::debug;

/// Resolves every command declared by an active stage against PATH.
///
/// A command declared by several stages is looked up once; every missing
/// command is reported in a single result.
pub struct DependencyCheck;

impl Check for DependencyCheck {
  fn name(&self) -> &str {
    "dependencies"
  }

  fn description(&self) -> &str {
    "Checks that every external tool the active stages need is installed"
  }

  fn run(&self, cc: &CheckContext) -> YardResult<CheckResult> {
    let needed = declared(cc.ctx, cc.stages);
    if needed.is_empty() {
      return Ok(CheckResult::pass(self.name(), "No external tools needed"));
    }

    let mut missing: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (cmd, stages) in &needed {
      match look_path(cmd) {
        Some(path) => debug!(cmd = %cmd, path = %path.display(), "tool found"),
        None => {
          missing.insert(cmd.clone(), stages.clone());
        }
      }
    }

    if missing.is_empty() {
      return Ok(CheckResult::pass(
        self.name(),
        format!("{} external tool(s) found", needed.len()),
      ));
    }

    let listing = missing
      .iter()
      .map(|(cmd, stages)| format!("{} (needed by {})", cmd, stages.join(", ")))
      .collect::<Vec<_>>()
      .join("; ");
    let details = serde_json::to_value(&missing)?;
    Ok(
      CheckResult::error(
        self.name(),
        format!("missing tools: {}", listing),
        Some("Install the tools or skip the stages that need them"),
      )
      .with_details(details),
    )
  }
}

/// Command -> stages declaring it, for stages that will not skip
fn declared(ctx: &Context, stages: &[Box<dyn Stage>]) -> BTreeMap<String, Vec<String>> {
  let mut needed: BTreeMap<String, Vec<String>> = BTreeMap::new();
  for stage in stages {
    let Some(deps) = stage.as_dependencies() else {
      continue;
    };
    if let Some(skipper) = stage.as_skipper()
      && let Ok(true) = skipper.skip(ctx)
    {
      continue;
    }
    for cmd in deps.dependencies(ctx) {
      if cmd.is_empty() {
        continue;
      }
      let users = needed.entry(cmd).or_default();
      if !users.iter().any(|s| s == stage.name()) {
        users.push(stage.name().to_string());
      }
    }
  }
  needed
}
