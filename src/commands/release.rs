use std::time::Instant;

use crate::commands::{RunOptions, prepare};
use crate::core::error::YardResult;
use crate::pipeline::{Pipeline, RunReport};
use crate::skips::{self, Key};

/// Run the full release pipeline
pub fn run_release(opts: RunOptions) -> YardResult<()> {
  execute("release", Pipeline::release(), &opts, skips::RELEASE)
}

/// Run the build-only pipeline
pub fn run_build(opts: RunOptions) -> YardResult<()> {
  execute("build", Pipeline::build(), &opts, skips::BUILD)
}

fn execute(label: &str, pipeline: Pipeline, opts: &RunOptions, allowed: &[Key]) -> YardResult<()> {
  let started = Instant::now();
  let mut ctx = prepare(opts, allowed)?;

  if ctx.snapshot {
    println!("📸 Snapshot mode: nothing will be published");
  }
  if !ctx.skips.is_empty() {
    println!("⚠️  Skipping {}", ctx.skips.describe());
  }

  let mut report = RunReport::new();
  let result = pipeline.run(&mut ctx, &mut report);

  if opts.json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_summary(&report);
  }

  let elapsed = started.elapsed().as_secs_f64();
  match &result {
    Ok(()) => println!("✅ {} succeeded after {:.1}s", label, elapsed),
    Err(_) => println!("❌ {} failed after {:.1}s", label, elapsed),
  }
  result
}

fn print_summary(report: &RunReport) {
  let skips = report.skips();
  let failures = report.failures();
  if skips.is_empty() && failures.is_empty() {
    return;
  }

  println!();
  for (stage, reason) in skips {
    println!("  ⏭️  {}: {}", stage, reason);
  }
  for (stage, error) in failures {
    println!("  ❌ {}: {}", stage, error);
  }
  println!();
}
