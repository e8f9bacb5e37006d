use crate::checks::{CheckContext, CheckResult, Severity, create_default_runner};
use crate::commands::{RunOptions, prepare};
use crate::core::error::{DetailedError, ExitCode, YardResult};
use crate::pipeline::{Pipeline, RunReport};
use crate::skips;
use anyhow::anyhow;

/// Run every built-in check against the defaulted release pipeline
pub fn run_healthcheck(opts: RunOptions) -> YardResult<()> {
  let mut ctx = prepare(&opts, skips::RELEASE)?;
  let pipeline = Pipeline::release();
  pipeline.defaults(&mut ctx, &mut RunReport::new())?;

  let runner = create_default_runner();
  let results = runner.run_all(&CheckContext {
    ctx: &ctx,
    stages: pipeline.stages(),
  });

  if opts.json {
    println!("{}", serde_json::to_string_pretty(&results)?);
  } else {
    print_results(&results);
  }

  let blocking = results.iter().filter(|r| r.is_blocking()).count();
  if blocking > 0 {
    return Err(
      DetailedError::wrap(anyhow!("{} of {} checks failed", blocking, results.len()))
        .with_message("healthcheck failed")
        .with_exit(ExitCode::Validation.as_i32())
        .into(),
    );
  }
  Ok(())
}

fn print_results(results: &[CheckResult]) {
  println!("🩺 Health check");
  println!();
  for result in results {
    let icon = match (result.passed, result.severity) {
      (true, _) => "✅",
      (false, Severity::Error) => "❌",
      (false, Severity::Warning) => "⚠️ ",
      (false, Severity::Info) => "ℹ️ ",
    };
    println!("  {} {}: {}", icon, result.check_name, result.message);
    if let Some(suggestion) = &result.suggestion {
      println!("     💡 {}", suggestion);
    }
  }
  println!();
}
