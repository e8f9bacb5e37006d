use crate::commands::{RunOptions, prepare};
use crate::core::error::YardResult;
use crate::pipeline::{Pipeline, RunReport};
use crate::skips;

/// Load the config and apply every release stage's defaults without running anything
pub fn run_check(opts: RunOptions) -> YardResult<()> {
  let mut ctx = prepare(&opts, skips::RELEASE)?;
  let pipeline = Pipeline::release();
  let mut report = RunReport::new();
  pipeline.defaults(&mut ctx, &mut report)?;

  if opts.json {
    println!("{}", serde_json::to_string_pretty(&ctx.config)?);
  } else {
    println!("✅ Config is valid ({} stages)", pipeline.stages().len());
  }
  Ok(())
}
