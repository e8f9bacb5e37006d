use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use railyard::commands::{self, RunOptions};
use railyard::core::error::{exit_code_of, print_error};
use tracing_subscriber::EnvFilter;

/// Build, package, checksum, sign and publish release artifacts
#[derive(Parser)]
#[command(name = "railyard")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  #[command(subcommand)]
  command: Commands,

  /// Config file (default: railyard.toml in the current directory)
  #[arg(short = 'f', long, global = true)]
  config: Option<PathBuf>,

  /// Debug logging (RAILYARD_LOG overrides)
  #[arg(short, long, global = true)]
  verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Pipelines
  // ============================================================================
  /// Run the full release: build, archive, checksum, sign, publish
  Release(RunArgs),

  /// Build binaries into dist without packaging or publishing
  Build(RunArgs),

  // ============================================================================
  // Inspection
  // ============================================================================
  /// Validate the config by applying every stage's defaults
  Check {
    /// Print the defaulted config as JSON
    #[arg(long)]
    json: bool,
  },

  /// Check that every needed tool is installed and the workspace is ready
  Healthcheck {
    /// Output results in JSON format
    #[arg(long)]
    json: bool,
  },
}

#[derive(Args)]
struct RunArgs {
  /// Build without a release version and never publish
  #[arg(long)]
  snapshot: bool,

  /// Skip parts of the run (comma-separated, e.g. sign,publish)
  #[arg(long, value_delimiter = ',')]
  skip: Vec<String>,

  /// Maximum concurrent tasks per stage (default: number of CPUs)
  #[arg(short, long, default_value_t = 0)]
  parallelism: usize,

  /// Remove the dist directory before running
  #[arg(long)]
  clean: bool,

  /// Version to release (default: config `version`, then RAILYARD_CURRENT_TAG)
  #[arg(long)]
  release_version: Option<String>,

  /// Abort on the first failure, even for stages that normally keep going
  #[arg(long)]
  fail_fast: bool,

  /// Timeout for each external command, in seconds
  #[arg(long)]
  timeout: Option<u64>,

  /// Print the per-stage report as JSON
  #[arg(long)]
  json: bool,
}

impl RunArgs {
  fn into_options(self, root: PathBuf, config: Option<PathBuf>) -> RunOptions {
    RunOptions {
      root,
      config,
      snapshot: self.snapshot,
      skip: self.skip,
      parallelism: self.parallelism,
      clean: self.clean,
      version: self.release_version,
      fail_fast: self.fail_fast,
      timeout: self.timeout.map(Duration::from_secs),
      json: self.json,
    }
  }
}

fn get_styles() -> clap::builder::Styles {
  let yellow = anstyle::Color::Ansi(anstyle::AnsiColor::Yellow);
  let green = anstyle::Color::Ansi(anstyle::AnsiColor::Green);
  let red = anstyle::Color::Ansi(anstyle::AnsiColor::Red);
  clap::builder::Styles::styled()
    .usage(anstyle::Style::new().bold().underline().fg_color(Some(yellow)))
    .header(anstyle::Style::new().bold().underline().fg_color(Some(yellow)))
    .literal(anstyle::Style::new().fg_color(Some(green)))
    .invalid(anstyle::Style::new().bold().fg_color(Some(red)))
    .error(anstyle::Style::new().bold().fg_color(Some(red)))
    .valid(anstyle::Style::new().bold().underline().fg_color(Some(green)))
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn init_tracing(verbose: bool) {
  let filter = EnvFilter::try_from_env("RAILYARD_LOG")
    .unwrap_or_else(|_| EnvFilter::new(if verbose { "railyard=debug" } else { "railyard=info" }));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let root = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(2);
    }
  };

  let result = match cli.command {
    Commands::Release(args) => commands::run_release(args.into_options(root, cli.config)),
    Commands::Build(args) => commands::run_build(args.into_options(root, cli.config)),
    Commands::Check { json } => commands::run_check(RunOptions {
      root,
      config: cli.config,
      json,
      ..RunOptions::default()
    }),
    Commands::Healthcheck { json } => commands::run_healthcheck(RunOptions {
      root,
      config: cli.config,
      json,
      ..RunOptions::default()
    }),
  };

  if let Err(err) = result {
    print_error(&err);
    std::process::exit(exit_code_of(&err));
  }
}
