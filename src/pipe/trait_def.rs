//! Stage contract
//!
//! Every packaging or publishing unit is a [`Stage`]. A stage only has to name
//! itself; everything else is an optional capability the orchestrator probes
//! through the `as_*` accessors:
//!
//! - **Defaulter**: normalize configuration (idempotent, may fail on bad config)
//! - **Skipper**: side-effect-free precondition checked before each phase
//! - **Dependencies**: external commands needed, checked once before any run
//! - **Runner**: the side-effecting work
//! - **Publisher**: ship results; runs only after every stage ran
//!
//! # Example
//!
//! ```rust,ignore
//! struct Hello;
//!
//! impl Stage for Hello {
//!   fn name(&self) -> &str {
//!     "hello"
//!   }
//!
//!   fn as_runner(&self) -> Option<&dyn Runner> {
//!     Some(self)
//!   }
//! }
//!
//! impl Runner for Hello {
//!   fn run(&self, ctx: &Context) -> YardResult<()> {
//!     println!("releasing {}", ctx.version);
//!     Ok(())
//!   }
//! }
//! ```

use crate::core::context::Context;
use crate::core::error::YardResult;
use crate::pipe::Skip;

pub trait Stage: Send + Sync {
  /// Short kebab-case name used in logs and reports
  fn name(&self) -> &str;

  fn as_defaulter(&self) -> Option<&dyn Defaulter> {
    None
  }

  fn as_skipper(&self) -> Option<&dyn Skipper> {
    None
  }

  fn as_dependencies(&self) -> Option<&dyn Dependencies> {
    None
  }

  fn as_runner(&self) -> Option<&dyn Runner> {
    None
  }

  fn as_publisher(&self) -> Option<&dyn Publisher> {
    None
  }

  /// Record failures and keep going instead of aborting the run
  fn continue_on_error(&self) -> bool {
    false
  }
}

pub trait Defaulter {
  /// Fill in defaults. Running it twice must change nothing.
  fn defaults(&self, ctx: &mut Context) -> YardResult<()>;
}

pub trait Skipper {
  /// Whether the stage has nothing to do for this run
  fn skip(&self, ctx: &Context) -> YardResult<bool>;

  /// Reason reported when [`Skipper::skip`] said yes
  fn skip_reason(&self, _ctx: &Context) -> Skip {
    Skip::new("nothing to do")
  }
}

pub trait Dependencies {
  /// External command names the stage will invoke
  fn dependencies(&self, ctx: &Context) -> Vec<String>;
}

pub trait Runner {
  fn run(&self, ctx: &Context) -> YardResult<()>;
}

pub trait Publisher {
  fn publish(&self, ctx: &Context) -> YardResult<()>;
}
