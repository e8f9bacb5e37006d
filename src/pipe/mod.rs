//! Stage (pipe) contract and the skip vocabulary shared by every stage
//!
//! # Example
//!
//! ```rust,ignore
//! use railyard::pipe::{self, is_skip};
//!
//! fn run(ctx: &Context) -> YardResult<()> {
//!   if ctx.config.signs.is_empty() {
//!     return Err(pipe::skip("no signing configured"));
//!   }
//!   Ok(())
//! }
//! ```

mod skip;
mod trait_def;

pub use skip::{
  MultiSkip, SKIP_ANNOUNCE_ENABLED, SKIP_PUBLISH_ENABLED, SKIP_SIGN_ENABLED, SKIP_VALIDATE_ENABLED, SNAPSHOT_ENABLED,
  Skip, SkipMemento, is_skip, skip,
};
pub use trait_def::{Defaulter, Dependencies, Publisher, Runner, Skipper, Stage};

use crate::core::error::{ConfigError, YardResult};

/// Fail when two configured entries of `kind` share an id.
///
/// Reports the first duplicated id in input order.
pub fn ensure_unique_ids<'a>(kind: &str, ids: impl IntoIterator<Item = &'a str>) -> YardResult<()> {
  let ids: Vec<&str> = ids.into_iter().collect();
  for (i, id) in ids.iter().enumerate() {
    if ids[..i].contains(id) {
      continue;
    }
    let count = ids.iter().filter(|other| *other == id).count();
    if count > 1 {
      return Err(
        ConfigError::DuplicateId {
          kind: kind.to_string(),
          id: id.to_string(),
          count,
        }
        .into(),
      );
    }
  }
  Ok(())
}
