//! Built-in stages
//!
//! Each stage is a unit struct implementing [`crate::pipe::Stage`] plus the
//! capabilities it needs. Stages keep no state of their own: configuration
//! lives in the run context and results go to the catalog.
//!
//! | Stage | Defaults | Skip | Dependencies | Run | Publish |
//! |---|---|---|---|---|---|
//! | validate | project name, snapshot version | `validate` | | yes | |
//! | before | | no hooks, `before` | hook commands | yes | |
//! | dist | | | | yes | |
//! | build | ids, binary, targets | no builds | build commands | yes | |
//! | universal | ids, name | no config | `lipo` | yes | |
//! | archive | ids, name, format | `archive` | | yes | |
//! | sbom | ids, cmd, documents | no config, `sbom` | cmd | yes | |
//! | checksum | name, algorithm | disabled | | yes | |
//! | sign | ids, cmd, args | no config, `sign` | cmd | yes | |
//! | metadata | | | | yes | |
//! | upload | names | no uploads | | | yes |

pub mod archive;
pub mod before;
pub mod build;
pub mod checksum;
pub mod dist;
pub mod metadata;
pub mod sbom;
pub mod sign;
pub mod universal;
pub mod upload;
pub mod validate;

use crate::core::context::Context;
use crate::core::error::YardResult;
use crate::core::exec::Cmd;
use crate::core::tmpl::Template;
use tracing::{debug, info};

/// Run hook lines in order, stopping at the first failure
pub(crate) fn run_hooks(ctx: &Context, template: &Template, hooks: &[String], env: &[(String, String)]) -> YardResult<()> {
  for hook in hooks {
    let line = template.apply(hook)?;
    info!(hook = %line, "running hook");
    let output = Cmd::from_line(&line)?.in_context(ctx).envs(env.to_vec()).run()?;
    if !output.is_empty() {
      debug!(hook = %line, output = %output.trim_end(), "hook output");
    }
  }
  Ok(())
}

/// Default an empty id to the project name
pub(crate) fn default_id(id: &mut String, ctx_project: &str) {
  if id.is_empty() {
    *id = ctx_project.to_string();
  }
}
