mod build;
mod check;
mod targets;

pub use build::{BuildArgs, cmd_build};
pub use check::cmd_check;
pub use targets::cmd_targets;

use std::path::Path;

use anyhow::{Context, Result};

use crossbuild_lib::config::Project;
use crossbuild_lib::context::BuildContext;

/// Load a project file and the build context it describes.
fn load(file: &Path) -> Result<(Project, BuildContext)> {
  let project = Project::load(file).with_context(|| format!("Failed to load config: {}", file.display()))?;
  let ctx = BuildContext::from_project(&project).context("Failed to evaluate project env")?;
  Ok((project, ctx))
}
