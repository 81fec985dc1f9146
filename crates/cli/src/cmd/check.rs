//! Implementation of the `crossbuild check` command.
//!
//! Normalizes every build so configuration errors show up without running a
//! toolchain.

use std::path::Path;

use anyhow::{Context, Result};

use crossbuild_lib::build::normalize;
use crossbuild_lib::builder::registry;

use crate::output::{print_info, print_success};

pub fn cmd_check(file: &Path) -> Result<()> {
  let (project, ctx) = super::load(file)?;

  let builds = normalize(registry(), &project, &ctx).context("Invalid configuration")?;

  for build in &builds {
    print_info(&format!(
      "{} ({}): {} target(s)",
      build.config.id,
      build.builder.name(),
      build.targets.len()
    ));
  }
  print_success(&format!("{} is valid", file.display()));

  Ok(())
}
