//! Implementation of the `crossbuild targets` command.

use std::path::Path;

use anyhow::{Context, Result};

use crossbuild_lib::build::normalize;
use crossbuild_lib::builder::registry;

use crate::output::{print_build_header, print_json, print_target};

pub fn cmd_targets(file: &Path, json: bool) -> Result<()> {
  let (project, ctx) = super::load(file)?;

  let builds = normalize(registry(), &project, &ctx).context("Invalid configuration")?;

  if json {
    let items: Vec<_> = builds
      .iter()
      .map(|build| {
        let targets: Vec<_> = build
          .targets
          .iter()
          .map(|t| serde_json::json!({ "target": t.as_str(), "os": t.os(), "arch": t.arch(), "abi": t.abi() }))
          .collect();
        serde_json::json!({ "id": build.config.id, "builder": build.builder.name(), "targets": targets })
      })
      .collect();
    return print_json(&items);
  }

  for build in &builds {
    print_build_header(&build.config.id, build.builder.name());
    for target in &build.targets {
      print_target(target);
    }
  }

  Ok(())
}
