//! Implementation of the `crossbuild build` command.
//!
//! Builds every target of the selected builds, prints one line per target and
//! writes the produced artifacts to `<dist>/artifacts.json`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::info;

use crossbuild_lib::artifact::ArtifactStore;
use crossbuild_lib::build::{self, RunOptions, write_artifacts};
use crossbuild_lib::builder::registry;
use crossbuild_lib::process::SystemRunner;

use crate::output::{print_artifact, print_failure, print_summary};

pub struct BuildArgs {
  pub parallelism: Option<usize>,
  pub ids: Vec<String>,
  pub fail_fast: bool,
}

pub fn cmd_build(file: &Path, args: BuildArgs) -> Result<()> {
  let (project, ctx) = super::load(file)?;

  let mut options = RunOptions {
    fail_fast: args.fail_fast,
    ids: args.ids,
    ..Default::default()
  };
  if let Some(parallelism) = args.parallelism {
    options.parallelism = parallelism;
  }

  let store = ArtifactStore::new();
  let started = Instant::now();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt
    .block_on(build::run(
      registry(),
      &project,
      &ctx,
      Arc::new(SystemRunner),
      &store,
      &options,
    ))
    .context("Build failed")?;

  let artifacts_path = write_artifacts(&ctx.dist, &store)
    .with_context(|| format!("Failed to write artifacts to {}", ctx.dist.display()))?;
  info!(path = %artifacts_path.display(), artifacts = store.len(), "artifacts written");

  for artifact in &report.succeeded {
    print_artifact(artifact);
  }
  for failure in &report.failed {
    print_failure(failure);
  }
  print_summary(&report, started.elapsed(), &artifacts_path);

  if !report.is_success() {
    bail!("{} of {} target(s) failed", report.failed.len(), report.total());
  }

  Ok(())
}
