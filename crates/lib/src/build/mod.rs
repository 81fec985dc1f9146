//! Build orchestration.
//!
//! A run normalizes every selected build up front, so configuration errors
//! surface before any toolchain is started. It then builds every target of
//! every build in parallel, bounded by [`RunOptions::parallelism`], and
//! collects the outcome in a [`BuildReport`].

mod types;

pub use types::*;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::artifact::{Artifact, ArtifactStore};
use crate::builder::{BuildError, BuildOptions, Builder, Registry};
use crate::config::{BuildConfig, Project};
use crate::context::BuildContext;
use crate::process::{CancelSignal, Canceller, ProcessRunner};
use crate::target::Target;

/// File name of the artifact list written into the dist directory.
pub const ARTIFACTS_FILE: &str = "artifacts.json";

/// Normalize every build of `project` and parse its targets.
///
/// Stops at the first build that fails; nothing is run.
pub fn normalize(registry: &Registry, project: &Project, ctx: &BuildContext) -> Result<Vec<NormalizedBuild>, RunError> {
  let mut builds = Vec::with_capacity(project.builds.len());

  for (index, original) in project.builds.iter().enumerate() {
    let invalid = |source| RunError::Invalid {
      id: label(original, index),
      source,
    };

    let builder = registry.builder_for(original).map_err(invalid)?;
    let config = builder.with_defaults(ctx, original.clone()).map_err(invalid)?;
    let targets = config
      .targets
      .iter()
      .map(|raw| builder.parse(raw))
      .collect::<Result<Vec<_>, _>>()
      .map_err(invalid)?;

    debug!(id = %config.id, builder = builder.name(), targets = targets.len(), "build normalized");
    builds.push(NormalizedBuild {
      builder,
      config,
      targets,
    });
  }

  Ok(builds)
}

fn label(build: &BuildConfig, index: usize) -> String {
  if build.id.is_empty() {
    format!("#{}", index + 1)
  } else {
    build.id.clone()
  }
}

/// Build every target of every selected build in `project`.
///
/// Artifacts of successful targets are added to `store` as they finish.
/// Failing targets do not stop the others unless [`RunOptions::fail_fast`]
/// is set, in which case the first failure cancels every target still
/// waiting or running.
pub async fn run<R>(
  registry: &Registry,
  project: &Project,
  ctx: &BuildContext,
  runner: Arc<R>,
  store: &ArtifactStore,
  options: &RunOptions,
) -> Result<BuildReport, RunError>
where
  R: ProcessRunner + 'static,
{
  let mut builds = normalize(registry, project, ctx)?;

  if !options.ids.is_empty() {
    if let Some(missing) = options.ids.iter().find(|id| !builds.iter().any(|b| &b.config.id == *id)) {
      return Err(RunError::NoSuchBuild(missing.clone()));
    }
    builds.retain(|b| options.ids.contains(&b.config.id));
  }

  let total: usize = builds.iter().map(|b| b.targets.len()).sum();
  info!(
    builds = builds.len(),
    targets = total,
    parallelism = options.parallelism,
    "starting build run"
  );

  let ctx = Arc::new(ctx.clone());
  let semaphore = Arc::new(Semaphore::new(options.parallelism.max(1)));
  let canceller = Canceller::new();
  let mut join_set = JoinSet::new();
  let mut tasks = HashMap::new();

  for NormalizedBuild {
    builder,
    config,
    targets,
  } in builds
  {
    let config = Arc::new(config);

    for target in targets {
      let ctx = ctx.clone();
      let config = config.clone();
      let runner = runner.clone();
      let store = store.clone();
      let semaphore = semaphore.clone();
      let signal = canceller.signal();

      let key = (config.id.clone(), target.to_string());
      let handle = join_set.spawn(async move {
        build_target(builder, &ctx, &config, target, runner.as_ref(), &store, &semaphore, signal).await
      });
      tasks.insert(handle.id(), key);
    }
  }

  let mut report = BuildReport::default();

  while let Some(joined) = join_set.join_next_with_id().await {
    let (task, result) = match joined {
      Ok((task, result)) => (task, result),
      Err(e) => (e.id(), Err(BuildError::Panicked(panic_message(e)))),
    };
    let (id, target) = tasks.remove(&task).unwrap_or_default();

    match result {
      Ok(artifact) => {
        report.succeeded.push(artifact);
      }
      Err(err) => {
        if err.is_cancelled() {
          warn!(id = %id, target = %target, "build cancelled");
        } else {
          error!(id = %id, target = %target, error = %err, "build failed");
          if options.fail_fast && !canceller.is_cancelled() {
            warn!("cancelling remaining targets");
            canceller.cancel();
          }
        }
        report.failed.push(TargetFailure { id, target, error: err });
      }
    }
  }

  report
    .succeeded
    .sort_by(|a, b| (a.build_id(), &a.target).cmp(&(b.build_id(), &b.target)));
  report
    .failed
    .sort_by(|a, b| (&a.id, &a.target).cmp(&(&b.id, &b.target)));

  info!(
    succeeded = report.succeeded.len(),
    failed = report.failed.len(),
    "build run complete"
  );

  Ok(report)
}

fn panic_message(err: JoinError) -> String {
  if !err.is_panic() {
    return err.to_string();
  }
  let payload = err.into_panic();
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}

#[allow(clippy::too_many_arguments)]
async fn build_target<R: ProcessRunner>(
  builder: Builder,
  ctx: &BuildContext,
  config: &BuildConfig,
  target: Target,
  runner: &R,
  store: &ArtifactStore,
  semaphore: &Semaphore,
  signal: CancelSignal,
) -> Result<Artifact, BuildError> {
  let Ok(_permit) = semaphore.acquire().await else {
    return Err(BuildError::Cancelled(target.to_string()));
  };

  if signal.is_cancelled() {
    return Err(BuildError::Cancelled(target.to_string()));
  }

  info!(id = %config.id, target = %target, "building");
  let options = BuildOptions::for_target(ctx, config, target).with_cancel(Some(signal));
  builder.build(ctx, config, options, runner, store).await
}

/// Write the artifacts in `store` to `<dist>/artifacts.json`.
pub fn write_artifacts(dist: &Path, store: &ArtifactStore) -> std::io::Result<PathBuf> {
  std::fs::create_dir_all(dist)?;
  let path = dist.join(ARTIFACTS_FILE);
  store.write_json(&path)?;
  Ok(path)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builder::registry;
  use crate::diagnostics::RecordingDiagnostics;
  use crate::util::testutil::FakeRunner;
  use std::time::Duration;
  use tempfile::TempDir;

  fn ctx() -> BuildContext {
    BuildContext::new("hello").with_diagnostics(Arc::new(RecordingDiagnostics::new()))
  }

  fn project() -> Project {
    Project::from_yaml(
      r#"
project_name: hello
builds:
  - id: cli
    builder: zig
    targets: [x86_64-linux, aarch64-linux, x86_64-windows]
  - id: server
    targets: [linux_amd64, darwin_arm64]
"#,
    )
    .unwrap()
  }

  // ==========================================================================
  // Normalize
  // ==========================================================================

  #[test]
  fn normalize_parses_targets_per_builder() {
    let builds = normalize(registry(), &project(), &ctx()).unwrap();

    assert_eq!(builds.len(), 2);
    assert_eq!(builds[0].builder.name(), "zig");
    assert_eq!(builds[0].targets[2].os(), "windows");
    assert_eq!(builds[1].builder.name(), "go");
    assert_eq!(builds[1].targets[1].arch(), "arm64");
  }

  #[test]
  fn normalize_names_unnamed_builds_by_position() {
    let project = Project::from_yaml("builds:\n  - builder: cargo\n").unwrap();

    let err = normalize(registry(), &project, &ctx()).unwrap_err();

    assert_eq!(err.to_string(), "build #1: no builder registered for \"cargo\"");
  }

  // ==========================================================================
  // Run
  // ==========================================================================

  #[tokio::test]
  async fn run_builds_every_target() {
    let runner = Arc::new(FakeRunner::new());
    let store = ArtifactStore::new();

    let report = run(registry(), &project(), &ctx(), runner.clone(), &store, &RunOptions::default())
      .await
      .unwrap();

    assert!(report.is_success());
    assert_eq!(report.succeeded.len(), 5);
    assert_eq!(store.len(), 5);
    assert_eq!(runner.calls().len(), 5);

    let targets: Vec<&str> = report.succeeded.iter().map(|a| a.target.as_str()).collect();
    assert_eq!(
      targets,
      vec!["aarch64-linux", "x86_64-linux", "x86_64-windows", "darwin_arm64", "linux_amd64"]
    );
  }

  #[tokio::test]
  async fn invalid_configuration_runs_nothing() {
    let project = Project::from_yaml(
      r#"
builds:
  - id: ok
    targets: [linux_amd64]
  - id: cli
    builder: zig
    ldflags: ["-s"]
"#,
    )
    .unwrap();
    let runner = Arc::new(FakeRunner::new());
    let store = ArtifactStore::new();

    let err = run(registry(), &project, &ctx(), runner.clone(), &store, &RunOptions::default())
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      RunError::Invalid {
        ref id,
        source: BuildError::IllegalConfiguration { field: "ldflags", .. }
      } if id == "cli"
    ));
    assert!(runner.calls().is_empty());
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn failed_target_does_not_stop_others() {
    let runner = Arc::new(FakeRunner::failing_on("aarch64-linux"));
    let store = ArtifactStore::new();

    let report = run(registry(), &project(), &ctx(), runner, &store, &RunOptions::default())
      .await
      .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.succeeded.len(), 4);
    assert_eq!(report.failed.len(), 1);

    let failure = &report.failed[0];
    assert_eq!(failure.id, "cli");
    assert_eq!(failure.target, "aarch64-linux");
    assert!(!failure.cancelled());
    assert!(failure.error.to_string().contains("error: bad flag"));
    assert!(store.filter(|a| a.target == "aarch64-linux").is_empty());
  }

  #[tokio::test]
  async fn panicking_target_is_reported_as_failed() {
    let runner = Arc::new(FakeRunner::panicking_on("aarch64-linux"));
    let store = ArtifactStore::new();

    let report = run(registry(), &project(), &ctx(), runner, &store, &RunOptions::default())
      .await
      .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.total(), 5);
    assert_eq!(report.succeeded.len(), 4);
    assert_eq!(report.failed.len(), 1);

    let failure = &report.failed[0];
    assert_eq!(failure.id, "cli");
    assert_eq!(failure.target, "aarch64-linux");
    assert!(!failure.cancelled());
    assert!(
      matches!(failure.error, BuildError::Panicked(ref message) if message.contains("toolchain crashed")),
      "{}",
      failure.error
    );
  }

  #[tokio::test]
  async fn fail_fast_cancels_siblings() {
    let runner = Arc::new(FakeRunner::failing_on("x86_64-windows").blocking());
    let store = ArtifactStore::new();
    let options = RunOptions {
      parallelism: 8,
      fail_fast: true,
      ..Default::default()
    };

    let report = tokio::time::timeout(
      Duration::from_secs(10),
      run(registry(), &project(), &ctx(), runner, &store, &options),
    )
    .await
    .expect("run should finish once siblings are cancelled")
    .unwrap();

    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 5);
    assert_eq!(report.failed.iter().filter(|f| f.cancelled()).count(), 4);
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn ids_select_builds() {
    let runner = Arc::new(FakeRunner::new());
    let store = ArtifactStore::new();
    let options = RunOptions {
      ids: vec!["server".to_string()],
      ..Default::default()
    };

    let report = run(registry(), &project(), &ctx(), runner, &store, &options)
      .await
      .unwrap();

    assert_eq!(report.succeeded.len(), 2);
    assert!(report.succeeded.iter().all(|a| a.build_id() == Some("server")));
  }

  #[tokio::test]
  async fn unknown_id_is_an_error() {
    let options = RunOptions {
      ids: vec!["docs".to_string()],
      ..Default::default()
    };

    let err = run(
      registry(),
      &project(),
      &ctx(),
      Arc::new(FakeRunner::new()),
      &ArtifactStore::new(),
      &options,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RunError::NoSuchBuild(ref id) if id == "docs"));
  }

  #[tokio::test]
  async fn artifacts_are_written_to_dist() {
    let temp = TempDir::new().unwrap();
    let dist = temp.path().join("dist");
    let store = ArtifactStore::new();
    let ctx = ctx().with_dist(&dist);

    run(registry(), &project(), &ctx, Arc::new(FakeRunner::new()), &store, &RunOptions::default())
      .await
      .unwrap();
    let path = write_artifacts(&dist, &store).unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(path, dist.join(ARTIFACTS_FILE));
    assert_eq!(json.as_array().unwrap().len(), 5);
  }
}
