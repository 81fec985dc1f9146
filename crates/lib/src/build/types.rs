use thiserror::Error;

use crate::artifact::Artifact;
use crate::builder::{BuildError, Builder};
use crate::config::BuildConfig;
use crate::target::Target;

/// Errors that stop a run before any toolchain is invoked.
#[derive(Debug, Error)]
pub enum RunError {
  #[error("build {id}: {source}")]
  Invalid {
    id: String,
    #[source]
    source: BuildError,
  },

  #[error("no build matches id {0:?}")]
  NoSuchBuild(String),
}

/// Configuration for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
  /// Maximum number of targets built at once.
  pub parallelism: usize,

  /// Cancel every other target once one fails.
  pub fail_fast: bool,

  /// Only run builds with these ids; all builds when empty.
  pub ids: Vec<String>,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      fail_fast: false,
      ids: Vec::new(),
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// A build configuration after normalization, with its targets parsed.
#[derive(Debug, Clone)]
pub struct NormalizedBuild {
  pub builder: Builder,
  pub config: BuildConfig,
  pub targets: Vec<Target>,
}

/// A target that did not produce an artifact.
#[derive(Debug)]
pub struct TargetFailure {
  pub id: String,
  pub target: String,
  pub error: BuildError,
}

impl TargetFailure {
  pub fn cancelled(&self) -> bool {
    self.error.is_cancelled()
  }
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct BuildReport {
  /// Artifacts of the targets that built, ordered by build id and target.
  pub succeeded: Vec<Artifact>,
  /// Targets that failed or were cancelled, ordered by build id and target.
  pub failed: Vec<TargetFailure>,
}

impl BuildReport {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty()
  }

  pub fn total(&self) -> usize {
    self.succeeded.len() + self.failed.len()
  }
}
