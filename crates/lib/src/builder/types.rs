//! Types shared by every builder.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::{BuildConfig, ConfigError};
use crate::context::BuildContext;
use crate::process::{CancelSignal, ProcessError};
use crate::target::{Target, TargetError};
use crate::template::TemplateError;
use crate::timestamp::TimestampError;

/// Errors from normalizing a build or building one target.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The target string is malformed or not buildable.
  #[error(transparent)]
  Target(#[from] TargetError),

  /// A field that the toolchain does not support is set.
  #[error("{message}")]
  IllegalConfiguration { field: &'static str, message: String },

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("no builder registered for {0:?}")]
  UnknownBuilder(String),

  #[error("the {builder} builder cannot build {toolchain} target {target}")]
  TargetMismatch {
    builder: &'static str,
    toolchain: &'static str,
    target: String,
  },

  #[error("template error: {0}")]
  Template(#[from] TemplateError),

  /// The toolchain could not be run, failed, timed out or was killed.
  #[error("{command}: {source}")]
  Process {
    command: String,
    #[source]
    source: ProcessError,
  },

  #[error(transparent)]
  Timestamp(#[from] TimestampError),

  #[error("cancelled before building {0}")]
  Cancelled(String),

  /// The task building the target panicked.
  #[error("build task panicked: {0}")]
  Panicked(String),
}

impl BuildError {
  pub(crate) fn illegal(field: &'static str, message: impl Into<String>) -> Self {
    Self::IllegalConfiguration {
      field,
      message: message.into(),
    }
  }

  /// Whether the build was stopped by cancellation rather than failing on
  /// its own.
  pub fn is_cancelled(&self) -> bool {
    matches!(
      self,
      Self::Cancelled(_)
        | Self::Process {
          source: ProcessError::Cancelled,
          ..
        }
    )
  }
}

/// Per-target build options.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  pub target: Target,
  /// Where the binary should end up; builders may relocate it.
  pub path: PathBuf,
  /// File name of the binary, extension included.
  pub name: String,
  pub ext: String,
  pub cancel: Option<CancelSignal>,
}

impl BuildOptions {
  /// Options placing the binary at `<dist>/<id>_<target>/<binary><ext>`.
  ///
  /// The path is made absolute against the current directory: the toolchain
  /// runs inside the build's `dir`, while the artifact is read from here.
  pub fn for_target(ctx: &BuildContext, build: &BuildConfig, target: Target) -> Self {
    let ext = target.binary_ext().to_string();
    let name = format!("{}{}", build.binary, ext);
    let dist = std::path::absolute(&ctx.dist).unwrap_or_else(|_| ctx.dist.clone());
    let path = dist.join(format!("{}_{}", build.id, target)).join(&name);
    Self {
      target,
      path,
      name,
      ext,
      cancel: None,
    }
  }

  pub fn with_cancel(mut self, cancel: Option<CancelSignal>) -> Self {
    self.cancel = cancel;
    self
  }
}
