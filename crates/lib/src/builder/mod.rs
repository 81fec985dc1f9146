//! Per-toolchain builders.
//!
//! A [`Builder`] does three things for its toolchain:
//!
//! - [`Builder::parse`] turns a raw target string into a [`Target`]
//! - [`Builder::with_defaults`] fills defaults and rejects configuration the
//!   toolchain does not understand, before anything is run
//! - [`Builder::build`] runs the toolchain for one target and registers the
//!   resulting [`Artifact`]
//!
//! Builders are looked up by name in a [`Registry`]. The process-wide
//! [`registry()`] holds the built-in `go` and `zig` builders.

pub mod execute;
mod go;
mod types;
mod zig;

pub use go::GoBuilder;
pub use types::*;
pub use zig::ZigBuilder;

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::artifact::{Artifact, ArtifactStore};
use crate::config::BuildConfig;
use crate::context::BuildContext;
use crate::process::ProcessRunner;
use crate::target::Target;

/// Builder used when a build does not name one.
pub const DEFAULT_BUILDER: &str = go::NAME;

/// A toolchain builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builder {
  Go(GoBuilder),
  Zig(ZigBuilder),
}

impl Builder {
  pub fn name(&self) -> &'static str {
    match self {
      Builder::Go(_) => go::NAME,
      Builder::Zig(_) => zig::NAME,
    }
  }

  /// Parse a raw target string in this builder's format.
  pub fn parse(&self, raw: &str) -> Result<Target, BuildError> {
    match self {
      Builder::Go(b) => b.parse(raw).map(Target::Go),
      Builder::Zig(b) => b.parse(raw).map(Target::Zig),
    }
  }

  /// Normalize a build configuration.
  pub fn with_defaults(&self, ctx: &BuildContext, build: BuildConfig) -> Result<BuildConfig, BuildError> {
    match self {
      Builder::Go(b) => b.with_defaults(ctx, build),
      Builder::Zig(b) => b.with_defaults(ctx, build),
    }
  }

  /// Build one target of a normalized configuration.
  pub async fn build<R: ProcessRunner>(
    &self,
    ctx: &BuildContext,
    build: &BuildConfig,
    options: BuildOptions,
    runner: &R,
    store: &ArtifactStore,
  ) -> Result<Artifact, BuildError> {
    match self {
      Builder::Go(b) => b.build(ctx, build, options, runner, store).await,
      Builder::Zig(b) => b.build(ctx, build, options, runner, store).await,
    }
  }
}

/// Builders by name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
  builders: HashMap<String, Builder>,
}

impl Registry {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding the built-in builders.
  pub fn with_defaults() -> Self {
    let mut registry = Self::new();
    registry.register(go::NAME, Builder::Go(GoBuilder));
    registry.register(zig::NAME, Builder::Zig(ZigBuilder));
    registry
  }

  /// Register `builder` under `name`, replacing any earlier registration.
  pub fn register(&mut self, name: impl Into<String>, builder: Builder) {
    self.builders.insert(name.into(), builder);
  }

  pub fn get(&self, name: &str) -> Option<Builder> {
    self.builders.get(name).copied()
  }

  /// The builder a build configuration selects. An empty name selects
  /// [`DEFAULT_BUILDER`].
  pub fn builder_for(&self, build: &BuildConfig) -> Result<Builder, BuildError> {
    let name = if build.builder.is_empty() {
      DEFAULT_BUILDER
    } else {
      build.builder.as_str()
    };
    self.get(name).ok_or_else(|| BuildError::UnknownBuilder(name.to_string()))
  }

  /// Registered names, sorted.
  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.builders.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }
}

/// The process-wide registry of built-in builders.
pub fn registry() -> &'static Registry {
  static REGISTRY: OnceLock<Registry> = OnceLock::new();
  REGISTRY.get_or_init(Registry::with_defaults)
}

/// Defaults every builder fills the same way.
fn fill_common_defaults(ctx: &BuildContext, build: &mut BuildConfig, name: &str) {
  if build.builder.is_empty() {
    build.builder = name.to_string();
  }
  if build.id.is_empty() {
    build.id = "default".to_string();
  }
  if build.binary.is_empty() {
    build.binary = ctx.project_name.clone();
  }
  if build.tool.is_empty() {
    build.tool = name.to_string();
  }
  if build.command.is_empty() {
    build.command = "build".to_string();
  }
  if build.dir.is_empty() {
    build.dir = ".".to_string();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registry_has_builtin_builders() {
    let registry = registry();
    assert_eq!(registry.names(), vec!["go", "zig"]);
    assert_eq!(registry.get("zig"), Some(Builder::Zig(ZigBuilder)));
    assert_eq!(registry.get("rust"), None);
  }

  #[test]
  fn last_registration_wins() {
    let mut registry = Registry::new();
    registry.register("cc", Builder::Go(GoBuilder));
    registry.register("cc", Builder::Zig(ZigBuilder));

    assert_eq!(registry.get("cc").map(|b| b.name()), Some("zig"));
    assert_eq!(registry.names(), vec!["cc"]);
  }

  #[test]
  fn builder_for_defaults_to_go() {
    let registry = Registry::with_defaults();

    let builder = registry.builder_for(&BuildConfig::default()).unwrap();
    assert_eq!(builder.name(), "go");

    let build = BuildConfig {
      builder: "rust".into(),
      ..Default::default()
    };
    assert!(matches!(
      registry.builder_for(&build),
      Err(BuildError::UnknownBuilder(ref name)) if name == "rust"
    ));
  }

  #[test]
  fn parse_uses_toolchain_format() {
    let zig = Builder::Zig(ZigBuilder);
    let go = Builder::Go(GoBuilder);

    assert_eq!(zig.parse("x86_64-linux-gnu").unwrap().abi(), "gnu");
    assert_eq!(go.parse("linux_amd64_v2").unwrap().arch(), "amd64");
    assert!(go.parse("linux").is_err());
  }

  #[tokio::test]
  async fn build_rejects_other_toolchain_targets() {
    let ctx = BuildContext::new("hello");
    let build = Builder::Zig(ZigBuilder)
      .with_defaults(&ctx, BuildConfig::default())
      .unwrap();
    let target = Builder::Go(GoBuilder).parse("linux_amd64").unwrap();
    let options = BuildOptions::for_target(&ctx, &build, target);
    let store = ArtifactStore::new();

    let err = Builder::Zig(ZigBuilder)
      .build(&ctx, &build, options, &crate::process::SystemRunner, &store)
      .await
      .unwrap_err();

    assert!(matches!(err, BuildError::TargetMismatch { builder: "zig", toolchain: "go", .. }));
    assert!(store.is_empty());
  }
}
