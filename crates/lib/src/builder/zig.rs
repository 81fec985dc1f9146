//! The zig builder.
//!
//! Runs `zig build -Dtarget=<triple> -p <prefix>` per target. Zig installs
//! executables under `<prefix>/bin`, so the artifact path is relocated there.

use std::path::Path;

use tracing::debug;

use crate::artifact::{Artifact, ArtifactStore};
use crate::config::BuildConfig;
use crate::context::BuildContext;
use crate::process::{Invocation, ProcessRunner};
use crate::target::{Target, ZigTarget, zig};
use crate::template::{self, Scope};

use super::execute::{invoke_and_register, provisional_artifact, render_all, render_env, scope_fields};
use super::fill_common_defaults;
use super::types::{BuildError, BuildOptions};

pub const NAME: &str = "zig";

const EXPERIMENTAL_ADVISORY: &str = "you are using the experimental Zig builder";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZigBuilder;

impl ZigBuilder {
  pub fn parse(&self, raw: &str) -> Result<ZigTarget, BuildError> {
    Ok(ZigTarget::parse(raw)?)
  }

  pub fn with_defaults(&self, ctx: &BuildContext, mut build: BuildConfig) -> Result<BuildConfig, BuildError> {
    ctx.diagnostics.advise(EXPERIMENTAL_ADVISORY);

    let explicit = !build.targets.is_empty();
    if !explicit {
      build.targets = zig::default_targets();
    }
    fill_common_defaults(ctx, &mut build, NAME);

    if !build.main.is_empty() {
      return Err(BuildError::illegal("main", "main is not used for zig"));
    }
    if !build.ldflags.is_empty() {
      return Err(BuildError::illegal("ldflags", "ldflags is not used for zig"));
    }
    if let Some(field) = build.first_matrix_field() {
      return Err(BuildError::illegal(
        field,
        format!("{field}: all go* fields are not used for zig, set targets instead"),
      ));
    }
    if !build.ignore.is_empty() {
      return Err(BuildError::illegal("ignore", "ignore is not used for zig, set targets instead"));
    }
    if !build.buildmode.is_empty() {
      return Err(BuildError::illegal("buildmode", "buildmode is not used for zig"));
    }
    if !build.tags.is_empty() {
      return Err(BuildError::illegal("tags", "tags is not used for zig"));
    }
    if !build.asmflags.is_empty() {
      return Err(BuildError::illegal("asmflags", "asmflags is not used for zig"));
    }

    build.timeout()?;

    if explicit {
      if let Some(bad) = build.targets.iter().find(|t| !zig::is_valid(t)) {
        return Err(crate::target::TargetError::Unknown(bad.clone()).into());
      }
    }

    debug!(id = %build.id, targets = ?build.targets, "normalized zig build");
    Ok(build)
  }

  pub async fn build<R: ProcessRunner>(
    &self,
    ctx: &BuildContext,
    build: &BuildConfig,
    mut options: BuildOptions,
    runner: &R,
    store: &ArtifactStore,
  ) -> Result<Artifact, BuildError> {
    let target = match &options.target {
      Target::Zig(t) => t.clone(),
      other => {
        return Err(BuildError::TargetMismatch {
          builder: NAME,
          toolchain: other.toolchain(),
          target: other.to_string(),
        });
      }
    };

    let prefix = options.path.parent().map(Path::to_path_buf).unwrap_or_default();
    options.path = prefix.join("bin").join(&options.name);

    let artifact = provisional_artifact(build, &options);
    let fields = scope_fields(ctx, &options, &artifact);
    let scope = Scope::new(&fields, &ctx.env);

    let mut command = vec![
      template::render(&build.tool, &scope)?,
      build.command.clone(),
      format!("-Dtarget={}", target.target),
      "-p".to_string(),
      prefix.display().to_string(),
    ];
    command.extend(render_all(&build.flags, &scope)?);

    let env = render_env(&ctx.env, &build.env, &fields)?;

    let invocation = Invocation::new(command, env, &build.dir)
      .with_deadline(build.timeout()?)
      .with_cancel(options.cancel.clone());

    invoke_and_register(build, invocation, artifact, &fields, runner, store).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::RecordingDiagnostics;
  use crate::target::TargetError;
  use crate::util::testutil::FakeRunner;
  use std::sync::Arc;

  fn ctx() -> (BuildContext, Arc<RecordingDiagnostics>) {
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let ctx = BuildContext::new("hello").with_diagnostics(diagnostics.clone());
    (ctx, diagnostics)
  }

  #[test]
  fn defaults_fill_empty_config() {
    let (ctx, diagnostics) = ctx();

    let build = ZigBuilder.with_defaults(&ctx, BuildConfig::default()).unwrap();

    assert_eq!(build.targets, zig::default_targets());
    assert_eq!(build.tool, "zig");
    assert_eq!(build.command, "build");
    assert_eq!(build.dir, ".");
    assert_eq!(build.binary, "hello");
    assert_eq!(build.id, "default");
    assert_eq!(diagnostics.messages(), vec![EXPERIMENTAL_ADVISORY]);
  }

  #[test]
  fn explicit_values_are_kept() {
    let (ctx, _) = ctx();
    let input = BuildConfig {
      targets: vec!["riscv64-linux-musl".to_string()],
      tool: "/opt/zig/zig".to_string(),
      command: "install".to_string(),
      dir: "native".to_string(),
      ..Default::default()
    };

    let build = ZigBuilder.with_defaults(&ctx, input).unwrap();

    assert_eq!(build.targets, vec!["riscv64-linux-musl"]);
    assert_eq!(build.tool, "/opt/zig/zig");
    assert_eq!(build.command, "install");
    assert_eq!(build.dir, "native");
  }

  fn config_with(set: fn(&mut BuildConfig)) -> BuildConfig {
    let mut build = BuildConfig::default();
    set(&mut build);
    build
  }

  #[test]
  fn go_only_fields_are_illegal() {
    let (ctx, _) = ctx();
    let cases = vec![
      ("main", config_with(|b| b.main = "./cmd".into())),
      ("ldflags", config_with(|b| b.ldflags = vec!["-s".into()])),
      ("goos", config_with(|b| b.goos = vec!["linux".into()])),
      ("goarm64", config_with(|b| b.goarm64 = vec!["v9.0".into()])),
      ("goriscv64", config_with(|b| b.goriscv64 = vec!["rva22u64".into()])),
      ("ignore", config_with(|b| b.ignore = vec![Default::default()])),
      ("buildmode", config_with(|b| b.buildmode = "pie".into())),
      ("tags", config_with(|b| b.tags = vec!["netgo".into()])),
      ("asmflags", config_with(|b| b.asmflags = vec!["-trimpath".into()])),
    ];

    for (name, input) in cases {
      let err = ZigBuilder.with_defaults(&ctx, input).unwrap_err();
      match err {
        BuildError::IllegalConfiguration { field, ref message } => {
          assert_eq!(field, name);
          assert!(message.contains(name), "{message}");
        }
        other => panic!("{name}: unexpected error {other}"),
      }
    }
  }

  #[test]
  fn flags_are_allowed() {
    let (ctx, _) = ctx();
    let input = BuildConfig {
      flags: vec!["-Doptimize=ReleaseSafe".into()],
      ..Default::default()
    };
    assert!(ZigBuilder.with_defaults(&ctx, input).is_ok());
  }

  #[test]
  fn first_unknown_target_is_reported() {
    let (ctx, _) = ctx();
    let input = BuildConfig {
      targets: vec![
        "x86_64-linux".into(),
        "x86_64-freebsd".into(),
        "sparc-solaris".into(),
      ],
      ..Default::default()
    };

    let err = ZigBuilder.with_defaults(&ctx, input).unwrap_err();

    assert!(matches!(err, BuildError::Target(TargetError::Unknown(ref t)) if t == "x86_64-freebsd"));
    assert_eq!(err.to_string(), "invalid target: x86_64-freebsd");
  }

  #[test]
  fn invalid_timeout_fails_normalization() {
    let (ctx, _) = ctx();
    let input = BuildConfig {
      timeout: Some("forever".into()),
      ..Default::default()
    };
    assert!(matches!(
      ZigBuilder.with_defaults(&ctx, input),
      Err(BuildError::Config(_))
    ));
  }

  #[test]
  fn parse_errors_are_build_errors() {
    assert!(matches!(
      ZigBuilder.parse("x86_64"),
      Err(BuildError::Target(TargetError::Malformed(_)))
    ));
    assert_eq!(ZigBuilder.parse("x86_64-linux").unwrap().arch, "amd64");
  }

  // ==========================================================================
  // Build
  // ==========================================================================

  async fn build_one(build: BuildConfig, runner: &FakeRunner, store: &ArtifactStore) -> Result<Artifact, BuildError> {
    let (ctx, _) = ctx();
    let ctx = ctx.with_env(vec!["ZIG_GLOBAL_CACHE_DIR=/tmp/zig".to_string()]);
    let build = ZigBuilder.with_defaults(&ctx, build).unwrap();
    let target = Target::Zig(ZigBuilder.parse(&build.targets[0]).unwrap());
    let options = BuildOptions::for_target(&ctx, &build, target);
    ZigBuilder.build(&ctx, &build, options, runner, store).await
  }

  #[tokio::test]
  async fn build_installs_under_prefix_bin() {
    let runner = FakeRunner::new();
    let store = ArtifactStore::new();
    let build = BuildConfig {
      id: "cli".into(),
      targets: vec!["x86_64-linux".into()],
      flags: vec!["-Doptimize=ReleaseSafe".into(), "-Dos={{ .Os }}".into(), String::new()],
      env: vec!["CC=zig cc -target {{ .Target }}".into()],
      ..Default::default()
    };

    let artifact = build_one(build, &runner, &store).await.unwrap();

    let prefix = std::env::current_dir().unwrap().join("dist/cli_x86_64-linux");
    assert_eq!(artifact.path, prefix.join("bin/hello"));
    assert_eq!(artifact.os, "linux");
    assert_eq!(artifact.arch, "amd64");
    assert_eq!(artifact.build_id(), Some("cli"));

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
      calls[0].command,
      vec![
        "zig",
        "build",
        "-Dtarget=x86_64-linux",
        "-p",
        prefix.to_str().unwrap(),
        "-Doptimize=ReleaseSafe",
        "-Dos=linux",
      ]
    );
    assert_eq!(
      calls[0].env,
      vec!["ZIG_GLOBAL_CACHE_DIR=/tmp/zig", "CC=zig cc -target x86_64-linux"]
    );
    assert_eq!(calls[0].dir, Path::new("."));
    assert_eq!(store.list(), vec![artifact]);
  }

  #[tokio::test]
  async fn tool_is_a_template() {
    let runner = FakeRunner::new();
    let build = BuildConfig {
      targets: vec!["aarch64-macos".into()],
      tool: "{{ .Env.ZIG_GLOBAL_CACHE_DIR }}/zig".into(),
      ..Default::default()
    };

    build_one(build, &runner, &ArtifactStore::new()).await.unwrap();

    assert_eq!(runner.calls()[0].command[0], "/tmp/zig/zig");
  }

  #[tokio::test]
  async fn process_failure_registers_nothing() {
    let runner = FakeRunner::failing_on("x86_64-linux");
    let store = ArtifactStore::new();
    let build = BuildConfig {
      targets: vec!["x86_64-linux".into()],
      ..Default::default()
    };

    let err = build_one(build, &runner, &store).await.unwrap_err();

    assert!(matches!(err, BuildError::Process { .. }));
    assert!(err.to_string().contains("error: bad flag"), "{err}");
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn template_failure_spawns_nothing() {
    let runner = FakeRunner::new();
    let store = ArtifactStore::new();
    let build = BuildConfig {
      targets: vec!["x86_64-linux".into()],
      env: vec!["CC={{ .Env.CROSSBUILD_SURELY_UNSET_VARIABLE }}".into()],
      ..Default::default()
    };

    let err = build_one(build, &runner, &store).await.unwrap_err();

    assert!(matches!(err, BuildError::Template(_)));
    assert!(runner.calls().is_empty());
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn timestamp_failure_registers_nothing() {
    let runner = FakeRunner::new();
    let store = ArtifactStore::new();
    // The fake runner writes no binary, so there is nothing to stamp.
    let build = BuildConfig {
      targets: vec!["x86_64-linux".into()],
      mod_timestamp: "1700000000".into(),
      ..Default::default()
    };

    let err = build_one(build, &runner, &store).await.unwrap_err();

    assert!(matches!(err, BuildError::Timestamp(_)));
    assert_eq!(runner.calls().len(), 1);
    assert!(store.is_empty());
  }
}
