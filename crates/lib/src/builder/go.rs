//! The go builder.
//!
//! Targets come from `targets` when set, otherwise from the `goos` x `goarch`
//! x variant matrix, otherwise from the fixed defaults. The target is selected
//! through `GOOS`/`GOARCH` and the arch's variant variable.

use tracing::debug;

use crate::artifact::{Artifact, ArtifactStore};
use crate::config::{BuildConfig, IgnoredTarget};
use crate::context::BuildContext;
use crate::process::{Invocation, ProcessRunner};
use crate::target::{GoTarget, Target, TargetError, go};
use crate::template::{self, Scope};

use super::execute::{invoke_and_register, provisional_artifact, render_all, render_env, scope_fields};
use super::fill_common_defaults;
use super::types::{BuildError, BuildOptions};

pub const NAME: &str = "go";

const DEFAULT_GOOS: &[&str] = &["darwin", "linux", "windows"];
const DEFAULT_GOARCH: &[&str] = &["amd64", "arm64", "386"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoBuilder;

impl GoBuilder {
  pub fn parse(&self, raw: &str) -> Result<GoTarget, BuildError> {
    Ok(GoTarget::parse(raw)?)
  }

  pub fn with_defaults(&self, ctx: &BuildContext, mut build: BuildConfig) -> Result<BuildConfig, BuildError> {
    fill_common_defaults(ctx, &mut build, NAME);
    if build.main.is_empty() {
      build.main = ".".to_string();
    }

    build.timeout()?;

    let matrix_field = build
      .first_matrix_field()
      .or_else(|| (!build.ignore.is_empty()).then_some("ignore"));

    if !build.targets.is_empty() {
      if let Some(field) = matrix_field {
        return Err(BuildError::illegal(
          field,
          format!("{field} is not used when targets is set"),
        ));
      }
      if let Some(bad) = build.targets.iter().find(|t| !go::is_valid(t)) {
        return Err(TargetError::Unknown(bad.clone()).into());
      }
    } else if matrix_field.is_some() {
      build.targets = matrix_targets(&build);
    } else {
      build.targets = go::default_targets();
    }

    debug!(id = %build.id, targets = ?build.targets, "normalized go build");
    Ok(build)
  }

  pub async fn build<R: ProcessRunner>(
    &self,
    ctx: &BuildContext,
    build: &BuildConfig,
    options: BuildOptions,
    runner: &R,
    store: &ArtifactStore,
  ) -> Result<Artifact, BuildError> {
    let target = match &options.target {
      Target::Go(t) => t.clone(),
      other => {
        return Err(BuildError::TargetMismatch {
          builder: NAME,
          toolchain: other.toolchain(),
          target: other.to_string(),
        });
      }
    };

    let artifact = provisional_artifact(build, &options);
    let fields = scope_fields(ctx, &options, &artifact);
    let scope = Scope::new(&fields, &ctx.env);

    let mut command = vec![
      template::render(&build.tool, &scope)?,
      build.command.clone(),
      "-o".to_string(),
      options.path.display().to_string(),
    ];
    command.extend(render_all(&build.flags, &scope)?);

    let tags = render_all(&build.tags, &scope)?;
    if !tags.is_empty() {
      command.push(format!("-tags={}", tags.join(",")));
    }
    let ldflags = render_all(&build.ldflags, &scope)?;
    if !ldflags.is_empty() {
      command.push(format!("-ldflags={}", ldflags.join(" ")));
    }
    let asmflags = render_all(&build.asmflags, &scope)?;
    if !asmflags.is_empty() {
      command.push(format!("-asmflags={}", asmflags.join(" ")));
    }
    if !build.buildmode.is_empty() {
      command.push(format!("-buildmode={}", build.buildmode));
    }
    command.push(build.main.clone());

    let mut env = render_env(&ctx.env, &build.env, &fields)?;
    env.extend(target.env());

    let invocation = Invocation::new(command, env, &build.dir)
      .with_deadline(build.timeout()?)
      .with_cancel(options.cancel.clone());

    invoke_and_register(build, invocation, artifact, &fields, runner, store).await
  }
}

/// Expand the legacy `goos` x `goarch` x variant matrix.
fn matrix_targets(build: &BuildConfig) -> Vec<String> {
  let goos = or_defaults(&build.goos, DEFAULT_GOOS);
  let goarch = or_defaults(&build.goarch, DEFAULT_GOARCH);

  let mut targets = Vec::new();
  for os in &goos {
    for arch in &goarch {
      for variant in variants(build, arch) {
        let target = if variant.is_empty() {
          format!("{os}_{arch}")
        } else {
          format!("{os}_{arch}_{variant}")
        };

        if build.ignore.iter().any(|ig| ignores(ig, os, arch, &variant)) {
          debug!(target = %target, "ignored");
          continue;
        }
        if !go::is_valid(&target) {
          debug!(target = %target, "skipping unsupported target");
          continue;
        }
        targets.push(target);
      }
    }
  }
  targets
}

fn or_defaults(values: &[String], defaults: &[&str]) -> Vec<String> {
  if values.is_empty() {
    defaults.iter().map(|v| v.to_string()).collect()
  } else {
    values.to_vec()
  }
}

/// Configured variants for `arch`, its default variant, or a single empty
/// variant for arches without one.
fn variants(build: &BuildConfig, arch: &str) -> Vec<String> {
  let configured: &[String] = match arch {
    "amd64" => &build.goamd64,
    "386" => &build.go386,
    "arm" => &build.goarm,
    "arm64" => &build.goarm64,
    "mips" | "mipsle" | "mips64" | "mips64le" => &build.gomips,
    "ppc64" | "ppc64le" => &build.goppc64,
    "riscv64" => &build.goriscv64,
    _ => &[],
  };
  if !configured.is_empty() {
    return configured.to_vec();
  }
  vec![go::default_variant(arch).unwrap_or_default().to_string()]
}

fn ignores(ignore: &IgnoredTarget, os: &str, arch: &str, variant: &str) -> bool {
  let matches = |want: &str, got: &str| want.is_empty() || want == got;
  matches(&ignore.goos, os) && matches(&ignore.goarch, arch) && matches(&ignore.variant, variant)
}
