//! Steps every builder shares when building a single target.
//!
//! A target build moves through
//! `validated -> command-resolved -> env-resolved -> process-invoked ->
//! timestamp-applied -> registered`; any error ends it and nothing is
//! registered.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::artifact::{Artifact, ArtifactKind, ArtifactStore, extra};
use crate::config::BuildConfig;
use crate::context::BuildContext;
use crate::process::{Invocation, ProcessRunner};
use crate::target::Target;
use crate::template::{self, Scope};
use crate::timestamp;

use super::types::{BuildError, BuildOptions};

/// Template keys describing the output of the current target.
pub mod keys {
  pub const NAME: &str = "Name";
  pub const PATH: &str = "Path";
  pub const EXT: &str = "Ext";
  pub const BINARY: &str = "Binary";
  pub const ID: &str = "ID";
}

/// The artifact a target build will register if it succeeds.
pub(crate) fn provisional_artifact(build: &BuildConfig, options: &BuildOptions) -> Artifact {
  let file_name = options
    .path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  let binary = file_name.strip_suffix(options.ext.as_str()).unwrap_or(&file_name);

  let mut extras = BTreeMap::from([
    (extra::ID.to_string(), serde_json::Value::from(build.id.as_str())),
    (extra::BINARY.to_string(), serde_json::Value::from(binary)),
    (extra::EXT.to_string(), serde_json::Value::from(options.ext.as_str())),
  ]);
  if let Target::Go(t) = &options.target {
    if !t.variant.is_empty() {
      extras.insert(extra::VARIANT.to_string(), serde_json::Value::from(t.variant.as_str()));
    }
  }

  Artifact {
    kind: ArtifactKind::Binary,
    name: options.name.clone(),
    path: options.path.clone(),
    target: options.target.to_string(),
    os: options.target.os().to_string(),
    arch: options.target.arch().to_string(),
    abi: options.target.abi().to_string(),
    extra: extras,
  }
}

/// Every field a template may reference while building one target.
pub(crate) fn scope_fields(
  ctx: &BuildContext,
  options: &BuildOptions,
  artifact: &Artifact,
) -> BTreeMap<String, String> {
  let mut fields = ctx.fields();
  fields.extend(options.target.fields().into_iter().map(|(k, v)| (k.to_string(), v)));
  fields.insert(keys::NAME.to_string(), artifact.name.clone());
  fields.insert(keys::PATH.to_string(), artifact.path.display().to_string());
  fields.insert(keys::EXT.to_string(), options.ext.clone());
  fields.insert(
    keys::BINARY.to_string(),
    artifact.extra_str(extra::BINARY).unwrap_or_default().to_string(),
  );
  fields.insert(
    keys::ID.to_string(),
    artifact.build_id().unwrap_or_default().to_string(),
  );
  fields
}

/// Render a list of templates, dropping the ones that come out empty.
pub(crate) fn render_all(templates: &[String], scope: &Scope<'_>) -> Result<Vec<String>, BuildError> {
  let mut rendered = Vec::with_capacity(templates.len());
  for t in templates {
    let value = template::render(t, scope)?;
    if !value.is_empty() {
      rendered.push(value);
    }
  }
  Ok(rendered)
}

/// Render env templates one at a time, each against everything accumulated
/// before it. Empty results are dropped.
pub(crate) fn render_env(
  base: &[String],
  templates: &[String],
  fields: &BTreeMap<String, String>,
) -> Result<Vec<String>, BuildError> {
  let mut env = base.to_vec();
  for entry in templates {
    let rendered = template::render(entry, &Scope::new(fields, &env))?;
    debug!(env = %entry, evaluated = %rendered, "env evaluated");
    if !rendered.is_empty() {
      env.push(rendered);
    }
  }
  Ok(env)
}

/// Run the resolved command, pin the timestamp and register the artifact.
pub(crate) async fn invoke_and_register<R: ProcessRunner>(
  build: &BuildConfig,
  invocation: Invocation,
  artifact: Artifact,
  fields: &BTreeMap<String, String>,
  runner: &R,
  store: &ArtifactStore,
) -> Result<Artifact, BuildError> {
  let command = invocation.display_command();
  let env = invocation.env.clone();

  debug!(cmd = %command, dir = %invocation.dir.display(), "running");
  let output = runner.run(invocation).await.map_err(|source| BuildError::Process {
    command: command.clone(),
    source,
  })?;

  let text = output.text();
  if !text.is_empty() {
    info!(cmd = %command, "{text}");
  }

  let mod_timestamp = template::render(&build.mod_timestamp, &Scope::new(fields, &env))?;
  timestamp::apply(&artifact.path, &mod_timestamp)?;

  store.add(artifact.clone());
  info!(target = %artifact.target, path = %artifact.path.display(), "built");
  Ok(artifact)
}
