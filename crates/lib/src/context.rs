//! Run-wide state shared by every build.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Project;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::template::{self, Scope, TemplateError};

/// Template keys provided by the context.
pub mod keys {
  pub const PROJECT_NAME: &str = "ProjectName";
  pub const VERSION: &str = "Version";
}

/// Everything a build reads that is not specific to one build or target.
#[derive(Debug, Clone)]
pub struct BuildContext {
  pub project_name: String,
  pub version: String,
  pub dist: PathBuf,
  /// `KEY=VALUE` entries every toolchain invocation starts from.
  pub env: Vec<String>,
  pub diagnostics: Arc<dyn Diagnostics>,
}

impl BuildContext {
  /// A context with an empty environment.
  pub fn new(project_name: impl Into<String>) -> Self {
    Self {
      project_name: project_name.into(),
      version: String::new(),
      dist: PathBuf::from("dist"),
      env: Vec::new(),
      diagnostics: Arc::new(TracingDiagnostics),
    }
  }

  /// A context for `project`, starting from the current process environment
  /// and layering the project's env templates on top.
  pub fn from_project(project: &Project) -> Result<Self, TemplateError> {
    let mut ctx = Self::new(project.project_name.clone())
      .with_version(project.version.clone())
      .with_dist(project.dist.clone())
      .with_env(process_env());

    for entry in &project.env {
      let fields = ctx.fields();
      let rendered = template::render(entry, &Scope::new(&fields, &ctx.env))?;
      if !rendered.is_empty() {
        ctx.env.push(rendered);
      }
    }

    Ok(ctx)
  }

  pub fn with_version(mut self, version: impl Into<String>) -> Self {
    self.version = version.into();
    self
  }

  pub fn with_dist(mut self, dist: impl Into<PathBuf>) -> Self {
    self.dist = dist.into();
    self
  }

  pub fn with_env(mut self, env: Vec<String>) -> Self {
    self.env = env;
    self
  }

  pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
    self.diagnostics = diagnostics;
    self
  }

  /// Template fields contributed by the context.
  pub fn fields(&self) -> BTreeMap<String, String> {
    BTreeMap::from([
      (keys::PROJECT_NAME.to_string(), self.project_name.clone()),
      (keys::VERSION.to_string(), self.version.clone()),
    ])
  }
}

/// The current process environment as `KEY=VALUE` entries.
pub fn process_env() -> Vec<String> {
  std::env::vars_os()
    .map(|(key, value)| format!("{}={}", key.to_string_lossy(), value.to_string_lossy()))
    .collect()
}
