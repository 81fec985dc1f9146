//! Project and build configuration.
//!
//! A project file (`crossbuild.yaml`) lists one or more builds. Each build
//! names the toolchain that runs it and the targets to produce binaries for:
//!
//! ```yaml
//! project_name: hello
//! version: 1.2.0
//! env:
//!   - CGO_ENABLED=0
//! builds:
//!   - id: cli
//!     builder: zig
//!     binary: hello
//!     targets: [x86_64-linux, aarch64-macos]
//!     mod_timestamp: "{{ .Env.SOURCE_DATE_EPOCH }}"
//! ```
//!
//! The go-specific matrix fields (`goos`, `goarch`, `goarm`, ...) and knobs
//! (`ldflags`, `tags`, ...) are accepted here and checked per toolchain when a
//! builder normalizes the build.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "crossbuild.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse configuration: {0}")]
  Parse(#[from] serde_yaml::Error),

  #[error("invalid timeout {value:?}: {source}")]
  InvalidTimeout {
    value: String,
    #[source]
    source: humantime::DurationError,
  },
}

/// A whole project file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Project {
  pub project_name: String,
  pub version: String,
  pub dist: PathBuf,
  /// `KEY=VALUE` templates layered over the process environment.
  pub env: Vec<String>,
  pub builds: Vec<BuildConfig>,
}

impl Project {
  /// Parse a project from YAML, filling project-level defaults.
  pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
    let project: Project = serde_yaml::from_str(content)?;
    Ok(project.with_defaults(None))
  }

  /// Load a project file. The project name defaults to the name of the
  /// directory containing it.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let project: Project = serde_yaml::from_str(&content)?;

    let dir_name = std::path::absolute(path)
      .ok()
      .and_then(|p| p.parent().and_then(|d| d.file_name()).map(|n| n.to_string_lossy().into_owned()));

    Ok(project.with_defaults(dir_name))
  }

  fn with_defaults(mut self, fallback_name: Option<String>) -> Self {
    if self.project_name.is_empty() {
      self.project_name = fallback_name.unwrap_or_else(|| "project".to_string());
    }
    if self.dist.as_os_str().is_empty() {
      self.dist = PathBuf::from("dist");
    }
    if self.builds.is_empty() {
      self.builds.push(BuildConfig::default());
    }
    self
  }
}

/// Configuration of one build.
///
/// Empty strings and lists mean "unset"; builders fill toolchain defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
  pub id: String,
  /// Registry name of the toolchain (`go`, `zig`).
  pub builder: String,
  pub binary: String,
  pub targets: Vec<String>,
  /// Toolchain binary; a template.
  #[serde(alias = "gobinary")]
  pub tool: String,
  pub command: String,
  pub dir: String,
  /// `KEY=VALUE` templates, rendered in order.
  pub env: Vec<String>,
  /// Template rendering to seconds since the unix epoch.
  pub mod_timestamp: String,
  /// Extra command-line flags; templates.
  pub flags: Vec<String>,
  /// Deadline for each toolchain invocation, e.g. `10m`.
  pub timeout: Option<String>,

  // Go-only knobs.
  pub main: String,
  pub ldflags: Vec<String>,
  pub tags: Vec<String>,
  pub asmflags: Vec<String>,
  pub buildmode: String,

  // Go target matrix, superseded by `targets`.
  pub goos: Vec<String>,
  pub goarch: Vec<String>,
  pub goamd64: Vec<String>,
  pub go386: Vec<String>,
  pub goarm: Vec<String>,
  pub goarm64: Vec<String>,
  pub gomips: Vec<String>,
  pub goppc64: Vec<String>,
  pub goriscv64: Vec<String>,
  pub ignore: Vec<IgnoredTarget>,
}

impl BuildConfig {
  /// Parsed [`BuildConfig::timeout`].
  pub fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
    match self.timeout.as_deref().map(str::trim) {
      None | Some("") => Ok(None),
      Some(value) => humantime::parse_duration(value)
        .map(Some)
        .map_err(|source| ConfigError::InvalidTimeout {
          value: value.to_string(),
          source,
        }),
    }
  }

  /// The first set go matrix field, by name.
  pub fn first_matrix_field(&self) -> Option<&'static str> {
    [
      ("goos", self.goos.is_empty()),
      ("goarch", self.goarch.is_empty()),
      ("goamd64", self.goamd64.is_empty()),
      ("go386", self.go386.is_empty()),
      ("goarm", self.goarm.is_empty()),
      ("goarm64", self.goarm64.is_empty()),
      ("gomips", self.gomips.is_empty()),
      ("goppc64", self.goppc64.is_empty()),
      ("goriscv64", self.goriscv64.is_empty()),
    ]
    .into_iter()
    .find(|(_, empty)| !empty)
    .map(|(name, _)| name)
  }
}

/// A `goos`/`goarch` combination excluded from the go matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IgnoredTarget {
  pub goos: String,
  pub goarch: String,
  /// Matches any variant when empty.
  pub variant: String,
}
