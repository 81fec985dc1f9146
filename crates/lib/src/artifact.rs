//! Build artifacts and the shared artifact store.
//!
//! An [`Artifact`] is created once per successful target build and never
//! mutated afterwards. The [`ArtifactStore`] is shared by every concurrently
//! running build and only ever grows.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Keys of [`Artifact::extra`].
pub mod extra {
  /// Id of the build configuration that produced the artifact.
  pub const ID: &str = "ID";
  /// Binary name without extension.
  pub const BINARY: &str = "Binary";
  /// File extension, including the leading dot.
  pub const EXT: &str = "Ext";
  /// Go microarchitecture variant, when one was selected.
  pub const VARIANT: &str = "Variant";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
  Binary,
}

/// Metadata for one produced binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
  pub kind: ArtifactKind,
  pub name: String,
  pub path: PathBuf,
  /// Raw target string the binary was built for.
  pub target: String,
  pub os: String,
  pub arch: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub abi: String,
  #[serde(default)]
  pub extra: BTreeMap<String, serde_json::Value>,
}

impl Artifact {
  /// String value of an extra key, if present and a string.
  pub fn extra_str(&self, key: &str) -> Option<&str> {
    self.extra.get(key).and_then(|v| v.as_str())
  }

  /// Id of the build that produced this artifact.
  pub fn build_id(&self) -> Option<&str> {
    self.extra_str(extra::ID)
  }
}

/// Append-only, thread-safe collection of artifacts.
///
/// Cloning a store yields another handle to the same collection.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
  inner: Arc<Mutex<Vec<Artifact>>>,
}

impl ArtifactStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append an artifact.
  pub fn add(&self, artifact: Artifact) {
    self.lock().push(artifact);
  }

  /// Snapshot of all artifacts registered so far.
  pub fn list(&self) -> Vec<Artifact> {
    self.lock().clone()
  }

  /// Artifacts matching a predicate.
  pub fn filter(&self, predicate: impl Fn(&Artifact) -> bool) -> Vec<Artifact> {
    self.lock().iter().filter(|a| predicate(a)).cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  /// Write every artifact to `path` as pretty JSON.
  pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(&self.list()).map_err(std::io::Error::other)?;
    std::fs::write(path, format!("{json}\n"))
  }

  fn lock(&self) -> MutexGuard<'_, Vec<Artifact>> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}
