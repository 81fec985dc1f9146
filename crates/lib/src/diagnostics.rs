//! Non-fatal advisories raised while normalizing build configurations.
//!
//! Normalization is otherwise a pure function of its input; advisories go
//! through an injected sink so callers decide where they end up.

use std::fmt::Debug;
use std::sync::Mutex;

use tracing::warn;

/// Receives advisories.
pub trait Diagnostics: Debug + Send + Sync {
  fn advise(&self, message: &str);
}

/// Emits advisories as `warn` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
  fn advise(&self, message: &str) {
    warn!("{message}");
  }
}

/// Keeps advisories in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
  messages: Mutex<Vec<String>>,
}

impl RecordingDiagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn messages(&self) -> Vec<String> {
    self.messages.lock().map(|m| m.clone()).unwrap_or_default()
  }
}

impl Diagnostics for RecordingDiagnostics {
  fn advise(&self, message: &str) {
    if let Ok(mut messages) = self.messages.lock() {
      messages.push(message.to_string());
    }
  }
}
