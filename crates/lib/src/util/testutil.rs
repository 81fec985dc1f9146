//! Test utilities for crossbuild-lib.
//!
//! This module provides cross-platform helpers for tests that need to execute
//! shell commands.

/// Returns the command line running `script` through the platform shell.
#[cfg(unix)]
pub fn sh(script: &str) -> Vec<String> {
  vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

#[cfg(windows)]
pub fn sh(script: &str) -> Vec<String> {
  vec!["cmd.exe".to_string(), "/C".to_string(), script.to_string()]
}

/// An environment holding only the caller's `PATH`.
///
/// Processes run with a cleared environment, so tests pass this along to be
/// able to find `sleep`, `echo` and friends.
pub fn path_env() -> Vec<String> {
  vec![format!("PATH={}", std::env::var("PATH").unwrap_or_default())]
}

/// A [`ProcessRunner`] that records invocations instead of running them.
///
/// Invocations whose command line contains `fail_on` fail with `error: bad flag`,
/// and those containing `panic_on` panic. With `block` set, every other
/// invocation waits until it is cancelled.
#[derive(Debug, Default)]
pub struct FakeRunner {
  pub fail_on: Option<String>,
  pub panic_on: Option<String>,
  pub block: bool,
  calls: std::sync::Mutex<Vec<crate::process::Invocation>>,
}

impl FakeRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing_on(pattern: &str) -> Self {
    Self {
      fail_on: Some(pattern.to_string()),
      ..Default::default()
    }
  }

  pub fn panicking_on(pattern: &str) -> Self {
    Self {
      panic_on: Some(pattern.to_string()),
      ..Default::default()
    }
  }

  pub fn blocking(mut self) -> Self {
    self.block = true;
    self
  }

  pub fn calls(&self) -> Vec<crate::process::Invocation> {
    self.calls.lock().unwrap().clone()
  }
}

impl crate::process::ProcessRunner for FakeRunner {
  async fn run(
    &self,
    invocation: crate::process::Invocation,
  ) -> Result<crate::process::ProcessOutput, crate::process::ProcessError> {
    use crate::process::{ProcessError, ProcessOutput};

    self.calls.lock().unwrap().push(invocation.clone());

    let command = invocation.display_command();
    if self.panic_on.as_deref().is_some_and(|p| command.contains(p)) {
      panic!("toolchain crashed on {command}");
    }
    if self.fail_on.as_deref().is_some_and(|p| command.contains(p)) {
      return Err(ProcessError::Failed {
        code: Some(1),
        output: "error: bad flag".to_string(),
      });
    }

    if self.block {
      match invocation.cancel {
        Some(mut signal) => {
          signal.cancelled().await;
          return Err(ProcessError::Cancelled);
        }
        None => std::future::pending::<()>().await,
      }
    }

    Ok(ProcessOutput::default())
  }
}
