//! External process invocation.
//!
//! Toolchain commands run with exactly the environment they are given (the
//! parent environment is not inherited) and with stdout and stderr captured
//! together, in the order the chunks arrive. An invocation may carry a deadline and a cancellation signal;
//! when either fires the child is killed and the run is reported as failed.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::watch;
use tracing::debug;

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("empty command line")]
  EmptyCommand,

  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The command ran and exited unsuccessfully. `output` is the combined
  /// output exactly as captured.
  #[error("exit status {code:?}: {output}")]
  Failed { code: Option<i32>, output: String },

  #[error("killed after exceeding the {} deadline", humantime::format_duration(*.0))]
  TimedOut(Duration),

  #[error("killed after the build was cancelled")]
  Cancelled,

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// One external command to run.
#[derive(Debug, Clone)]
pub struct Invocation {
  /// Program followed by its arguments.
  pub command: Vec<String>,
  /// `KEY=VALUE` entries; entries without `=` are skipped.
  pub env: Vec<String>,
  pub dir: PathBuf,
  pub deadline: Option<Duration>,
  pub cancel: Option<CancelSignal>,
}

impl Invocation {
  pub fn new(command: Vec<String>, env: Vec<String>, dir: impl Into<PathBuf>) -> Self {
    Self {
      command,
      env,
      dir: dir.into(),
      deadline: None,
      cancel: None,
    }
  }

  pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
    self.deadline = deadline;
    self
  }

  pub fn with_cancel(mut self, cancel: Option<CancelSignal>) -> Self {
    self.cancel = cancel;
    self
  }

  /// The command line joined by spaces, for messages.
  pub fn display_command(&self) -> String {
    self.command.join(" ")
  }
}

/// Output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
  /// Standard output and standard error, interleaved as read.
  pub combined: Vec<u8>,
}

impl ProcessOutput {
  /// The combined output, trimmed, for logging.
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.combined).trim().to_string()
  }
}

/// Runs external commands.
pub trait ProcessRunner: Send + Sync {
  fn run(&self, invocation: Invocation) -> impl Future<Output = Result<ProcessOutput, ProcessError>> + Send;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
  async fn run(&self, invocation: Invocation) -> Result<ProcessOutput, ProcessError> {
    let Invocation {
      command: argv,
      env,
      dir,
      deadline,
      cancel,
    } = invocation;

    let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;

    if cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
      return Err(ProcessError::Cancelled);
    }

    let mut command = Command::new(program);
    command
      .args(args)
      .current_dir(&dir)
      .env_clear()
      .envs(env.iter().filter_map(|entry| entry.split_once('=')))
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      // Dropping the wait future below must take the child down with it.
      .kill_on_drop(true);

    debug!(program = %program, dir = ?dir, "spawning process");

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
      program: program.clone(),
      source,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let finished = async {
      let combined = read_interleaved(stdout, stderr).await?;
      let status = child.wait().await?;
      Ok::<_, std::io::Error>((status, combined))
    };

    let expired = async {
      match deadline {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
      }
    };

    let cancelled = async {
      match cancel {
        Some(mut signal) => signal.cancelled().await,
        None => std::future::pending().await,
      }
    };

    let (status, combined) = tokio::select! {
      finished = finished => finished?,
      _ = expired => return Err(ProcessError::TimedOut(deadline.unwrap_or_default())),
      _ = cancelled => return Err(ProcessError::Cancelled),
    };

    if !status.success() {
      return Err(ProcessError::Failed {
        code: status.code(),
        output: String::from_utf8_lossy(&combined).into_owned(),
      });
    }

    Ok(ProcessOutput { combined })
  }
}

/// Read both pipes until they close, appending chunks as they arrive.
///
/// When both pipes are readable at once, stdout is read first.
async fn read_interleaved(
  mut stdout: Option<ChildStdout>,
  mut stderr: Option<ChildStderr>,
) -> std::io::Result<Vec<u8>> {
  let mut combined = Vec::new();
  let mut out_buf = [0u8; 8192];
  let mut err_buf = [0u8; 8192];

  while stdout.is_some() || stderr.is_some() {
    tokio::select! {
      biased;
      read = read_chunk(&mut stdout, &mut out_buf) => match read? {
        0 => stdout = None,
        n => combined.extend_from_slice(&out_buf[..n]),
      },
      read = read_chunk(&mut stderr, &mut err_buf) => match read? {
        0 => stderr = None,
        n => combined.extend_from_slice(&err_buf[..n]),
      },
    }
  }

  Ok(combined)
}

/// Read from `pipe`, or never resolve once it is closed.
async fn read_chunk<R: AsyncRead + Unpin>(pipe: &mut Option<R>, buf: &mut [u8]) -> std::io::Result<usize> {
  match pipe {
    Some(pipe) => pipe.read(buf).await,
    None => std::future::pending().await,
  }
}

/// Receiving side of a cancellation channel.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
  pub fn is_cancelled(&self) -> bool {
    *self.0.borrow()
  }

  /// Resolves once cancellation is requested. Never resolves if the
  /// [`Canceller`] is dropped without cancelling.
  pub async fn cancelled(&mut self) {
    loop {
      if *self.0.borrow_and_update() {
        return;
      }
      if self.0.changed().await.is_err() {
        std::future::pending::<()>().await;
      }
    }
  }
}

/// Sending side of a cancellation channel.
#[derive(Debug)]
pub struct Canceller(watch::Sender<bool>);

impl Canceller {
  pub fn new() -> Self {
    Self(watch::Sender::new(false))
  }

  pub fn signal(&self) -> CancelSignal {
    CancelSignal(self.0.subscribe())
  }

  pub fn cancel(&self) {
    self.0.send_replace(true);
  }

  pub fn is_cancelled(&self) -> bool {
    *self.0.borrow()
  }
}

impl Default for Canceller {
  fn default() -> Self {
    Self::new()
  }
}
