//! Modification timestamps for reproducible outputs.
//!
//! A build may pin the access and modification times of its binary, usually
//! to the commit time (`{{ .Env.SOURCE_DATE_EPOCH }}`), so archives built from
//! it are byte-for-byte reproducible.

use std::fs::{FileTimes, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TimestampError {
  #[error("invalid modification timestamp {0:?}: expected seconds since the unix epoch")]
  Invalid(String),

  #[error("failed to set times on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Parse a rendered timestamp. Blank means "leave the file alone".
pub fn parse(value: &str) -> Result<Option<SystemTime>, TimestampError> {
  let value = value.trim();
  if value.is_empty() {
    return Ok(None);
  }

  let seconds: i64 = value.parse().map_err(|_| TimestampError::Invalid(value.to_string()))?;
  let offset = Duration::from_secs(seconds.unsigned_abs());
  let time = if seconds >= 0 {
    UNIX_EPOCH.checked_add(offset)
  } else {
    UNIX_EPOCH.checked_sub(offset)
  };

  time.map(Some).ok_or_else(|| TimestampError::Invalid(value.to_string()))
}

/// Set both access and modification time of `path` to the rendered `value`.
pub fn apply(path: &Path, value: &str) -> Result<(), TimestampError> {
  let Some(time) = parse(value)? else {
    return Ok(());
  };

  let io_err = |source| TimestampError::Io {
    path: path.to_path_buf(),
    source,
  };

  let file = OpenOptions::new().write(true).open(path).map_err(io_err)?;
  file
    .set_times(FileTimes::new().set_accessed(time).set_modified(time))
    .map_err(io_err)?;

  debug!(path = %path.display(), timestamp = %value.trim(), "applied modification timestamp");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn blank_is_a_no_op() {
    assert!(parse("").unwrap().is_none());
    assert!(parse("  ").unwrap().is_none());
    apply(Path::new("/does/not/exist"), "").unwrap();
  }

  #[test]
  fn parse_unix_seconds() {
    let time = parse("1700000000").unwrap().unwrap();
    assert_eq!(time.duration_since(UNIX_EPOCH).unwrap().as_secs(), 1_700_000_000);
  }

  #[test]
  fn parse_rejects_garbage() {
    assert!(matches!(parse("yesterday"), Err(TimestampError::Invalid(ref v)) if v == "yesterday"));
    assert!(parse("2024-01-01T00:00:00Z").is_err());
  }

  #[test]
  fn apply_sets_modification_time() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app");
    std::fs::write(&path, b"binary").unwrap();

    apply(&path, "315532800").unwrap();

    let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
    assert_eq!(modified.duration_since(UNIX_EPOCH).unwrap().as_secs(), 315_532_800);
  }

  #[test]
  fn apply_on_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("missing");

    let err = apply(&path, "315532800").unwrap_err();

    assert!(matches!(err, TimestampError::Io { path: ref p, .. } if *p == path));
  }
}
