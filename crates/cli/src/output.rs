//! CLI output formatting.
//!
//! One line per target or artifact, colored by outcome, plus the summary
//! printed after a build run.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use crossbuild_lib::artifact::Artifact;
use crossbuild_lib::build::{BuildReport, TargetFailure};
use crossbuild_lib::target::Target;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// `os/arch`, or `os/arch/abi` when the target names an ABI.
pub fn platform(os: &str, arch: &str, abi: &str) -> String {
  if abi.is_empty() {
    format!("{os}/{arch}")
  } else {
    format!("{os}/{arch}/{abi}")
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

/// `✓ <target> (<id>) → <path>`
pub fn print_artifact(artifact: &Artifact) {
  print_success(&format!(
    "{} ({}) {} {}",
    artifact.target,
    artifact.build_id().unwrap_or_default(),
    symbols::ARROW,
    artifact.path.display()
  ));
}

/// Failed targets go to stderr in red, cancelled ones in yellow.
pub fn print_failure(failure: &TargetFailure) {
  if failure.cancelled() {
    eprintln!(
      "{} {} ({}): cancelled",
      symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
      failure.target,
      failure.id
    );
  } else {
    let message = format!("{} ({}): {}", failure.target, failure.id, failure.error);
    eprintln!(
      "{} {}",
      symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
      message.if_supports_color(Stream::Stderr, |s| s.red())
    );
  }
}

/// Build id and builder, as the header of a target listing.
pub fn print_build_header(id: &str, builder: &str) {
  println!(
    "{} {}",
    id.if_supports_color(Stream::Stdout, |s| s.bold()),
    format!("({builder})").if_supports_color(Stream::Stdout, |s| s.dimmed())
  );
}

pub fn print_target(target: &Target) {
  let platform = platform(target.os(), target.arch(), target.abi());
  println!(
    "  {:<24} {}",
    target.as_str(),
    platform.if_supports_color(Stream::Stdout, |s| s.dimmed())
  );
}

pub fn print_summary(report: &BuildReport, elapsed: Duration, artifacts: &Path) {
  println!();
  print_stat("Built", &report.succeeded.len().to_string());
  print_stat("Failed", &report.failed.len().to_string());
  print_stat("Duration", &format_duration(elapsed));
  print_stat("Artifacts", &artifacts.display().to_string());
}

fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
