//! crossbuild-lib: cross-compilation targets and toolchain invocation.
//!
//! This crate provides the pieces of a multi-target build:
//! - `Target`: a parsed go (`linux_arm64`) or zig (`aarch64-linux`) target
//! - `Builder`: per-toolchain normalization and execution of one target
//! - `Artifact`: the record of one produced binary
//! - `build::run`: builds every target of a project in parallel

pub mod artifact;
pub mod build;
pub mod builder;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod process;
pub mod target;
pub mod template;
pub mod timestamp;

#[cfg(test)]
mod util;
