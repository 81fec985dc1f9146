//! Target descriptors and the triple codec.
//!
//! A target string names the platform a single build produces a binary for.
//! Each toolchain spells targets its own way:
//!
//! - zig: `ARCH-OS[-ABI]`, e.g. `aarch64-linux-musl`
//! - go: `OS_ARCH[_VARIANT]`, e.g. `linux_arm_7`
//!
//! The raw string is kept verbatim as the descriptor's identity, while the
//! structured fields use the canonical vocabulary (`darwin`, `arm64`, `amd64`)
//! shared by every toolchain.
//!
//! # Example
//!
//! ```
//! use crossbuild_lib::target::{Target, ZigTarget};
//!
//! let target = Target::Zig("aarch64-macos".parse::<ZigTarget>().unwrap());
//! assert_eq!(target.to_string(), "aarch64-macos");
//! assert_eq!(target.os(), "darwin");
//! assert_eq!(target.arch(), "arm64");
//! ```

pub mod go;
pub mod zig;

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

pub use go::GoTarget;
pub use zig::ZigTarget;

/// Template field names exposed by every target.
pub mod keys {
  pub const OS: &str = "Os";
  pub const ARCH: &str = "Arch";
  pub const ABI: &str = "Abi";
  pub const AMD64: &str = "Amd64";
  pub const I386: &str = "386";
  pub const ARM: &str = "Arm";
  pub const ARM64: &str = "Arm64";
  pub const MIPS: &str = "Mips";
  pub const PPC64: &str = "Ppc64";
  pub const RISCV64: &str = "Riscv64";
  pub const TARGET: &str = "Target";
}

/// Every key returned by [`Target::fields`], regardless of toolchain.
pub const FIELD_KEYS: &[&str] = &[
  keys::OS,
  keys::ARCH,
  keys::ABI,
  keys::AMD64,
  keys::I386,
  keys::ARM,
  keys::ARM64,
  keys::MIPS,
  keys::PPC64,
  keys::RISCV64,
  keys::TARGET,
];

/// Errors produced while parsing or validating a target string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
  /// Fewer than two non-empty components.
  #[error("{0} is not a valid build target")]
  Malformed(String),

  /// Well formed, but not in the toolchain's allow-list.
  #[error("invalid target: {0}")]
  Unknown(String),
}

/// A parsed build target, one variant per toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
  Go(GoTarget),
  Zig(ZigTarget),
}

impl Target {
  /// The raw target string, exactly as configured.
  pub fn as_str(&self) -> &str {
    match self {
      Self::Go(t) => &t.target,
      Self::Zig(t) => &t.target,
    }
  }

  /// Canonical operating system (e.g. `darwin`).
  pub fn os(&self) -> &str {
    match self {
      Self::Go(t) => &t.os,
      Self::Zig(t) => &t.os,
    }
  }

  /// Canonical architecture (e.g. `arm64`).
  pub fn arch(&self) -> &str {
    match self {
      Self::Go(t) => &t.arch,
      Self::Zig(t) => &t.arch,
    }
  }

  /// ABI suffix; always empty for go targets.
  pub fn abi(&self) -> &str {
    match self {
      Self::Go(_) => "",
      Self::Zig(t) => &t.abi,
    }
  }

  /// Name of the toolchain this target belongs to.
  pub fn toolchain(&self) -> &'static str {
    match self {
      Self::Go(_) => "go",
      Self::Zig(_) => "zig",
    }
  }

  /// Template fields for this target.
  ///
  /// Every key in [`FIELD_KEYS`] is present; keys that mean nothing for the
  /// toolchain map to an empty string so templates never hit a missing key.
  pub fn fields(&self) -> BTreeMap<&'static str, String> {
    let mut fields: BTreeMap<&'static str, String> = FIELD_KEYS.iter().map(|key| (*key, String::new())).collect();

    fields.insert(keys::OS, self.os().to_string());
    fields.insert(keys::ARCH, self.arch().to_string());
    fields.insert(keys::ABI, self.abi().to_string());
    fields.insert(keys::TARGET, self.as_str().to_string());

    if let Self::Go(t) = self {
      if let Some(key) = t.variant_key() {
        fields.insert(key, t.variant.clone());
      }
    }

    fields
  }

  /// File extension of binaries built for this target.
  pub fn binary_ext(&self) -> &'static str {
    if self.os() == "windows" {
      ".exe"
    } else if self.arch() == "wasm" {
      ".wasm"
    } else {
      ""
    }
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Translate a toolchain-native OS token to its canonical spelling.
///
/// Unknown tokens pass through unchanged.
pub fn canonical_os(token: &str) -> &str {
  match token {
    "macos" => "darwin",
    other => other,
  }
}

/// Translate a toolchain-native architecture token to its canonical spelling.
///
/// Unknown tokens pass through unchanged.
pub fn canonical_arch(token: &str) -> &str {
  match token {
    "aarch64" => "arm64",
    "x86_64" => "amd64",
    "x86" | "i386" | "i686" => "386",
    "powerpc64" => "ppc64",
    "powerpc64le" => "ppc64le",
    "mipsel" => "mipsle",
    "mips64el" => "mips64le",
    "loongarch64" => "loong64",
    "wasm32" => "wasm",
    other => other,
  }
}
