//! Zig targets: `ARCH-OS[-ABI]`.

use std::fmt;
use std::str::FromStr;

use super::{TargetError, canonical_arch, canonical_os};

/// A zig build target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZigTarget {
  /// The zig formatted target, verbatim.
  pub target: String,
  pub os: String,
  pub arch: String,
  /// Everything after the second `-`, or empty.
  pub abi: String,
}

impl ZigTarget {
  /// Parse a zig triple.
  ///
  /// Splits on `-` only, since zig architectures contain underscores
  /// (`x86_64`, `aarch64_be`).
  pub fn parse(raw: &str) -> Result<Self, TargetError> {
    let mut parts = raw.splitn(3, '-');
    let arch = parts.next().unwrap_or_default();
    let os = parts.next().unwrap_or_default();

    if arch.is_empty() || os.is_empty() {
      return Err(TargetError::Malformed(raw.to_string()));
    }

    Ok(Self {
      target: raw.to_string(),
      os: canonical_os(os).to_string(),
      arch: canonical_arch(arch).to_string(),
      abi: parts.next().unwrap_or_default().to_string(),
    })
  }
}

impl FromStr for ZigTarget {
  type Err = TargetError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for ZigTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.target)
  }
}

/// Whether `target` is known to build with zig.
pub fn is_valid(target: &str) -> bool {
  VALID_TARGETS.binary_search(&target).is_ok()
}

/// Targets used when a zig build configures none.
pub fn default_targets() -> Vec<String> {
  DEFAULT_TARGETS.iter().map(|t| t.to_string()).collect()
}

const DEFAULT_TARGETS: &[&str] = &[
  "x86_64-linux",
  "x86_64-macos",
  "x86_64-windows",
  "aarch64-linux",
  "aarch64-macos",
];

// Generated by compiling a hello-world C program for every `zig targets`
// entry and keeping the ones that succeeded. Sorted; looked up by binary search.
const VALID_TARGETS: &[&str] = &[
  "aarch64-linux",
  "aarch64-linux-gnu",
  "aarch64-linux-musl",
  "aarch64-macos",
  "aarch64-macos-none",
  "aarch64-windows",
  "aarch64-windows-gnu",
  "aarch64_be-linux",
  "aarch64_be-linux-gnu",
  "aarch64_be-linux-musl",
  "arm-linux",
  "arm-linux-gnueabi",
  "arm-linux-gnueabihf",
  "arm-linux-musleabi",
  "arm-linux-musleabihf",
  "mips-linux",
  "mips-linux-gnueabi",
  "mips-linux-gnueabihf",
  "mips-linux-musl",
  "mips64-linux",
  "mips64-linux-gnuabi64",
  "mips64-linux-gnuabin32",
  "mips64-linux-musl",
  "mips64el-linux",
  "mips64el-linux-gnuabi64",
  "mips64el-linux-gnuabin32",
  "mips64el-linux-musl",
  "mipsel-linux",
  "mipsel-linux-gnueabi",
  "mipsel-linux-gnueabihf",
  "mipsel-linux-musl",
  "powerpc-linux",
  "powerpc-linux-musl",
  "powerpc64-linux",
  "powerpc64-linux-gnu",
  "powerpc64-linux-musl",
  "powerpc64le-linux",
  "powerpc64le-linux-gnu",
  "powerpc64le-linux-musl",
  "riscv64-linux",
  "riscv64-linux-musl",
  "thumb-linux",
  "thumb-linux-musleabi",
  "thumb-linux-musleabihf",
  "wasm32-wasi",
  "wasm32-wasi-musl",
  "x86-linux",
  "x86-linux-gnu",
  "x86-linux-musl",
  "x86-windows",
  "x86-windows-gnu",
  "x86_64-linux",
  "x86_64-linux-gnu",
  "x86_64-linux-gnux32",
  "x86_64-linux-musl",
  "x86_64-macos",
  "x86_64-macos-none",
  "x86_64-windows",
  "x86_64-windows-gnu",
];
