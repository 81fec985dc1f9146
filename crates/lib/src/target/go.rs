//! Go targets: `OS_ARCH[_VARIANT]`.
//!
//! The variant is the value of the arch-specific microarchitecture knob
//! (`GOAMD64`, `GOARM`, `GOMIPS`, ...), e.g. `linux_amd64_v3` or `linux_arm_7`.

use std::fmt;
use std::str::FromStr;

use super::{TargetError, canonical_arch, canonical_os, keys};

/// A go build target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GoTarget {
  /// The go formatted target, verbatim.
  pub target: String,
  pub os: String,
  pub arch: String,
  pub variant: String,
}

impl GoTarget {
  /// Parse a go target string.
  pub fn parse(raw: &str) -> Result<Self, TargetError> {
    let mut parts = raw.splitn(3, '_');
    let os = parts.next().unwrap_or_default();
    let arch = parts.next().unwrap_or_default();

    if os.is_empty() || arch.is_empty() {
      return Err(TargetError::Malformed(raw.to_string()));
    }

    Ok(Self {
      target: raw.to_string(),
      os: canonical_os(os).to_string(),
      arch: canonical_arch(arch).to_string(),
      variant: parts.next().unwrap_or_default().to_string(),
    })
  }

  /// Template field that carries the variant for this arch, if any.
  pub fn variant_key(&self) -> Option<&'static str> {
    match self.arch.as_str() {
      "amd64" => Some(keys::AMD64),
      "386" => Some(keys::I386),
      "arm" => Some(keys::ARM),
      "arm64" => Some(keys::ARM64),
      "mips" | "mipsle" | "mips64" | "mips64le" => Some(keys::MIPS),
      "ppc64" | "ppc64le" => Some(keys::PPC64),
      "riscv64" => Some(keys::RISCV64),
      _ => None,
    }
  }

  /// Environment variable the go toolchain reads the variant from.
  pub fn variant_env(&self) -> Option<&'static str> {
    variant_env(&self.arch)
  }

  /// The `KEY=VALUE` entries selecting this target in the go toolchain.
  pub fn env(&self) -> Vec<String> {
    let mut env = vec![format!("GOOS={}", self.os), format!("GOARCH={}", self.arch)];
    if !self.variant.is_empty() {
      if let Some(key) = self.variant_env() {
        env.push(format!("{key}={}", self.variant));
      }
    }
    env
  }
}

impl FromStr for GoTarget {
  type Err = TargetError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for GoTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.target)
  }
}

/// Environment variable carrying the variant for `arch`.
pub fn variant_env(arch: &str) -> Option<&'static str> {
  match arch {
    "amd64" => Some("GOAMD64"),
    "386" => Some("GO386"),
    "arm" => Some("GOARM"),
    "arm64" => Some("GOARM64"),
    "mips" | "mipsle" => Some("GOMIPS"),
    "mips64" | "mips64le" => Some("GOMIPS64"),
    "ppc64" | "ppc64le" => Some("GOPPC64"),
    "riscv64" => Some("GORISCV64"),
    _ => None,
  }
}

/// Variant values accepted for `arch`. Empty when the arch has no variant knob.
pub fn legal_variants(arch: &str) -> &'static [&'static str] {
  match arch {
    "amd64" => &["v1", "v2", "v3", "v4"],
    "386" => &["sse2", "softfloat"],
    "arm" => &["5", "6", "7"],
    "arm64" => &[
      "v8.0", "v8.1", "v8.2", "v8.3", "v8.4", "v8.5", "v8.6", "v8.7", "v8.8", "v8.9", "v9.0", "v9.1", "v9.2", "v9.3",
      "v9.4", "v9.5",
    ],
    "mips" | "mipsle" | "mips64" | "mips64le" => &["hardfloat", "softfloat"],
    "ppc64" | "ppc64le" => &["power8", "power9", "power10"],
    "riscv64" => &["rva20u64", "rva22u64"],
    _ => &[],
  }
}

/// Variant the go toolchain assumes for `arch` when none is given.
pub fn default_variant(arch: &str) -> Option<&'static str> {
  match arch {
    "amd64" => Some("v1"),
    "386" => Some("sse2"),
    "arm" => Some("6"),
    "arm64" => Some("v8.0"),
    "mips" | "mipsle" | "mips64" | "mips64le" => Some("hardfloat"),
    "ppc64" | "ppc64le" => Some("power8"),
    "riscv64" => Some("rva20u64"),
    _ => None,
  }
}

/// Whether `target` is a port the go toolchain supports.
pub fn is_valid(target: &str) -> bool {
  let Ok(t) = GoTarget::parse(target) else {
    return false;
  };
  let pair = format!("{}/{}", t.os, t.arch);
  VALID_PAIRS.binary_search(&pair.as_str()).is_ok()
    && (t.variant.is_empty() || legal_variants(&t.arch).contains(&t.variant.as_str()))
}

/// Targets used when a go build configures neither targets nor a goos/goarch matrix.
pub fn default_targets() -> Vec<String> {
  DEFAULT_TARGETS.iter().map(|t| t.to_string()).collect()
}

const DEFAULT_TARGETS: &[&str] = &[
  "linux_amd64_v1",
  "darwin_amd64_v1",
  "windows_amd64_v1",
  "linux_arm64_v8.0",
  "darwin_arm64_v8.0",
  "windows_arm64_v8.0",
];

// Output of `go tool dist list`. Sorted; looked up by binary search.
const VALID_PAIRS: &[&str] = &[
  "aix/ppc64",
  "android/386",
  "android/amd64",
  "android/arm",
  "android/arm64",
  "darwin/amd64",
  "darwin/arm64",
  "dragonfly/amd64",
  "freebsd/386",
  "freebsd/amd64",
  "freebsd/arm",
  "freebsd/arm64",
  "freebsd/riscv64",
  "illumos/amd64",
  "ios/amd64",
  "ios/arm64",
  "js/wasm",
  "linux/386",
  "linux/amd64",
  "linux/arm",
  "linux/arm64",
  "linux/loong64",
  "linux/mips",
  "linux/mips64",
  "linux/mips64le",
  "linux/mipsle",
  "linux/ppc64",
  "linux/ppc64le",
  "linux/riscv64",
  "linux/s390x",
  "netbsd/386",
  "netbsd/amd64",
  "netbsd/arm",
  "netbsd/arm64",
  "openbsd/386",
  "openbsd/amd64",
  "openbsd/arm",
  "openbsd/arm64",
  "openbsd/ppc64",
  "openbsd/riscv64",
  "plan9/386",
  "plan9/amd64",
  "plan9/arm",
  "solaris/amd64",
  "wasip1/wasm",
  "windows/386",
  "windows/amd64",
  "windows/arm64",
];
