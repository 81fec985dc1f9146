mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crossbuild_lib::config::DEFAULT_CONFIG_FILE;

use cmd::BuildArgs;

/// crossbuild - Build binaries for many targets with go or zig
#[derive(Parser)]
#[command(name = "crossbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every target of every configured build
  Build {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    file: PathBuf,

    /// Maximum number of targets built at once (default: number of CPUs)
    #[arg(short, long)]
    parallelism: Option<usize>,

    /// Only run the build with this id (repeatable)
    #[arg(long = "id")]
    ids: Vec<String>,

    /// Cancel the remaining targets after the first failure
    #[arg(long)]
    fail_fast: bool,
  },

  /// Validate the configuration without building anything
  Check {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    file: PathBuf,
  },

  /// List the targets each build would produce
  Targets {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build {
      file,
      parallelism,
      ids,
      fail_fast,
    } => cmd::cmd_build(
      &file,
      BuildArgs {
        parallelism,
        ids,
        fail_fast,
      },
    ),
    Commands::Check { file } => cmd::cmd_check(&file),
    Commands::Targets { file, json } => cmd::cmd_targets(&file, json),
  }
}
