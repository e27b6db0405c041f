//! CLI command definitions for the `runly` binary.
//!
//! Uses clap derive macros for argument parsing. Asset commands take the
//! asset file as a positional argument (`runly check sop.yaml`); identity
//! and profile management live under `keys` and `config`.

pub mod asset;
pub mod config;
pub mod keys;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Author, seal and run Runly SOP assets.
#[derive(Parser)]
#[command(name = "runly", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log errors only. Command results are still printed.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "RUNLY_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an asset and verify its signature.
    Check {
        /// Path to the asset file.
        file: PathBuf,

        /// Only run static validation; do not require a signature.
        #[arg(long)]
        unsigned: bool,
    },

    /// Validate, sign with the active profile's key, and write the sealed asset.
    Build {
        /// Path to the asset source file.
        file: PathBuf,

        /// Output path (defaults to `output_file` from config.toml).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Execute an asset's topology locally.
    Run {
        /// Path to the asset file.
        file: PathBuf,

        /// Input value as `name=value`. Values that parse as JSON are typed.
        #[arg(short, long = "input", value_name = "NAME=VALUE")]
        inputs: Vec<String>,

        /// Replace skill calls with placeholders and auto-acknowledge HITL nodes.
        #[arg(long)]
        sandbox: bool,

        /// Acknowledge HITL nodes without prompting.
        #[arg(short, long)]
        yes: bool,

        /// Override the node-visit budget from config.toml.
        #[arg(long)]
        max_steps: Option<u64>,
    },

    /// Manage the signing keypair of the active profile.
    Keys {
        #[command(subcommand)]
        action: keys::KeysCommand,
    },

    /// Inspect and edit local profiles.
    Config {
        #[command(subcommand)]
        action: config::ConfigCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
