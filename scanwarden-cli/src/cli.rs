//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use scanwarden_core::types::{Intensity, ScanType};

/// Scanwarden -- nmap scan orchestration.
///
/// Use `scanwarden <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "scanwarden", version, about, long_about = None)]
pub struct Cli {
    /// Path to the scanwarden.toml configuration file.
    #[arg(short, long, default_value = "scanwarden.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scan and wait for its result.
    Scan(ScanArgs),

    /// Print the scanner command line without running it.
    Command(CommandArgs),

    /// Parse a saved nmap XML report.
    Parse(ParseArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- shared scan options ----

/// Scan request options shared by `scan` and `command`.
///
/// Unset options fall back to the `[defaults]` section of the configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ScanOptions {
    /// Targets: addresses, CIDR networks, ranges or hostnames.
    /// Comma-separated lists are accepted as well.
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,

    /// Scan type.
    #[arg(long = "type", value_enum)]
    pub scan_type: Option<ScanTypeArg>,

    /// Scan intensity (informational).
    #[arg(long, value_enum)]
    pub intensity: Option<IntensityArg>,

    /// Port range, e.g. `22,80,443` or `1-1024`.
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Timing template token (T0-T5).
    #[arg(long)]
    pub timing: Option<String>,

    /// Parallelism hint.
    #[arg(long)]
    pub threads: Option<u32>,

    /// Enable service version detection (`-sV`).
    #[arg(long)]
    pub service_version: bool,

    /// Enable OS detection (`-O`).
    #[arg(long)]
    pub os_detection: bool,

    /// Enable default script scanning (`-sC`).
    #[arg(long)]
    pub script_scan: bool,

    /// Custom command line; implies `--type custom`.
    #[arg(long)]
    pub custom: Option<String>,
}

/// Scan types accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanTypeArg {
    Quick,
    Stealth,
    Comprehensive,
    Discovery,
    Custom,
}

impl From<ScanTypeArg> for ScanType {
    fn from(arg: ScanTypeArg) -> Self {
        match arg {
            ScanTypeArg::Quick => Self::Quick,
            ScanTypeArg::Stealth => Self::Stealth,
            ScanTypeArg::Comprehensive => Self::Comprehensive,
            ScanTypeArg::Discovery => Self::Discovery,
            ScanTypeArg::Custom => Self::Custom,
        }
    }
}

/// Intensities accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IntensityArg {
    Safe,
    Normal,
    Aggressive,
    Penetration,
}

impl From<IntensityArg> for Intensity {
    fn from(arg: IntensityArg) -> Self {
        match arg {
            IntensityArg::Safe => Self::Safe,
            IntensityArg::Normal => Self::Normal,
            IntensityArg::Aggressive => Self::Aggressive,
            IntensityArg::Penetration => Self::Penetration,
        }
    }
}

// ---- scan ----

/// Run one scan job and render its result.
#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub options: ScanOptions,

    /// Do not print progress lines to stderr.
    #[arg(short, long)]
    pub quiet: bool,
}

// ---- command ----

/// Preview the command line a scan would run.
#[derive(Args, Debug)]
pub struct CommandArgs {
    #[command(flatten)]
    pub options: ScanOptions,
}

// ---- parse ----

/// Parse an nmap XML report from disk.
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Path to the XML file.
    pub path: PathBuf,

    /// Scan ID to record in the result (default: file stem).
    #[arg(long)]
    pub scan_id: Option<String>,
}

// ---- config ----

/// Manage scanwarden configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, engine, defaults, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}
