//! `scanwarden command` command handler

use std::io::Write;

use serde::Serialize;

use scanwarden_core::config::ScanwardenConfig;
use scanwarden_core::types::ScanType;
use scanwarden_engine::CommandBuilder;

use crate::cli::{CommandArgs, ScanOptions};
use crate::commands::scan::build_scan_config;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `command` command.
pub fn execute(
    args: CommandArgs,
    config: &ScanwardenConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report = build_command_report(&args.options, config)?;
    writer.render(&report)
}

/// Build the command line the `scan` command would run for the same options.
pub fn build_command_report(
    options: &ScanOptions,
    config: &ScanwardenConfig,
) -> Result<CommandReport, CliError> {
    let scan_config = build_scan_config(options, &config.defaults)?;
    let command = CommandBuilder::new(config.engine.nmap_path.clone()).build(&scan_config)?;

    Ok(CommandReport {
        scan_type: scan_config.scan_type,
        targets: scan_config.targets,
        command_line: command.to_string(),
        program: command.program,
        args: command.args,
    })
}

/// Scanner command preview.
#[derive(Debug, Serialize)]
pub struct CommandReport {
    pub scan_type: ScanType,
    pub targets: Vec<String>,
    pub program: String,
    pub args: Vec<String>,
    pub command_line: String,
}

impl Render for CommandReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", self.command_line)
    }
}
