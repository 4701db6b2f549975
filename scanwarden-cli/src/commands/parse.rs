//! `scanwarden parse` command handler

use std::path::Path;

use tracing::info;

use scanwarden_core::config::ScanwardenConfig;
use scanwarden_core::types::ScanResult;
use scanwarden_engine::{NmapXmlParser, ResultParser};

use crate::cli::ParseArgs;
use crate::commands::report::ResultReport;
use crate::error::CliError;
use crate::output::OutputWriter;

/// Execute the `parse` command.
///
/// An unparsable document still renders (with its error) and then exits with code 4.
pub async fn execute(
    args: ParseArgs,
    config: &ScanwardenConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let result = load_result(
        &args.path,
        args.scan_id.as_deref(),
        config.engine.max_xml_bytes,
    )
    .await?;

    writer.render(&ResultReport::from_result(&result))?;

    if !result.is_completed() {
        return Err(CliError::Scan(
            result
                .error
                .unwrap_or_else(|| "report could not be parsed".to_owned()),
        ));
    }
    Ok(())
}

/// Read an nmap XML report from disk and parse it.
///
/// The scan ID defaults to the file stem.
///
/// # Errors
///
/// Returns `CliError::Io` if the file cannot be read. Parse failures are not
/// errors here; they come back as a result with an error status.
pub async fn load_result(
    path: &Path,
    scan_id: Option<&str>,
    max_bytes: usize,
) -> Result<ScanResult, CliError> {
    info!(path = %path.display(), "parsing nmap report");

    let xml = tokio::fs::read_to_string(path).await?;
    let scan_id = match scan_id {
        Some(id) => id.to_owned(),
        None => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_owned()),
    };

    let parser = NmapXmlParser::new().with_max_bytes(max_bytes);
    Ok(parser.parse(&scan_id, &xml))
}
