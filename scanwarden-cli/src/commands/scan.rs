//! `scanwarden scan` command handler
//!
//! Runs a single job through a [`ScanManager`], streams progress to stderr
//! and renders the final result. Ctrl-C stops the job and exits with 130.

use colored::Colorize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use scanwarden_core::config::{ScanDefaults, ScanwardenConfig};
use scanwarden_core::event::{ProgressLevel, ScanEvent, ScanEventKind};
use scanwarden_core::pipeline::Pipeline;
use scanwarden_core::types::{ScanConfig, ScanResult, ScanType};
use scanwarden_engine::{
    JobStatus, ScanEngineConfig, ScanEngineError, ScanManager, ScanRunner, normalize_targets,
    parse_targets,
};

use crate::cli::{ScanArgs, ScanOptions};
use crate::commands::report::ResultReport;
use crate::error::CliError;
use crate::output::OutputWriter;

/// How a scan job ended.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The scanner finished; the result may still carry an error status.
    Completed(ScanResult),
    /// The job was stopped before producing a result.
    Stopped {
        /// Stopped because the user pressed Ctrl-C.
        interrupted: bool,
    },
    /// The job failed before producing a result.
    Failed(String),
}

/// Execute the `scan` command.
pub async fn execute(
    args: ScanArgs,
    config: &ScanwardenConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let scan_config = build_scan_config(&args.options, &config.defaults)?;
    let engine_config = ScanEngineConfig::from_core(&config.engine);

    match run_scan(scan_config, engine_config, args.quiet).await? {
        ScanOutcome::Completed(result) => {
            writer.render(&ResultReport::from_result(&result))?;
            if !result.is_completed() {
                return Err(CliError::Scan(
                    result
                        .error
                        .unwrap_or_else(|| "scanner produced no result".to_owned()),
                ));
            }
            Ok(())
        }
        ScanOutcome::Stopped { interrupted: true } => Err(CliError::Interrupted),
        ScanOutcome::Stopped { interrupted: false } => {
            Err(CliError::Scan("scan was stopped".to_owned()))
        }
        ScanOutcome::Failed(reason) => Err(CliError::Scan(reason)),
    }
}

/// Merge command-line options over the configured scan defaults.
///
/// # Errors
///
/// Returns `CliError::Engine` with a config error if any target is unrecognized.
pub fn build_scan_config(
    options: &ScanOptions,
    defaults: &ScanDefaults,
) -> Result<ScanConfig, CliError> {
    let parsed = parse_targets(&options.targets.join(","));
    if !parsed.invalid.is_empty() {
        return Err(CliError::Engine(ScanEngineError::Config {
            field: "targets".to_owned(),
            reason: format!("unrecognized targets: {}", parsed.invalid.join(", ")),
        }));
    }

    let scan_type = match (options.scan_type, &options.custom) {
        (Some(scan_type), _) => scan_type.into(),
        (None, Some(_)) => ScanType::Custom,
        (None, None) => defaults.scan_type,
    };

    let mut config = ScanConfig::new(normalize_targets(&parsed.valid)).with_scan_type(scan_type);
    config.intensity = options
        .intensity
        .map(Into::into)
        .unwrap_or(defaults.intensity);
    config.port_range = Some(
        options
            .ports
            .clone()
            .unwrap_or_else(|| defaults.port_range.clone()),
    );
    config.timing_template = Some(
        options
            .timing
            .clone()
            .unwrap_or_else(|| defaults.timing_template.clone()),
    );
    config.threads = options.threads.unwrap_or(defaults.threads);
    config.service_version = options.service_version;
    config.os_detection = options.os_detection;
    config.script_scan = options.script_scan;
    config.custom_command = options.custom.clone();

    Ok(config)
}

/// Start an nmap-backed manager, run one job to its end and shut the manager down.
pub async fn run_scan(
    scan_config: ScanConfig,
    engine_config: ScanEngineConfig,
    quiet: bool,
) -> Result<ScanOutcome, CliError> {
    let (mut manager, mut events) = ScanManager::nmap(engine_config)?;
    manager.start().await?;

    let job_id = match manager.submit(scan_config) {
        Ok(id) => id,
        Err(e) => {
            if let Err(stop_err) = manager.stop().await {
                warn!(error = %stop_err, "failed to stop scan manager");
            }
            return Err(e.into());
        }
    };
    info!(job_id = %job_id, "scan submitted");

    let outcome = wait_for_job(&manager, &mut events, &job_id, quiet).await;
    manager.stop().await?;
    outcome
}

async fn wait_for_job<R: ScanRunner>(
    manager: &ScanManager<R>,
    events: &mut broadcast::Receiver<ScanEvent>,
    job_id: &str,
    quiet: bool,
) -> Result<ScanOutcome, CliError> {
    let mut interrupted = false;

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) if event.job_id == job_id => {
                    if !quiet {
                        if let Some(line) = progress_line(&event) {
                            eprintln!("{line}");
                        }
                    }
                    match event.kind {
                        ScanEventKind::Completed { result } => {
                            return Ok(ScanOutcome::Completed(*result));
                        }
                        ScanEventKind::Stopped => return Ok(ScanOutcome::Stopped { interrupted }),
                        ScanEventKind::Failed { error } => return Ok(ScanOutcome::Failed(error)),
                        _ => {}
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(job_id = %job_id, skipped, "scan events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return outcome_from_status(manager, job_id, interrupted);
                }
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal?;
                warn!(job_id = %job_id, "interrupt received, stopping scan");
                interrupted = true;
                manager.stop_job(job_id).await?;
            }
        }
    }
}

/// Recover the outcome from the job table when the event stream is gone.
fn outcome_from_status<R: ScanRunner>(
    manager: &ScanManager<R>,
    job_id: &str,
    interrupted: bool,
) -> Result<ScanOutcome, CliError> {
    let snapshot = manager.status(job_id)?;
    let outcome = match snapshot.status {
        JobStatus::Completed => match manager.result(job_id)? {
            Some(result) => ScanOutcome::Completed(result),
            None => ScanOutcome::Failed("completed job has no result".to_owned()),
        },
        JobStatus::Stopped => ScanOutcome::Stopped { interrupted },
        JobStatus::Error => ScanOutcome::Failed(snapshot.error.unwrap_or_default()),
        other => ScanOutcome::Failed(format!("event stream closed while job was {other}")),
    };
    Ok(outcome)
}

/// Human-readable stderr line for a job event.
pub fn progress_line(event: &ScanEvent) -> Option<String> {
    let line = match &event.kind {
        ScanEventKind::Queued => return None,
        ScanEventKind::Started { config } => {
            format!("{} scan {} started: {}", "▶".cyan(), event.job_id, config)
        }
        ScanEventKind::Progress {
            percent,
            status_text,
            level: ProgressLevel::Info,
        } => format!("[{:>3}%] {}", percent, status_text),
        ScanEventKind::Progress {
            status_text,
            level: ProgressLevel::Warning,
            ..
        } => format!("{} {}", "warning:".yellow(), status_text),
        ScanEventKind::Paused => format!("{} scan paused", "⏸".yellow()),
        ScanEventKind::Resumed => format!("{} scan resumed", "▶".cyan()),
        ScanEventKind::Completed { .. } => format!("[100%] {}", "scan completed".green()),
        ScanEventKind::Stopped => format!("{}", "scan stopped".yellow()),
        ScanEventKind::Failed { error } => format!("{} {}", "scan failed:".red(), error),
    };
    Some(line)
}
