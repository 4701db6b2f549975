//! Scan result report shared by `scan` and `parse`

use std::io::Write;

use serde::Serialize;

use scanwarden_core::types::{HostInfo, ResultStatus, ScanResult, ScanStatistics};

use crate::output::Render;

/// Number of services listed in the text summary.
const TOP_SERVICES: usize = 5;

/// Rendered view of a [`ScanResult`].
///
/// The raw XML is left out; it can be large and is only useful for diagnostics.
#[derive(Debug, Serialize)]
pub struct ResultReport {
    pub scan_id: String,
    pub status: ResultStatus,
    pub scanner_version: Option<String>,
    pub scanner_args: Option<String>,
    pub error: Option<String>,
    pub duration_secs: Option<u64>,
    pub statistics: ScanStatistics,
    pub hosts: Vec<HostInfo>,
}

impl ResultReport {
    pub fn from_result(result: &ScanResult) -> Self {
        let duration_secs = match (result.start_time, result.end_time) {
            (Some(start), Some(end)) => end.duration_since(start).ok().map(|d| d.as_secs()),
            _ => None,
        };

        Self {
            scan_id: result.scan_id.clone(),
            status: result.status,
            scanner_version: result.scanner_version.clone(),
            scanner_args: result.scanner_args.clone(),
            error: result.error.clone(),
            duration_secs,
            statistics: result.statistics(),
            hosts: result.hosts.clone(),
        }
    }
}

impl Render for ResultReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let status = match self.status {
            ResultStatus::Completed => "completed".green().bold(),
            ResultStatus::Error => "error".red().bold(),
        };
        writeln!(w, "Scan {}: {}", self.scan_id.bold(), status)?;

        if let Some(ref reason) = self.error {
            writeln!(w, "  Error: {}", reason.red())?;
        }
        if let Some(ref version) = self.scanner_version {
            writeln!(w, "  Scanner: nmap {}", version)?;
        }
        if let Some(ref args) = self.scanner_args {
            writeln!(w, "  Command: {}", args)?;
        }
        if let Some(secs) = self.duration_secs {
            writeln!(w, "  Duration: {}s", secs)?;
        }

        let stats = &self.statistics;
        writeln!(
            w,
            "  Hosts: {} total, {} up, {} down",
            stats.total_hosts, stats.hosts_up, stats.hosts_down
        )?;
        writeln!(
            w,
            "  Ports: {} open, {} closed, {} filtered",
            stats.open_ports, stats.closed_ports, stats.filtered_ports
        )?;

        for host in &self.hosts {
            writeln!(w)?;
            render_host(w, host)?;
        }

        let top = stats.top_services(TOP_SERVICES);
        if !top.is_empty() {
            let listed: Vec<String> = top
                .iter()
                .map(|(name, count)| format!("{name} ({count})"))
                .collect();
            writeln!(w)?;
            writeln!(w, "Top services: {}", listed.join(", "))?;
        }

        Ok(())
    }
}

fn render_host(w: &mut dyn Write, host: &HostInfo) -> std::io::Result<()> {
    use colored::Colorize;

    let name = match host.hostname {
        Some(ref hostname) => format!("{} ({})", host.ip, hostname),
        None => host.ip.to_string(),
    };
    writeln!(w, "{} {}", name.bold(), host.state)?;

    if let Some(ref os) = host.os_family {
        match host.os_details {
            Some(ref details) => writeln!(w, "  OS: {} [{}]", os, details)?,
            None => writeln!(w, "  OS: {}", os)?,
        }
    }

    if host.ports.is_empty() {
        return Ok(());
    }

    writeln!(
        w,
        "  {:<10} {:<16} {:<14} {}",
        "PORT", "STATE", "SERVICE", "VERSION"
    )?;
    for port in &host.ports {
        let endpoint = format!("{}/{}", port.port, port.protocol);
        writeln!(
            w,
            "  {:<10} {:<16} {:<14} {}",
            endpoint,
            port.state.to_string(),
            port.service,
            port.version
        )?;
    }

    Ok(())
}
