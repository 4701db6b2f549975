//! `scanwarden config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use scanwarden_core::config::ScanwardenConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Section names accepted by `config show --section`.
const SECTIONS: &[&str] = &["general", "engine", "defaults", "metrics"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the configuration file, reporting any errors.
///
/// Unlike the other commands, a missing file is an error here.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (missing file, parse errors, invalid values).
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = validation_report(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Build the validation report for a configuration file.
pub async fn validation_report(config_path: &Path) -> ConfigValidationReport {
    let errors = match ScanwardenConfig::load(config_path).await {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    };

    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
    }
}

/// Show the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Config` if loading fails or `CliError::Command` if the section name is invalid.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = ScanwardenConfig::load_or_default(config_path)
        .await
        .map_err(|e| CliError::Config(e.to_string()))?;

    let report = config_report(&config, config_path, section.as_deref())?;
    writer.render(&report)?;

    Ok(())
}

/// Render the whole configuration or one section of it.
pub fn config_report(
    config: &ScanwardenConfig,
    config_path: &Path,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let (config_toml, value) = match section {
        None => serialize_section(config)?,
        Some("general") => serialize_section(&config.general)?,
        Some("engine") => serialize_section(&config.engine)?,
        Some("defaults") => serialize_section(&config.defaults)?,
        Some("metrics") => serialize_section(&config.metrics)?,
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config: value,
        config_toml,
    })
}

fn serialize_section<T: Serialize>(
    section: &T,
) -> Result<(String, serde_json::Value), CliError> {
    let config_toml = toml::to_string_pretty(section)
        .map_err(|e| CliError::Command(format!("failed to serialize configuration: {}", e)))?;
    let value = serde_json::to_value(section)?;
    Ok((config_toml, value))
}

/// Configuration display report.
///
/// JSON output carries the structured `config` value; text output prints the TOML form.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Effective configuration
    pub config: serde_json::Value,
    /// Serialized TOML configuration
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(payload: &dyn Render) -> String {
        let mut buffer = Vec::new();
        payload.render_text(&mut buffer).expect("render should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn test_config_report_full_config() {
        let report = config_report(
            &ScanwardenConfig::default(),
            Path::new("scanwarden.toml"),
            None,
        )
        .expect("report");
        let output = render(&report);
        assert!(output.contains("scanwarden.toml"));
        assert!(output.contains("[engine]"));
        assert!(output.contains("nmap_path"));
        assert!(report.section.is_none());
    }

    #[test]
    fn test_config_report_single_section() {
        let report = config_report(
            &ScanwardenConfig::default(),
            Path::new("scanwarden.toml"),
            Some("defaults"),
        )
        .expect("report");
        assert!(report.config_toml.contains("timing_template"));
        assert!(!report.config_toml.contains("nmap_path"));
        assert_eq!(report.config["threads"], 4);
    }

    #[test]
    fn test_config_report_unknown_section() {
        let err = config_report(
            &ScanwardenConfig::default(),
            Path::new("scanwarden.toml"),
            Some("ebpf"),
        )
        .err()
        .expect("unknown section should fail");
        assert!(err.to_string().contains("unknown section: ebpf"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_config_report_json_skips_toml_text() {
        let report = config_report(
            &ScanwardenConfig::default(),
            Path::new("scanwarden.toml"),
            Some("metrics"),
        )
        .expect("report");
        let json = serde_json::to_value(&report).expect("serialize");
        assert!(json.get("config_toml").is_none());
        assert_eq!(json["section"], "metrics");
        assert_eq!(json["config"]["endpoint"], "/metrics");
    }

    #[test]
    fn test_validation_report_render_invalid() {
        let report = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            errors: vec!["invalid config value for 'engine.nmap_path'".to_owned()],
        };
        let output = render(&report);
        assert!(output.contains("INVALID"));
        assert!(output.contains("engine.nmap_path"));
    }

    #[test]
    fn test_validation_report_render_valid() {
        let report = ConfigValidationReport {
            source: "ok.toml".to_owned(),
            valid: true,
            errors: Vec::new(),
        };
        let output = render(&report);
        assert!(output.contains("VALID"));
        assert!(!output.contains("Error:"));
    }
}
