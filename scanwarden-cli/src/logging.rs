//! Logging initialization for the scanwarden CLI.
//!
//! Configures `tracing-subscriber` based on the `[general]` section
//! of `ScanwardenConfig`. Logs are written to stderr so they never mix
//! with rendered results on stdout.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use scanwarden_core::config::GeneralConfig;

/// Build the level filter.
///
/// Precedence: `--log-level` flag, then `RUST_LOG`, then `[general].log_level`.
pub fn build_filter(level_override: Option<&str>, config: &GeneralConfig) -> Result<EnvFilter> {
    if let Some(level) = level_override {
        return EnvFilter::try_new(level)
            .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", level, e));
    }

    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", config.log_level, e)),
    }
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines
/// * `"pretty"` - Human-readable colored output
pub fn init_tracing(config: &GeneralConfig, level_override: Option<&str>) -> Result<()> {
    let env_filter = build_filter(level_override, config)?;

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_prefers_override() {
        let config = GeneralConfig::default();
        let filter = build_filter(Some("debug"), &config).expect("valid level");
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_build_filter_rejects_bad_override() {
        let config = GeneralConfig::default();
        assert!(build_filter(Some("scanwarden=[bad"), &config).is_err());
    }

    #[test]
    fn test_init_tracing_rejects_unknown_format() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        let err = init_tracing(&config, None).expect_err("unknown format should fail");
        assert!(err.to_string().contains("unknown log format"));
    }
}
