//! Integration tests for the `scan`, `parse` and `config` command handlers.
//!
//! Scan tests replace nmap with a shell script that replays a saved report.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use scanwarden_cli::commands::{config, parse};
use scanwarden_core::types::ResultStatus;

fn engine_fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../crates/scan-engine/tests/fixtures")
        .join(name)
}

#[tokio::test]
async fn test_parse_fixture_uses_file_stem_as_scan_id() {
    let result = parse::load_result(&engine_fixture("comprehensive_two_ports.xml"), None, 1 << 20)
        .await
        .expect("fixture should be readable");

    assert_eq!(result.scan_id, "comprehensive_two_ports");
    assert_eq!(result.status, ResultStatus::Completed);
    assert_eq!(result.open_ports_count(), 2);
    assert_eq!(result.scanner_version.as_deref(), Some("7.94"));
}

#[tokio::test]
async fn test_parse_with_explicit_scan_id() {
    let result = parse::load_result(&engine_fixture("os_accuracy.xml"), Some("lab-7"), 1 << 20)
        .await
        .expect("fixture should be readable");
    assert_eq!(result.scan_id, "lab-7");
}

#[tokio::test]
async fn test_parse_truncated_report_is_error_result() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("partial.xml");
    fs::write(&path, "<?xml version=\"1.0\"?><nmaprun><host><status state=\"up\"/>")
        .expect("should write partial report");

    let result = parse::load_result(&path, None, 1 << 20)
        .await
        .expect("read succeeds even if parsing fails");
    assert_eq!(result.status, ResultStatus::Error);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_parse_missing_file_is_io_error() {
    let err = parse::load_result(&PathBuf::from("/nonexistent/report.xml"), None, 1 << 20)
        .await
        .expect_err("missing file should fail");
    assert_eq!(err.exit_code(), 10);
}

#[tokio::test]
async fn test_config_validate_valid_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("scanwarden.toml");
    fs::write(
        &config_path,
        r#"
[general]
log_level = "debug"
log_format = "json"

[engine]
nmap_path = "/usr/bin/nmap"
stop_timeout_secs = 3

[defaults]
scan_type = "stealth"
threads = 8
"#,
    )
    .expect("should write config");

    let report = config::validation_report(&config_path).await;
    assert!(report.valid, "errors: {:?}", report.errors);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[engine\nnmap_path = \"nmap\"\n").expect("should write config");

    let report = config::validation_report(&config_path).await;
    assert!(!report.valid, "malformed TOML should be invalid");
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn test_config_validate_invalid_value() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("threads.toml");
    fs::write(&config_path, "[defaults]\nthreads = 1000\n").expect("should write config");

    let report = config::validation_report(&config_path).await;
    assert!(!report.valid, "threads above the limit should be rejected");
    assert!(report.errors[0].contains("threads"));
}

#[tokio::test]
async fn test_config_validate_missing_file() {
    let report = config::validation_report(&PathBuf::from("/nonexistent/scanwarden.toml")).await;
    assert!(!report.valid, "missing file should be invalid for validate");
}

#[cfg(unix)]
mod scan {
    use std::os::unix::fs::PermissionsExt;

    use super::*;
    use scanwarden_cli::cli::ScanOptions;
    use scanwarden_cli::commands::scan::{ScanOutcome, build_scan_config, run_scan};
    use scanwarden_core::config::ScanDefaults;
    use scanwarden_engine::{ScanEngineConfig, ScanEngineConfigBuilder};

    fn fake_nmap(dir: &TempDir, body: &str) -> String {
        let path = dir.path().join("nmap");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut permissions = fs::metadata(&path).expect("metadata").permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).expect("chmod");
        path.to_string_lossy().into_owned()
    }

    fn engine_config(nmap_path: String) -> ScanEngineConfig {
        ScanEngineConfigBuilder::new()
            .nmap_path(nmap_path)
            .stop_timeout_secs(1)
            .exit_grace_secs(1)
            .drain_timeout_secs(1)
            .build()
            .expect("valid engine config")
    }

    fn options(targets: &[&str]) -> ScanOptions {
        ScanOptions {
            targets: targets.iter().map(|t| (*t).to_owned()).collect(),
            ..ScanOptions::default()
        }
    }

    #[tokio::test]
    async fn test_run_scan_completes_with_replayed_report() {
        let dir = TempDir::new().expect("temp dir");
        let body = format!(
            "echo 'Starting Nmap 7.94'\ncat '{}'\nexit 0",
            engine_fixture("comprehensive_two_ports.xml").display()
        );
        let scan_config = build_scan_config(&options(&["10.0.0.1"]), &ScanDefaults::default())
            .expect("valid request");

        let outcome = run_scan(scan_config, engine_config(fake_nmap(&dir, &body)), true)
            .await
            .expect("scan should run");

        match outcome {
            ScanOutcome::Completed(result) => {
                assert_eq!(result.status, ResultStatus::Completed);
                assert_eq!(result.open_ports_count(), 2);
                assert_eq!(result.hosts[0].hostname.as_deref(), Some("gateway.lab"));
            }
            other => panic!("expected completed outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_scan_without_xml_yields_error_result() {
        let dir = TempDir::new().expect("temp dir");
        let nmap = fake_nmap(&dir, "echo 'Failed to resolve \"nowhere.invalid\".' >&2\nexit 1");
        let scan_config = build_scan_config(&options(&["nowhere.invalid"]), &ScanDefaults::default())
            .expect("valid request");

        let outcome = run_scan(scan_config, engine_config(nmap), true)
            .await
            .expect("scan should run");

        match outcome {
            ScanOutcome::Completed(result) => {
                assert_eq!(result.status, ResultStatus::Error);
                assert!(result.hosts.is_empty());
            }
            other => panic!("expected completed outcome with error result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_scan_rejects_invalid_request_before_spawning() {
        let dir = TempDir::new().expect("temp dir");
        let mut opts = options(&["10.0.0.1"]);
        opts.scan_type = Some(scanwarden_cli::cli::ScanTypeArg::Stealth);
        opts.ports = Some("0-99999".to_owned());
        let scan_config =
            build_scan_config(&opts, &ScanDefaults::default()).expect("targets are valid");

        let err = run_scan(scan_config, engine_config(fake_nmap(&dir, "exit 0")), true)
            .await
            .expect_err("bad port range should be rejected on submit");
        assert_eq!(err.exit_code(), 2);
    }
}
