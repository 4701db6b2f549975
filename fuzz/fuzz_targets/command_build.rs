#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use scanwarden_core::types::{ScanConfig, ScanType};
use scanwarden_engine::CommandBuilder;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    targets: Vec<String>,
    scan_type: u8,
    port_range: Option<String>,
    timing_template: Option<String>,
    threads: u32,
    service_version: bool,
    os_detection: bool,
    script_scan: bool,
}

fuzz_target!(|input: FuzzInput| {
    let scan_type = match input.scan_type % 4 {
        0 => ScanType::Quick,
        1 => ScanType::Stealth,
        2 => ScanType::Comprehensive,
        _ => ScanType::Discovery,
    };

    let mut config = ScanConfig::new(input.targets.iter().take(64).cloned()).with_scan_type(scan_type);
    config.port_range = input.port_range;
    config.timing_template = input.timing_template;
    config.threads = input.threads;
    config.service_version = input.service_version;
    config.os_detection = input.os_detection;
    config.script_scan = input.script_scan;

    // 성공한 명령에는 옵션처럼 보이는 대상이 없고 XML 출력이 항상 포함된다
    if let Ok(command) = CommandBuilder::default().build(&config) {
        assert!(command.has_xml_output());
        for target in &config.targets {
            assert!(!target.trim().starts_with('-'));
        }
    }
});
