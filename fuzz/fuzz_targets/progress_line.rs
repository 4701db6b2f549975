#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use scanwarden_core::types::ScanType;
use scanwarden_engine::ProgressHeuristic;

#[derive(Arbitrary, Debug)]
enum FuzzScanType {
    Quick,
    Stealth,
    Comprehensive,
    Discovery,
    Custom,
}

impl From<FuzzScanType> for ScanType {
    fn from(t: FuzzScanType) -> Self {
        match t {
            FuzzScanType::Quick => ScanType::Quick,
            FuzzScanType::Stealth => ScanType::Stealth,
            FuzzScanType::Comprehensive => ScanType::Comprehensive,
            FuzzScanType::Discovery => ScanType::Discovery,
            FuzzScanType::Custom => ScanType::Custom,
        }
    }
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    scan_type: FuzzScanType,
    lines: Vec<String>,
}

fuzz_target!(|input: FuzzInput| {
    let heuristic = ProgressHeuristic::for_scan_type(input.scan_type.into());

    // 진행률은 단조 증가하며 100을 넘지 않는다
    let mut progress = 0u8;
    for line in input.lines.iter().take(256) {
        if let Some(next) = heuristic.estimate(line, progress) {
            assert!(next > progress, "{next} <= {progress} for {line:?}");
            assert!(next <= 100);
            progress = next;
        }
    }
});
