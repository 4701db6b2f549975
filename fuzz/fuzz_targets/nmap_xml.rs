#![no_main]

use libfuzzer_sys::fuzz_target;
use scanwarden_core::types::ResultStatus;
use scanwarden_engine::{NmapXmlParser, ResultParser};

fuzz_target!(|data: &[u8]| {
    let Ok(xml) = std::str::from_utf8(data) else {
        return;
    };

    let parser = NmapXmlParser::new();

    // 패닉 없이 항상 결과를 반환해야 한다
    let result = parser.parse("fuzz", xml);

    // 실패 결과에는 사유가 있고 원본이 보존된다
    if result.status == ResultStatus::Error {
        assert!(result.error.is_some());
        assert!(result.hosts.is_empty());
    }
});
