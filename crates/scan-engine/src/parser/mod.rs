//! 결과 파서: nmap XML 텍스트를 [`ScanResult`]로 변환
//!
//! [`ResultParser`] trait은 프로세스 컨트롤러가 캡처한 XML을 결과로 바꾸는 인터페이스입니다.
//! 파싱 실패는 호출자에게 에러로 전파하지 않고, 원본 텍스트를 담은
//! `error` 상태 결과로 반환합니다.
//!
//! # 변환 규칙
//!
//! - 루트 요소가 `nmaprun`이 아니면 실패 결과
//! - 호스트 주소: 첫 IPv4, 없으면 첫 IPv6. 둘 다 없으면 호스트를 버림
//! - 포트 번호가 잘못된 포트 항목은 건너뜀
//! - 버전: product + version + extrainfo 공백 결합
//! - OS: 정확도가 가장 높은 osmatch (동점이면 먼저 나온 것)
//! - 스크립트: 호스트 스크립트는 ID 그대로, 포트 스크립트는 `{id}_port{port}`

mod model;
pub mod script;

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{debug, warn};

use scanwarden_core::types::{
    HostInfo, HostState, PortInfo, PortState, ResultStatus, ScanResult,
};

use crate::error::ScanEngineError;

use self::model::{NmapRun, OsMatch, accuracy_of};
use self::script::{ScriptInterpreter, default_interpreters};

/// 루트 요소 이름
const ROOT_ELEMENT: &[u8] = b"nmaprun";

/// 서비스명이 없을 때의 기본값
const UNKNOWN_SERVICE: &str = "unknown";

/// 결과 파서 trait
///
/// 구현체는 어떤 입력에도 패닉하지 않고 항상 결과를 반환해야 합니다.
pub trait ResultParser: Send + Sync {
    /// XML 텍스트를 파싱하여 결과를 반환합니다.
    fn parse(&self, scan_id: &str, xml: &str) -> ScanResult;
}

/// nmap XML 파서
pub struct NmapXmlParser {
    interpreters: Vec<Box<dyn ScriptInterpreter>>,
    max_bytes: usize,
}

impl Default for NmapXmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl NmapXmlParser {
    /// 기본 스크립트 해석기와 크기 제한(64MB)으로 생성합니다.
    pub fn new() -> Self {
        Self {
            interpreters: default_interpreters(),
            max_bytes: 64 * 1024 * 1024,
        }
    }

    /// 입력 최대 크기를 지정합니다.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// 스크립트 해석기를 추가합니다.
    pub fn with_interpreter(mut self, interpreter: Box<dyn ScriptInterpreter>) -> Self {
        self.interpreters.push(interpreter);
        self
    }

    /// 스크립트 해석기를 모두 제거합니다.
    pub fn without_interpreters(mut self) -> Self {
        self.interpreters.clear();
        self
    }

    /// XML을 파싱합니다. 실패 시 에러를 반환합니다.
    pub fn try_parse(&self, scan_id: &str, xml: &str) -> Result<ScanResult, ScanEngineError> {
        if xml.trim().is_empty() {
            return Err(ScanEngineError::Parse("empty document".to_owned()));
        }

        if xml.len() > self.max_bytes {
            return Err(ScanEngineError::Parse(format!(
                "document too large: {} bytes (max: {})",
                xml.len(),
                self.max_bytes
            )));
        }

        check_root(xml)?;

        let run: NmapRun = quick_xml::de::from_str(xml)
            .map_err(|e| ScanEngineError::Parse(format!("invalid nmap xml: {e}")))?;

        let total = run.hosts.len();
        let hosts: Vec<HostInfo> = run
            .hosts
            .into_iter()
            .filter_map(|host| self.convert_host(host))
            .collect();

        if hosts.len() < total {
            debug!(
                scan_id,
                dropped = total - hosts.len(),
                "dropped hosts without an ip address"
            );
        }

        let end_time = run
            .runstats
            .and_then(|stats| stats.finished)
            .and_then(|finished| finished.time)
            .and_then(|t| unix_time(&t));

        Ok(ScanResult {
            scan_id: scan_id.to_owned(),
            hosts,
            status: ResultStatus::Completed,
            start_time: run.start.as_deref().and_then(unix_time),
            end_time: end_time.or_else(|| Some(SystemTime::now())),
            raw_xml: xml.to_owned(),
            scanner_version: run.version.filter(|v| !v.is_empty()),
            scanner_args: run.args.filter(|a| !a.is_empty()),
            error: None,
        })
    }

    fn convert_host(&self, host: model::Host) -> Option<HostInfo> {
        let ip = select_address(&host.addresses)?;
        let mut info = HostInfo::new(ip);

        info.state = host
            .status
            .and_then(|s| s.state)
            .map(|s| HostState::from_str_loose(&s))
            .unwrap_or_default();

        info.hostname = host
            .hostnames
            .and_then(|h| h.hostnames.into_iter().find_map(|n| n.name))
            .filter(|name| !name.is_empty());

        if let Some(ports) = host.ports {
            for port in ports.ports {
                if let Some(port_info) = convert_port(port, &mut info.scripts) {
                    info.ports.push(port_info);
                }
            }
        }

        if let Some(best) = host.os.as_ref().and_then(|os| best_os_match(&os.matches)) {
            info.os_family = best.name.clone().filter(|n| !n.is_empty());
            info.os_details = os_details(best);
        }

        if let Some(hostscript) = host.hostscript {
            for script in hostscript.scripts {
                if let (Some(id), Some(output)) = (script.id, script.output) {
                    if !id.is_empty() {
                        info.scripts.insert(id, output);
                    }
                }
            }
        }

        self.interpret_scripts(&mut info);
        Some(info)
    }

    fn interpret_scripts(&self, host: &mut HostInfo) {
        for interpreter in &self.interpreters {
            if let Some(output) = host.scripts.get(interpreter.script_id()).cloned() {
                interpreter.apply(&output, host);
            }
        }
    }
}

impl ResultParser for NmapXmlParser {
    fn parse(&self, scan_id: &str, xml: &str) -> ScanResult {
        match self.try_parse(scan_id, xml) {
            Ok(result) => {
                debug!(
                    scan_id,
                    hosts = result.hosts.len(),
                    "parsed scan result"
                );
                result
            }
            Err(e) => {
                warn!(scan_id, error = %e, "failed to parse scan output");
                metrics::counter!(scanwarden_core::metrics::SCAN_PARSE_ERRORS_TOTAL)
                    .increment(1);
                ScanResult::failed(scan_id, xml, e.to_string())
            }
        }
    }
}

/// 첫 번째 요소가 `nmaprun`인지 확인합니다.
fn check_root(xml: &str) -> Result<(), ScanEngineError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.local_name();
                if name.as_ref() == ROOT_ELEMENT {
                    return Ok(());
                }
                return Err(ScanEngineError::Parse(format!(
                    "unexpected root element '{}'",
                    String::from_utf8_lossy(name.as_ref())
                )));
            }
            Ok(Event::Eof) => {
                return Err(ScanEngineError::Parse("no root element".to_owned()));
            }
            Ok(_) => {}
            Err(e) => {
                return Err(ScanEngineError::Parse(format!(
                    "malformed xml at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }
}

fn select_address(addresses: &[model::Address]) -> Option<IpAddr> {
    let parsed = |kind: &str| {
        addresses
            .iter()
            .filter(|a| a.addr_type.as_deref().unwrap_or("ipv4") == kind)
            .filter_map(|a| a.addr.as_deref())
            .find_map(|addr| addr.trim().parse::<IpAddr>().ok())
    };
    parsed("ipv4")
        .filter(IpAddr::is_ipv4)
        .or_else(|| parsed("ipv6").filter(IpAddr::is_ipv6))
}

fn convert_port(port: model::Port, scripts: &mut BTreeMap<String, String>) -> Option<PortInfo> {
    let number = match port.portid.as_deref().map(str::trim).map(str::parse::<u16>) {
        Some(Ok(number)) => number,
        _ => {
            debug!(portid = ?port.portid, "skipping port with invalid number");
            return None;
        }
    };

    let (state, reason) = match port.state {
        Some(s) => (
            s.state
                .as_deref()
                .map(PortState::from_str_loose)
                .unwrap_or_default(),
            s.reason.unwrap_or_default(),
        ),
        None => (PortState::Unknown, String::new()),
    };

    let (service, version) = match port.service {
        Some(svc) => {
            let version = [svc.product, svc.version, svc.extra_info]
                .into_iter()
                .flatten()
                .map(|part| part.trim().to_owned())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            let name = svc
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN_SERVICE.to_owned());
            (name, version)
        }
        None => (UNKNOWN_SERVICE.to_owned(), String::new()),
    };

    let mut port_scripts = BTreeMap::new();
    for script in port.scripts {
        if let (Some(id), Some(output)) = (script.id, script.output) {
            if id.is_empty() {
                continue;
            }
            scripts.insert(format!("{id}_port{number}"), output.clone());
            port_scripts.insert(id, output);
        }
    }

    Some(PortInfo {
        port: number,
        protocol: port
            .protocol
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "tcp".to_owned()),
        state,
        service,
        version,
        reason,
        scripts: port_scripts,
    })
}

/// 정확도가 가장 높은 osmatch를 반환합니다. 동점이면 먼저 나온 항목을 유지합니다.
fn best_os_match(matches: &[OsMatch]) -> Option<&OsMatch> {
    let mut best: Option<(&OsMatch, u8)> = None;
    for candidate in matches {
        let accuracy = accuracy_of(candidate.accuracy.as_deref());
        match best {
            Some((_, current)) if accuracy <= current => {}
            _ => best = Some((candidate, accuracy)),
        }
    }
    best.map(|(m, _)| m)
}

/// 선택된 osmatch의 가장 정확한 osclass로 상세 문자열을 만듭니다.
fn os_details(os_match: &OsMatch) -> Option<String> {
    let mut best: Option<(&model::OsClass, u8)> = None;
    for class in &os_match.classes {
        let accuracy = accuracy_of(class.accuracy.as_deref());
        match best {
            Some((_, current)) if accuracy <= current => {}
            _ => best = Some((class, accuracy)),
        }
    }
    let (class, _) = best?;

    let mut parts: Vec<String> = Vec::new();
    if let Some(vendor) = class.vendor.as_deref().filter(|v| !v.is_empty()) {
        parts.push(vendor.to_owned());
    }
    if let Some(family) = class.os_family.as_deref().filter(|f| !f.is_empty()) {
        parts.push(family.to_owned());
    }
    if let Some(gen_) = class.os_gen.as_deref().filter(|g| !g.is_empty()) {
        parts.push(format!("Gen {gen_}"));
    }

    (!parts.is_empty()).then(|| parts.join(" "))
}

fn unix_time(value: &str) -> Option<SystemTime> {
    let secs = value.trim().parse::<u64>().ok()?;
    SystemTime::UNIX_EPOCH.checked_add(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> ScanResult {
        NmapXmlParser::new().parse("job-1", xml)
    }

    const OS_ACCURACY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun scanner="nmap" args="nmap -O -oX - 10.0.0.1" start="1700000000" version="7.94">
<host>
<status state="up" reason="echo-reply"/>
<address addr="10.0.0.1" addrtype="ipv4"/>
<ports>
<port protocol="tcp" portid="22"><state state="open" reason="syn-ack"/><service name="ssh" product="OpenSSH" version="8.9p1" extrainfo="Ubuntu Linux; protocol 2.0"/></port>
</ports>
<os>
<osmatch name="Linux 4.15 - 5.6" accuracy="60" line="1"><osclass type="general purpose" vendor="Linux" osfamily="Linux" osgen="4.X" accuracy="60"/></osmatch>
<osmatch name="Linux 5.0 - 5.4" accuracy="90" line="2"><osclass type="general purpose" vendor="Linux" osfamily="Linux" osgen="5.X" accuracy="90"/></osmatch>
</os>
</host>
<runstats><finished time="1700000010" timestr="x" elapsed="10.0" exit="success"/></runstats>
</nmaprun>
"#;

    #[test]
    fn selects_highest_accuracy_os_match() {
        let result = parse(OS_ACCURACY_XML);
        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.hosts.len(), 1);
        let host = &result.hosts[0];
        assert_eq!(host.os_family.as_deref(), Some("Linux 5.0 - 5.4"));
        assert_eq!(host.os_details.as_deref(), Some("Linux Linux Gen 5.X"));
        assert_eq!(host.state, HostState::Up);
        assert_eq!(host.ports.len(), 1);
        assert_eq!(
            host.ports[0].version,
            "OpenSSH 8.9p1 Ubuntu Linux; protocol 2.0"
        );
        assert_eq!(host.ports[0].reason, "syn-ack");
    }

    #[test]
    fn extracts_run_metadata() {
        let result = parse(OS_ACCURACY_XML);
        assert_eq!(result.scanner_version.as_deref(), Some("7.94"));
        assert_eq!(
            result.scanner_args.as_deref(),
            Some("nmap -O -oX - 10.0.0.1")
        );
        assert_eq!(
            result.start_time,
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        );
        assert_eq!(
            result.end_time,
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_010))
        );
        assert_eq!(result.raw_xml, OS_ACCURACY_XML);
    }

    #[test]
    fn os_accuracy_tie_keeps_first() {
        let xml = r#"<nmaprun><host><address addr="10.0.0.1" addrtype="ipv4"/>
<os><osmatch name="First" accuracy="95"/><osmatch name="Second" accuracy="95"/></os>
</host></nmaprun>"#;
        let result = parse(xml);
        assert_eq!(result.hosts[0].os_family.as_deref(), Some("First"));
        assert!(result.hosts[0].os_details.is_none());
    }

    #[test]
    fn drops_host_without_address() {
        let xml = r#"<nmaprun>
<host><status state="up"/><address addr="10.0.0.1" addrtype="ipv4"/></host>
<host><status state="up"/><hostnames><hostname name="ghost"/></hostnames></host>
</nmaprun>"#;
        let result = parse(xml);
        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.hosts.len(), 1);
        assert_eq!(result.hosts[0].ip.to_string(), "10.0.0.1");
    }

    #[test]
    fn address_without_addr_attribute_drops_only_that_host() {
        let xml = r#"<nmaprun>
<host><status state="up"/><address addr="10.0.0.1" addrtype="ipv4"/></host>
<host><status state="up"/><address addrtype="mac"/></host>
<host><status state="up"/><address addrtype="ipv4"/><address addr="10.0.0.3" addrtype="ipv4"/></host>
</nmaprun>"#;
        let result = parse(xml);
        assert_eq!(result.status, ResultStatus::Completed);
        assert!(result.error.is_none());
        let ips: Vec<String> = result.hosts.iter().map(|h| h.ip.to_string()).collect();
        assert_eq!(ips, vec!["10.0.0.1", "10.0.0.3"]);
    }

    #[test]
    fn prefers_ipv4_then_ipv6() {
        let xml = r#"<nmaprun>
<host><address addr="00:11:22:33:44:55" addrtype="mac"/><address addr="fe80::1" addrtype="ipv6"/><address addr="10.0.0.9" addrtype="ipv4"/></host>
<host><address addr="00:11:22:33:44:56" addrtype="mac"/><address addr="fe80::2" addrtype="ipv6"/></host>
<host><address addr="00:11:22:33:44:57" addrtype="mac"/></host>
</nmaprun>"#;
        let result = parse(xml);
        let ips: Vec<String> = result.hosts.iter().map(|h| h.ip.to_string()).collect();
        assert_eq!(ips, vec!["10.0.0.9", "fe80::2"]);
    }

    #[test]
    fn skips_malformed_ports_and_defaults_missing_fields() {
        let xml = r#"<nmaprun><host><address addr="10.0.0.1" addrtype="ipv4"/>
<ports>
<port protocol="tcp" portid="abc"><state state="open"/></port>
<port protocol="tcp" portid="70000"><state state="open"/></port>
<port portid="8080"/>
<port protocol="udp" portid="53"><state state="open|filtered" reason="no-response"/></port>
</ports></host></nmaprun>"#;
        let result = parse(xml);
        let ports = &result.hosts[0].ports;
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].port, 8080);
        assert_eq!(ports[0].protocol, "tcp");
        assert_eq!(ports[0].state, PortState::Unknown);
        assert_eq!(ports[0].service, "unknown");
        assert_eq!(ports[0].version, "");
        assert_eq!(ports[1].state, PortState::OpenFiltered);
        assert_eq!(ports[1].protocol, "udp");
    }

    #[test]
    fn port_and_host_scripts_do_not_collide() {
        let xml = r#"<nmaprun><host><address addr="10.0.0.1" addrtype="ipv4"/>
<ports><port protocol="tcp" portid="443"><state state="open"/><service name="https"/>
<script id="ssl-cert" output="Subject: commonName=example.org"><elem key="x">y</elem></script>
</port></ports>
<hostscript><script id="ssl-cert" output="host level"/></hostscript>
</host></nmaprun>"#;
        let result = parse(xml);
        let host = &result.hosts[0];
        assert_eq!(host.scripts.get("ssl-cert").map(String::as_str), Some("host level"));
        assert_eq!(
            host.scripts.get("ssl-cert_port443").map(String::as_str),
            Some("Subject: commonName=example.org")
        );
        assert_eq!(
            host.ports[0].scripts.get("ssl-cert").map(String::as_str),
            Some("Subject: commonName=example.org")
        );
    }

    #[test]
    fn script_interpreters_backfill_hostname() {
        let xml = r#"<nmaprun><host><address addr="10.0.0.5" addrtype="ipv4"/>
<hostscript><script id="nbstat" output="NetBIOS name: NAS01, NetBIOS user: &lt;unknown&gt;"/></hostscript>
</host></nmaprun>"#;
        let result = parse(xml);
        assert_eq!(result.hosts[0].hostname.as_deref(), Some("NAS01"));

        let plain = NmapXmlParser::new().without_interpreters().parse("job-1", xml);
        assert!(plain.hosts[0].hostname.is_none());
    }

    #[test]
    fn empty_input_yields_error_result() {
        let result = parse("   \n");
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.error.is_some());
        assert_eq!(result.raw_xml, "   \n");
    }

    #[test]
    fn wrong_root_yields_error_result() {
        let xml = "<?xml version=\"1.0\"?><html><body/></html>";
        let result = parse(xml);
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.error.as_deref().unwrap_or_default().contains("html"));
        assert_eq!(result.raw_xml, xml);
    }

    #[test]
    fn malformed_xml_yields_error_result() {
        let result = parse("<nmaprun><host><address addr=\"10.0.0.1\"");
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.hosts.is_empty());
    }

    #[test]
    fn oversized_input_rejected() {
        let parser = NmapXmlParser::new().with_max_bytes(16);
        let result = parser.parse("job-1", OS_ACCURACY_XML);
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.error.as_deref().unwrap_or_default().contains("too large"));
    }

    #[test]
    fn empty_nmaprun_has_no_hosts() {
        let result = parse("<nmaprun scanner=\"nmap\"></nmaprun>");
        assert_eq!(result.status, ResultStatus::Completed);
        assert!(result.hosts.is_empty());
    }
}
