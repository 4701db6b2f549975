//! 도메인 타입: 스캔 요청과 결과를 표현하는 공통 타입
//!
//! 스캔 엔진, CLI, 이벤트 구독자가 모두 이 타입들을 공유합니다.
//! [`ScanConfig`]는 호출자가 만드는 불변 입력이고,
//! [`ScanResult`]는 결과 파서가 작업당 한 번 생성하는 불변 출력입니다.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 기본 타이밍 템플릿
pub const DEFAULT_TIMING_TEMPLATE: &str = "T4";
/// 기본 병렬도 힌트
pub const DEFAULT_THREADS: u32 = 4;
/// 기본 포트 범위
pub const DEFAULT_PORT_RANGE: &str = "1-1000";

/// 스캔 유형
///
/// 명령줄 빌더가 유형별 기본 플래그를 결정할 때 사용합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// 빠른 스캔 (`-F`, 포트 범위 무시)
    #[default]
    Quick,
    /// SYN 스캔 (`-sS`)
    Stealth,
    /// SYN + 버전 + OS + 스크립트 번들
    Comprehensive,
    /// 호스트 탐색 전용 (`-sn`)
    Discovery,
    /// 사용자 지정 명령
    Custom,
}

impl ScanType {
    /// 문자열에서 스캔 유형을 파싱합니다. 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "quick" | "fast" => Some(Self::Quick),
            "stealth" | "syn" => Some(Self::Stealth),
            "comprehensive" | "full" => Some(Self::Comprehensive),
            "discovery" | "ping" => Some(Self::Discovery),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// 포트 범위와 탐지 플래그를 받아들이는 유형인지 반환합니다.
    ///
    /// Quick, Discovery는 포트 범위와 탐지 플래그를 모두 무시합니다.
    pub fn accepts_port_options(self) -> bool {
        !matches!(self, Self::Quick | Self::Discovery)
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quick => write!(f, "quick"),
            Self::Stealth => write!(f, "stealth"),
            Self::Comprehensive => write!(f, "comprehensive"),
            Self::Discovery => write!(f, "discovery"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// 스캔 강도
///
/// 엔진 동작에는 영향을 주지 않는 정보성 값입니다.
/// 표시 계층이 사용자 확인 여부를 결정할 때 참고합니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    /// 안전
    Safe,
    /// 일반
    #[default]
    Normal,
    /// 공격적
    Aggressive,
    /// 침투 테스트 수준
    Penetration,
}

impl Intensity {
    /// 문자열에서 강도를 파싱합니다. 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "safe" => Some(Self::Safe),
            "normal" => Some(Self::Normal),
            "aggressive" => Some(Self::Aggressive),
            "penetration" | "pentest" => Some(Self::Penetration),
            _ => None,
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Normal => write!(f, "normal"),
            Self::Aggressive => write!(f, "aggressive"),
            Self::Penetration => write!(f, "penetration"),
        }
    }
}

/// 스캔 요청 설정
///
/// 호출자가 생성하여 스캔 매니저에 넘기는 입력입니다.
/// `scan_id`는 매니저가 작업 ID로 덮어쓰므로 호출자가 채울 필요가 없습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 스캔 대상 (IP, CIDR, 범위, 호스트명)
    pub targets: Vec<String>,
    /// 스캔 유형
    pub scan_type: ScanType,
    /// 스캔 강도 (정보성)
    pub intensity: Intensity,
    /// 포트 범위 (Quick/Discovery에서는 무시)
    pub port_range: Option<String>,
    /// 타이밍 템플릿 토큰 (예: "T4")
    pub timing_template: Option<String>,
    /// 병렬도 힌트 (1 이하이면 플래그 생략)
    pub threads: u32,
    /// 서비스 버전 탐지 (`-sV`)
    pub service_version: bool,
    /// OS 탐지 (`-O`)
    pub os_detection: bool,
    /// 기본 스크립트 스캔 (`-sC`)
    pub script_scan: bool,
    /// 사용자 지정 명령 (Custom 유형에서만 의미가 있음)
    pub custom_command: Option<String>,
    /// 작업 ID (매니저가 할당)
    pub scan_id: Option<String>,
}

impl ScanConfig {
    /// 대상 목록으로 기본 설정을 생성합니다.
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// 스캔 유형을 지정합니다.
    pub fn with_scan_type(mut self, scan_type: ScanType) -> Self {
        self.scan_type = scan_type;
        self
    }

    /// 사용자 지정 명령을 지정하고 유형을 Custom으로 바꿉니다.
    pub fn with_custom_command(mut self, command: impl Into<String>) -> Self {
        self.scan_type = ScanType::Custom;
        self.custom_command = Some(command.into());
        self
    }

    /// 공백이 아닌 사용자 지정 명령을 반환합니다.
    pub fn effective_custom_command(&self) -> Option<&str> {
        self.custom_command
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            scan_type: ScanType::default(),
            intensity: Intensity::default(),
            port_range: Some(DEFAULT_PORT_RANGE.to_owned()),
            timing_template: Some(DEFAULT_TIMING_TEMPLATE.to_owned()),
            threads: DEFAULT_THREADS,
            service_version: false,
            os_detection: false,
            script_scan: false,
            custom_command: None,
            scan_id: None,
        }
    }
}

impl fmt::Display for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scan of {} target(s) [{}]",
            self.scan_type,
            self.targets.len(),
            self.intensity,
        )
    }
}

/// 스캔 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// 정상 파싱 완료
    Completed,
    /// 출력 없음 또는 파싱 실패
    Error,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// 호스트 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    /// 응답함
    Up,
    /// 응답 없음
    Down,
    /// 알 수 없음
    #[default]
    Unknown,
}

impl HostState {
    /// nmap `status@state` 값에서 변환합니다.
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "up" => Self::Up,
            "down" => Self::Down,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// 포트 상태
///
/// nmap이 보고하는 복합 상태(`open|filtered` 등)도 그대로 보존합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortState {
    /// 열림
    #[serde(rename = "open")]
    Open,
    /// 닫힘
    #[serde(rename = "closed")]
    Closed,
    /// 필터링됨
    #[serde(rename = "filtered")]
    Filtered,
    /// 열림 또는 필터링됨
    #[serde(rename = "open|filtered")]
    OpenFiltered,
    /// 닫힘 또는 필터링됨
    #[serde(rename = "closed|filtered")]
    ClosedFiltered,
    /// 필터링되지 않음 (ACK 스캔)
    #[serde(rename = "unfiltered")]
    Unfiltered,
    /// 알 수 없음
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl PortState {
    /// nmap `state@state` 값에서 변환합니다.
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "open" => Self::Open,
            "closed" => Self::Closed,
            "filtered" => Self::Filtered,
            "open|filtered" => Self::OpenFiltered,
            "closed|filtered" => Self::ClosedFiltered,
            "unfiltered" => Self::Unfiltered,
            _ => Self::Unknown,
        }
    }

    /// 필터링 계열 상태인지 반환합니다.
    pub fn is_filtered(self) -> bool {
        matches!(
            self,
            Self::Filtered | Self::OpenFiltered | Self::ClosedFiltered
        )
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Filtered => "filtered",
            Self::OpenFiltered => "open|filtered",
            Self::ClosedFiltered => "closed|filtered",
            Self::Unfiltered => "unfiltered",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// 포트 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// 포트 번호
    pub port: u16,
    /// 프로토콜 (tcp, udp, sctp)
    pub protocol: String,
    /// 포트 상태
    pub state: PortState,
    /// 서비스명 (없으면 "unknown")
    pub service: String,
    /// product + version + extrainfo (공백 결합, 없으면 빈 문자열)
    pub version: String,
    /// 상태 판정 사유 (syn-ack 등)
    pub reason: String,
    /// 포트별 스크립트 출력 (스크립트 ID -> 원본 출력)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, String>,
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} {}",
            self.port, self.protocol, self.state, self.service
        )?;
        if !self.version.is_empty() {
            write!(f, " ({})", self.version)?;
        }
        Ok(())
    }
}

/// 호스트 정보
///
/// `ip`는 항상 유효한 주소입니다. 주소가 없는 호스트는 파싱 단계에서 버려집니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// IP 주소 (IPv4 우선, 없으면 IPv6)
    pub ip: IpAddr,
    /// 첫 번째 호스트명
    pub hostname: Option<String>,
    /// 호스트 상태
    pub state: HostState,
    /// OS 계열 (가장 정확도가 높은 osmatch 이름)
    pub os_family: Option<String>,
    /// OS 상세 (vendor, family, 세대)
    pub os_details: Option<String>,
    /// 포트 목록 (XML 순서 유지)
    pub ports: Vec<PortInfo>,
    /// 스크립트 출력
    ///
    /// 호스트 스크립트는 ID 그대로, 포트 스크립트는 `{id}_port{port}` 키를 사용합니다.
    pub scripts: BTreeMap<String, String>,
}

impl HostInfo {
    /// 주소만 가진 빈 호스트를 생성합니다.
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            hostname: None,
            state: HostState::Unknown,
            os_family: None,
            os_details: None,
            ports: Vec::new(),
            scripts: BTreeMap::new(),
        }
    }

    /// 열린 포트 목록을 반환합니다.
    pub fn open_ports(&self) -> impl Iterator<Item = &PortInfo> {
        self.ports.iter().filter(|p| p.state == PortState::Open)
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip)?;
        if let Some(hostname) = &self.hostname {
            write!(f, " ({hostname})")?;
        }
        write!(f, " {} ports={}", self.state, self.ports.len())
    }
}

/// 스캔 결과
///
/// 결과 파서가 작업당 한 번 생성하며, 이후에는 읽기 전용입니다.
/// 파싱에 실패해도 원본 XML은 진단용으로 보존됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// 작업 ID
    pub scan_id: String,
    /// 호스트 목록
    pub hosts: Vec<HostInfo>,
    /// 결과 상태
    pub status: ResultStatus,
    /// 스캔 시작 시각 (`nmaprun@start`)
    pub start_time: Option<SystemTime>,
    /// 스캔 종료 시각 (`runstats/finished@time`)
    pub end_time: Option<SystemTime>,
    /// 원본 XML (또는 XML이 없을 때 관측된 원본 출력)
    pub raw_xml: String,
    /// 스캐너 버전
    pub scanner_version: Option<String>,
    /// 스캐너가 기록한 실행 인자
    pub scanner_args: Option<String>,
    /// 실패 사유 (status == Error 일 때)
    pub error: Option<String>,
}

impl ScanResult {
    /// 실패 결과를 생성합니다. 관측된 원본 텍스트를 보존합니다.
    pub fn failed(
        scan_id: impl Into<String>,
        raw: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            scan_id: scan_id.into(),
            hosts: Vec::new(),
            status: ResultStatus::Error,
            start_time: None,
            end_time: Some(now),
            raw_xml: raw.into(),
            scanner_version: None,
            scanner_args: None,
            error: Some(reason.into()),
        }
    }

    /// 시작 시각이 비어 있으면 `start`로 채웁니다.
    pub fn with_start_time_or(mut self, start: SystemTime) -> Self {
        self.start_time.get_or_insert(start);
        self
    }

    /// 정상 완료 여부
    pub fn is_completed(&self) -> bool {
        self.status == ResultStatus::Completed
    }

    /// 전체 호스트 수
    pub fn hosts_count(&self) -> usize {
        self.hosts.len()
    }

    /// 응답한 호스트 수
    pub fn hosts_up(&self) -> usize {
        self.hosts
            .iter()
            .filter(|h| h.state == HostState::Up)
            .count()
    }

    /// 전체 열린 포트 수
    pub fn open_ports_count(&self) -> usize {
        self.hosts.iter().map(|h| h.open_ports().count()).sum()
    }

    /// 지정한 서비스가 열려 있는 호스트를 반환합니다. 서비스명은 대소문자를 구분하지 않습니다.
    pub fn hosts_with_service<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a HostInfo> {
        self.hosts.iter().filter(move |h| {
            h.open_ports()
                .any(|p| p.service.eq_ignore_ascii_case(service))
        })
    }

    /// 지정한 포트가 열려 있는 호스트를 반환합니다.
    pub fn hosts_with_open_port(&self, port: u16) -> impl Iterator<Item = &HostInfo> {
        self.hosts
            .iter()
            .filter(move |h| h.open_ports().any(|p| p.port == port))
    }

    /// 결과 통계를 계산합니다.
    pub fn statistics(&self) -> ScanStatistics {
        let mut stats = ScanStatistics {
            total_hosts: self.hosts.len(),
            ..ScanStatistics::default()
        };

        for host in &self.hosts {
            match host.state {
                HostState::Up => stats.hosts_up += 1,
                HostState::Down => stats.hosts_down += 1,
                HostState::Unknown => {}
            }
            for port in &host.ports {
                match port.state {
                    PortState::Open => {
                        stats.open_ports += 1;
                        *stats.services.entry(port.service.clone()).or_default() += 1;
                    }
                    PortState::Closed => stats.closed_ports += 1,
                    state if state.is_filtered() => stats.filtered_ports += 1,
                    _ => {}
                }
            }
        }

        stats
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scan {} {}: hosts={} open_ports={}",
            self.scan_id,
            self.status,
            self.hosts.len(),
            self.open_ports_count(),
        )
    }
}

/// 스캔 결과 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    /// 전체 호스트 수
    pub total_hosts: usize,
    /// up 호스트 수
    pub hosts_up: usize,
    /// down 호스트 수
    pub hosts_down: usize,
    /// 열린 포트 수
    pub open_ports: usize,
    /// 닫힌 포트 수
    pub closed_ports: usize,
    /// 필터링 계열 포트 수
    pub filtered_ports: usize,
    /// 열린 포트의 서비스별 개수
    pub services: BTreeMap<String, usize>,
}

impl ScanStatistics {
    /// 가장 많이 관측된 서비스를 개수 내림차순으로 반환합니다.
    pub fn top_services(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut services: Vec<(&str, usize)> = self
            .services
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        services.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        services.truncate(limit);
        services
    }
}
