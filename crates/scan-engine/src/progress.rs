//! 진행률 휴리스틱: nmap 출력 한 줄에서 0-100 진행률을 추정
//!
//! 상태를 갖지 않는 패턴 매칭입니다. 알려진 문구마다 단계별 하한값을 매기고,
//! 이전 진행률보다 큰 후보만 반환하므로 진행률은 절대 줄어들지 않습니다.
//!
//! 단계별 하한값은 [`PhaseProfile`] 데이터로 분리되어 있습니다.
//! 포괄 스캔은 서비스/OS/스크립트 단계가 추가로 있어 같은 문구라도 더 낮은 값을 받습니다.
//!
//! 이 값은 근사치입니다. nmap의 사람이 읽는 문구가 바뀌면 추정도 달라집니다.
//!
//! # 인식하는 입력
//!
//! - 텍스트: `Starting Nmap`, `scan initiated`, `Host is up`, `Nmap scan report for`,
//!   `PORT STATE SERVICE` 헤더, `Discovered open port`, `Initiating ...`,
//!   `... Timing: About N% done`, `Nmap done`
//! - XML: `<taskbegin task="..."/>`, `<taskprogress task="..." percent="..."/>`, `<finished .../>`

use scanwarden_core::types::ScanType;

/// 완료 값
pub const PROGRESS_DONE: u8 = 100;

/// 진행률 구간
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// 시작 값
    pub start: u8,
    /// 끝 값
    pub end: u8,
}

impl Band {
    /// 구간을 생성합니다.
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// 단계 내부 진행률(0-100)을 구간 값으로 변환합니다.
    pub fn scale(&self, percent: f32) -> u8 {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let span = f32::from(self.end.saturating_sub(self.start));
        let value = f32::from(self.start) + span * percent / 100.0;
        // 0..=end 범위로 제한된 값이므로 u8 변환은 손실이 없음
        value.floor().clamp(0.0, f32::from(self.end)) as u8
    }
}

/// 단계별 진행률 하한값
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseProfile {
    /// 스캔 시작
    pub initiated: u8,
    /// 호스트 응답 확인
    pub host_up: u8,
    /// 호스트 보고서 한 건당 증가량
    pub report_step: u8,
    /// 호스트 보고서 증가 상한
    pub report_cap: u8,
    /// 포트 표 헤더
    pub port_table: u8,
    /// 열린 포트 발견 한 건당 증가량
    pub discovered_step: u8,
    /// 열린 포트 발견 증가 상한
    pub discovered_cap: u8,
    /// 포트 스캔 단계
    pub port_scan: Band,
    /// 서비스 버전 탐지 단계
    pub service_scan: Band,
    /// OS 탐지 단계
    pub os_detection: Band,
    /// 스크립트 스캔 단계
    pub script_scan: Band,
}

impl PhaseProfile {
    /// 단일 단계 스캔 프로파일 (Quick, Stealth, Discovery, Custom)
    pub const fn plain() -> Self {
        Self {
            initiated: 10,
            host_up: 30,
            report_step: 20,
            report_cap: 80,
            port_table: 90,
            discovered_step: 5,
            discovered_cap: 95,
            port_scan: Band::new(10, 90),
            service_scan: Band::new(80, 90),
            os_detection: Band::new(85, 90),
            script_scan: Band::new(88, 95),
        }
    }

    /// 다단계 스캔 프로파일 (Comprehensive)
    pub const fn comprehensive() -> Self {
        Self {
            initiated: 5,
            host_up: 15,
            report_step: 10,
            report_cap: 90,
            port_table: 92,
            discovered_step: 2,
            discovered_cap: 60,
            port_scan: Band::new(5, 50),
            service_scan: Band::new(50, 70),
            os_detection: Band::new(70, 80),
            script_scan: Band::new(80, 95),
        }
    }

    /// 스캔 유형에 맞는 프로파일을 반환합니다.
    pub fn for_scan_type(scan_type: ScanType) -> Self {
        match scan_type {
            ScanType::Comprehensive => Self::comprehensive(),
            ScanType::Quick | ScanType::Stealth | ScanType::Discovery | ScanType::Custom => {
                Self::plain()
            }
        }
    }

    fn band_for_task(&self, task: &str) -> Band {
        let task = task.to_ascii_lowercase();
        if task.contains("service scan") {
            self.service_scan
        } else if task.contains("os detection") {
            self.os_detection
        } else if task.contains("nse") || task.contains("script") {
            self.script_scan
        } else {
            self.port_scan
        }
    }
}

impl Default for PhaseProfile {
    fn default() -> Self {
        Self::plain()
    }
}

/// 진행률 휴리스틱
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressHeuristic {
    profile: PhaseProfile,
}

impl ProgressHeuristic {
    /// 스캔 유형에 맞는 프로파일로 생성합니다.
    pub fn for_scan_type(scan_type: ScanType) -> Self {
        Self::with_profile(PhaseProfile::for_scan_type(scan_type))
    }

    /// 지정한 프로파일로 생성합니다.
    pub fn with_profile(profile: PhaseProfile) -> Self {
        Self { profile }
    }

    /// 사용 중인 프로파일
    pub fn profile(&self) -> &PhaseProfile {
        &self.profile
    }

    /// 출력 한 줄과 이전 진행률로 새 진행률을 추정합니다.
    ///
    /// 후보가 `previous` 이하이면 `None`을 반환합니다.
    pub fn estimate(&self, line: &str, previous: u8) -> Option<u8> {
        let candidate = self.candidate(line.trim(), previous)?;
        let candidate = candidate.min(PROGRESS_DONE);
        (candidate > previous).then_some(candidate)
    }

    fn candidate(&self, line: &str, previous: u8) -> Option<u8> {
        let p = &self.profile;

        if line.is_empty() {
            return None;
        }

        if line.starts_with('<') {
            return self.xml_candidate(line);
        }

        if line.contains("Nmap done") {
            return Some(PROGRESS_DONE);
        }

        if let Some((task, percent)) = parse_timing_line(line) {
            return Some(p.band_for_task(task).scale(percent));
        }

        if let Some(task) = line.strip_prefix("Initiating ") {
            return Some(p.band_for_task(task).start);
        }

        if line.starts_with("NSE: Script scanning") {
            return Some(p.script_scan.start);
        }

        if line.starts_with("Nmap scan report for") {
            return Some(previous.saturating_add(p.report_step).min(p.report_cap));
        }

        if line.contains("PORT") && line.contains("STATE") && line.contains("SERVICE") {
            return Some(p.port_table);
        }

        if line.contains("iscovered open port") {
            return Some(
                previous
                    .saturating_add(p.discovered_step)
                    .min(p.discovered_cap),
            );
        }

        if line.contains("Host is up") {
            return Some(p.host_up);
        }

        if line.starts_with("Starting Nmap") || line.contains("scan initiated") {
            return Some(p.initiated);
        }

        None
    }

    fn xml_candidate(&self, line: &str) -> Option<u8> {
        let p = &self.profile;

        if line.starts_with("<taskprogress") {
            let task = xml_attr(line, "task")?;
            let percent = xml_attr(line, "percent")?.parse::<f32>().ok()?;
            return Some(p.band_for_task(task).scale(percent));
        }

        if line.starts_with("<taskbegin") {
            let task = xml_attr(line, "task")?;
            return Some(p.band_for_task(task).start);
        }

        if line.starts_with("<finished") {
            return Some(PROGRESS_DONE);
        }

        None
    }
}

/// `SYN Stealth Scan Timing: About 45.50% done; ETC: 12:00` 형식을 파싱합니다.
fn parse_timing_line(line: &str) -> Option<(&str, f32)> {
    let (task, rest) = line.split_once(" Timing: About ")?;
    let (percent, _) = rest.split_once('%')?;
    let percent = percent.trim().parse::<f32>().ok()?;
    Some((task.trim(), percent))
}

/// 한 줄짜리 XML 요소에서 속성 값을 찾습니다.
fn xml_attr<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(" {name}=\"");
    let start = line.find(&needle)? + needle.len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}
