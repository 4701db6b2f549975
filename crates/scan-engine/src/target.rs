//! 스캔 대상 분류
//!
//! 명령줄 빌더는 대상 문자열을 검증하지 않고 그대로 전달합니다.
//! 이 모듈은 사용자 입력을 제출 전에 걸러내는 보조 함수를 제공합니다.
//!
//! 지원 형식:
//! - 단일 주소: `192.168.1.1`, `fe80::1`
//! - CIDR: `192.168.1.0/24` (호스트 비트 허용)
//! - 주소 범위: `192.168.1.1-20`, `192.168.1.1-192.168.1.20`
//! - 호스트명: `scanme.nmap.org`

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;

/// 호스트명 최대 길이
const MAX_HOSTNAME_LEN: usize = 253;

/// 호스트명 label 최대 길이
const MAX_LABEL_LEN: usize = 63;

/// 분류된 대상
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// 단일 주소
    Address(IpAddr),
    /// CIDR 네트워크
    Network(IpNet),
    /// 같은 주소 체계의 연속 범위 (양 끝 포함)
    Range {
        /// 시작 주소
        start: IpAddr,
        /// 끝 주소
        end: IpAddr,
    },
    /// 호스트명
    Hostname(String),
}

impl Target {
    /// 대상 종류 이름
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Network(_) => "network",
            Self::Range { .. } => "range",
            Self::Hostname(_) => "hostname",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(ip) => write!(f, "{ip}"),
            Self::Network(net) => write!(f, "{net}"),
            Self::Range { start, end } => write!(f, "{start}-{end}"),
            Self::Hostname(name) => f.write_str(name),
        }
    }
}

/// 대상 문자열 하나를 분류합니다. 인식할 수 없으면 `None`.
pub fn classify_target(raw: &str) -> Option<Target> {
    let token = raw.trim();
    if token.is_empty() {
        return None;
    }

    if let Ok(ip) = token.parse::<IpAddr>() {
        return Some(Target::Address(ip));
    }
    if let Ok(net) = token.parse::<IpNet>() {
        return Some(Target::Network(net));
    }
    if let Some(range) = parse_range(token) {
        return Some(range);
    }
    if is_hostname(token) {
        return Some(Target::Hostname(token.to_owned()));
    }
    None
}

/// `a.b.c.d-e` 또는 `a.b.c.d-a.b.c.e`
fn parse_range(token: &str) -> Option<Target> {
    let (start, end) = token.split_once('-')?;
    let start: IpAddr = start.trim().parse().ok()?;
    let end = end.trim();

    let end = match end.parse::<IpAddr>() {
        Ok(end) => end,
        Err(_) => {
            // 마지막 옥텟만 지정한 IPv4 범위
            let IpAddr::V4(v4) = start else {
                return None;
            };
            let last: u8 = end.parse().ok()?;
            let [a, b, c, _] = v4.octets();
            IpAddr::from([a, b, c, last])
        }
    };

    if start.is_ipv4() != end.is_ipv4() || start > end {
        return None;
    }
    Some(Target::Range { start, end })
}

fn is_hostname(token: &str) -> bool {
    if token.len() > MAX_HOSTNAME_LEN {
        return false;
    }

    let labels: Vec<&str> = token.split('.').collect();
    let valid_labels = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });

    // 문자가 하나도 없으면 잘못된 주소나 범위 (예: 999.1.1.1, 10.0.0.1-300)
    valid_labels && token.chars().any(|c| c.is_ascii_alphabetic())
}

/// 대상 목록 파싱 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTargets {
    /// 인식된 대상 (입력 순서)
    pub valid: Vec<String>,
    /// 인식하지 못한 토큰 (입력 순서)
    pub invalid: Vec<String>,
}

/// 쉼표나 줄바꿈으로 구분된 대상 목록을 나눕니다. 빈 토큰은 건너뜁니다.
pub fn parse_targets(text: &str) -> ParsedTargets {
    let mut parsed = ParsedTargets::default();
    for token in text.split([',', '\n']).map(str::trim) {
        if token.is_empty() {
            continue;
        }
        if classify_target(token).is_some() {
            parsed.valid.push(token.to_owned());
        } else {
            parsed.invalid.push(token.to_owned());
        }
    }
    parsed
}

/// 중복을 제거하고 주소, 네트워크, 범위, 호스트명 순으로 정렬합니다.
///
/// 인식하지 못한 대상은 호스트명 뒤에 입력 순서대로 둡니다.
pub fn normalize_targets<I, S>(targets: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut addresses = BTreeSet::new();
    let mut networks = BTreeSet::new();
    let mut ranges = BTreeSet::new();
    let mut hostnames = BTreeSet::new();
    let mut unknown: Vec<String> = Vec::new();

    for target in targets {
        let raw = target.as_ref().trim();
        match classify_target(raw) {
            Some(Target::Address(ip)) => {
                addresses.insert(ip);
            }
            Some(Target::Network(net)) => {
                networks.insert(net);
            }
            Some(Target::Range { .. }) => {
                ranges.insert(raw.to_owned());
            }
            Some(Target::Hostname(name)) => {
                hostnames.insert(name.to_ascii_lowercase());
            }
            None => {
                if !raw.is_empty() && !unknown.iter().any(|u| u == raw) {
                    unknown.push(raw.to_owned());
                }
            }
        }
    }

    addresses
        .into_iter()
        .map(|ip| ip.to_string())
        .chain(networks.into_iter().map(|net| net.to_string()))
        .chain(ranges)
        .chain(hostnames)
        .chain(unknown)
        .collect()
}
