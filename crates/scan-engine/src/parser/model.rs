//! nmap XML 문서 모델 (serde + quick-xml)
//!
//! 결과 변환에 필요한 요소와 속성만 정의합니다. 나머지 요소(`scaninfo`, `hosthint`,
//! `taskprogress`, `cpe` 등)는 역직렬화 시 무시됩니다.
//! 속성은 `@` 접두어로 매핑합니다.
//!
//! 숫자 속성은 문자열로 받아 변환 단계에서 파싱합니다.
//! 잘못된 값 하나가 문서 전체를 실패시키지 않도록 하기 위함입니다.

use serde::Deserialize;

/// `<nmaprun>` 루트
#[derive(Debug, Default, Deserialize)]
pub(crate) struct NmapRun {
    #[serde(rename = "@args", default)]
    pub args: Option<String>,
    #[serde(rename = "@start", default)]
    pub start: Option<String>,
    #[serde(rename = "@version", default)]
    pub version: Option<String>,
    #[serde(rename = "host", default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub runstats: Option<RunStats>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RunStats {
    #[serde(default)]
    pub finished: Option<Finished>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Finished {
    #[serde(rename = "@time", default)]
    pub time: Option<String>,
}

/// `<host>`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Host {
    #[serde(rename = "address", default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub hostnames: Option<Hostnames>,
    #[serde(default)]
    pub ports: Option<Ports>,
    #[serde(default)]
    pub os: Option<Os>,
    #[serde(default)]
    pub hostscript: Option<HostScript>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Address {
    #[serde(rename = "@addr", default)]
    pub addr: Option<String>,
    #[serde(rename = "@addrtype", default)]
    pub addr_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Status {
    #[serde(rename = "@state", default)]
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Hostnames {
    #[serde(rename = "hostname", default)]
    pub hostnames: Vec<Hostname>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Hostname {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Ports {
    #[serde(rename = "port", default)]
    pub ports: Vec<Port>,
}

/// `<port>`
#[derive(Debug, Deserialize)]
pub(crate) struct Port {
    #[serde(rename = "@portid", default)]
    pub portid: Option<String>,
    #[serde(rename = "@protocol", default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub state: Option<PortStateElem>,
    #[serde(default)]
    pub service: Option<Service>,
    #[serde(rename = "script", default)]
    pub scripts: Vec<Script>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortStateElem {
    #[serde(rename = "@state", default)]
    pub state: Option<String>,
    #[serde(rename = "@reason", default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Service {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "@product", default)]
    pub product: Option<String>,
    #[serde(rename = "@version", default)]
    pub version: Option<String>,
    #[serde(rename = "@extrainfo", default)]
    pub extra_info: Option<String>,
}

/// `<script id="..." output="...">`
#[derive(Debug, Deserialize)]
pub(crate) struct Script {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(rename = "@output", default)]
    pub output: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HostScript {
    #[serde(rename = "script", default)]
    pub scripts: Vec<Script>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Os {
    #[serde(rename = "osmatch", default)]
    pub matches: Vec<OsMatch>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsMatch {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "@accuracy", default)]
    pub accuracy: Option<String>,
    #[serde(rename = "osclass", default)]
    pub classes: Vec<OsClass>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsClass {
    #[serde(rename = "@vendor", default)]
    pub vendor: Option<String>,
    #[serde(rename = "@osfamily", default)]
    pub os_family: Option<String>,
    #[serde(rename = "@osgen", default)]
    pub os_gen: Option<String>,
    #[serde(rename = "@accuracy", default)]
    pub accuracy: Option<String>,
}

/// 정확도 속성을 숫자로 변환합니다. 값이 없거나 잘못되면 0입니다.
pub(crate) fn accuracy_of(value: Option<&str>) -> u8 {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .unwrap_or(0)
}
