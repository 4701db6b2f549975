//! NSE 스크립트 출력 해석기
//!
//! OS/호스트명 요소가 없을 때 잘 알려진 호스트 스크립트 출력에서 값을 보충합니다.
//! 최선 노력 보강이며, 이미 값이 있으면 덮어쓰지 않습니다.
//!
//! - [`SmbOsDiscovery`]: `smb-os-discovery` (OS, FQDN, Computer name)
//! - [`Nbstat`]: `nbstat` (NetBIOS name)

use scanwarden_core::types::HostInfo;

/// 스크립트 출력 해석기 trait
pub trait ScriptInterpreter: Send + Sync {
    /// 담당하는 스크립트 ID
    fn script_id(&self) -> &'static str;

    /// 스크립트 출력으로 호스트 정보를 보충합니다.
    fn apply(&self, output: &str, host: &mut HostInfo);
}

/// 기본 해석기 목록
pub fn default_interpreters() -> Vec<Box<dyn ScriptInterpreter>> {
    vec![Box::new(SmbOsDiscovery), Box::new(Nbstat)]
}

/// `smb-os-discovery` 해석기
#[derive(Debug, Clone, Copy, Default)]
pub struct SmbOsDiscovery;

impl ScriptInterpreter for SmbOsDiscovery {
    fn script_id(&self) -> &'static str {
        "smb-os-discovery"
    }

    fn apply(&self, output: &str, host: &mut HostInfo) {
        let mut os = None;
        let mut fqdn = None;
        let mut computer = None;

        for line in output.lines() {
            let line = line.trim();
            if let Some(value) = field(line, "OS:") {
                os.get_or_insert(value);
            } else if let Some(value) = field(line, "FQDN:") {
                fqdn.get_or_insert(value);
            } else if let Some(value) = field(line, "Computer name:") {
                computer.get_or_insert(value);
            }
        }

        if host.os_family.is_none() {
            host.os_family = os;
        }
        if host.hostname.is_none() {
            host.hostname = fqdn.or(computer);
        }
    }
}

/// `nbstat` 해석기
#[derive(Debug, Clone, Copy, Default)]
pub struct Nbstat;

impl ScriptInterpreter for Nbstat {
    fn script_id(&self) -> &'static str {
        "nbstat"
    }

    fn apply(&self, output: &str, host: &mut HostInfo) {
        if host.hostname.is_some() {
            return;
        }

        let name = output.find("NetBIOS name:").and_then(|idx| {
            let rest = &output[idx + "NetBIOS name:".len()..];
            let end = rest.find([',', '\n']).unwrap_or(rest.len());
            clean(&rest[..end])
        });

        if let Some(name) = name {
            host.hostname = Some(name);
        }
    }
}

fn field(line: &str, prefix: &str) -> Option<String> {
    line.strip_prefix(prefix).and_then(clean)
}

fn clean(value: &str) -> Option<String> {
    let value = value.trim().trim_end_matches('\0').trim();
    if value.is_empty() || value == "<unknown>" {
        None
    } else {
        Some(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostInfo {
        HostInfo::new("192.168.1.10".parse().unwrap())
    }

    const SMB_OUTPUT: &str = "\n  OS: Windows 10 Pro 19045 (Windows 10 Pro 6.3)\n  OS CPE: cpe:/o:microsoft:windows_10::-\n  Computer name: DESKTOP-ABC\n  NetBIOS computer name: DESKTOP-ABC\\x00\n  Domain name: corp.local\n  FQDN: DESKTOP-ABC.corp.local\n  System time: 2024-01-01T10:00:00+00:00\n";

    #[test]
    fn smb_os_discovery_backfills() {
        let mut host = host();
        SmbOsDiscovery.apply(SMB_OUTPUT, &mut host);
        assert_eq!(
            host.os_family.as_deref(),
            Some("Windows 10 Pro 19045 (Windows 10 Pro 6.3)")
        );
        assert_eq!(host.hostname.as_deref(), Some("DESKTOP-ABC.corp.local"));
    }

    #[test]
    fn smb_os_discovery_keeps_existing_values() {
        let mut host = host();
        host.os_family = Some("Linux 5.X".to_owned());
        host.hostname = Some("known".to_owned());
        SmbOsDiscovery.apply(SMB_OUTPUT, &mut host);
        assert_eq!(host.os_family.as_deref(), Some("Linux 5.X"));
        assert_eq!(host.hostname.as_deref(), Some("known"));
    }

    #[test]
    fn smb_falls_back_to_computer_name() {
        let mut host = host();
        SmbOsDiscovery.apply("  Computer name: FILESRV\n", &mut host);
        assert_eq!(host.hostname.as_deref(), Some("FILESRV"));
        assert!(host.os_family.is_none());
    }

    #[test]
    fn nbstat_backfills_hostname() {
        let mut host = host();
        Nbstat.apply(
            "NetBIOS name: PRINTER01, NetBIOS user: <unknown>, NetBIOS MAC: 00:11:22:33:44:55 (HP)",
            &mut host,
        );
        assert_eq!(host.hostname.as_deref(), Some("PRINTER01"));
    }

    #[test]
    fn nbstat_ignores_unknown_name() {
        let mut host = host();
        Nbstat.apply("NetBIOS name: <unknown>, NetBIOS user: x", &mut host);
        assert!(host.hostname.is_none());
    }

    #[test]
    fn default_interpreters_cover_both_scripts() {
        let ids: Vec<_> = default_interpreters().iter().map(|i| i.script_id()).collect();
        assert_eq!(ids, vec!["smb-os-discovery", "nbstat"]);
    }
}
