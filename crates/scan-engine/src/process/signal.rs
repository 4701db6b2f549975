//! 일시정지 가능한 프로세스 추상화
//!
//! 스캐너는 자체 프로세스 그룹에서 실행되며, 시그널은 그룹 전체에 전달됩니다.
//! nmap이 띄운 보조 프로세스까지 함께 멈추고 종료하기 위함입니다.
//!
//! # 플랫폼 제약
//!
//! - Unix: `SIGSTOP`/`SIGCONT`/`SIGTERM`/`SIGKILL`을 `kill(-pgid, sig)`로 전달
//! - 그 외: 그룹 시그널이 없으므로 모든 동작이 `ScanEngineError::Unsupported`를 반환합니다.
//!   일시정지/재개는 지원되지 않으며, 중지는 컨트롤러가 직계 자식만 강제 종료합니다.

use crate::error::ScanEngineError;

/// 일시정지/재개/종료가 가능한 프로세스
pub trait SuspendableProcess: Send + Sync {
    /// 실행을 멈춥니다.
    fn suspend(&self) -> Result<(), ScanEngineError>;

    /// 멈춘 실행을 재개합니다.
    fn resume(&self) -> Result<(), ScanEngineError>;

    /// 정상 종료를 요청합니다.
    fn terminate(&self) -> Result<(), ScanEngineError>;

    /// 강제 종료합니다.
    fn kill(&self) -> Result<(), ScanEngineError>;

    /// 일시정지/재개를 실제로 지원하는지 반환합니다.
    fn supports_suspend(&self) -> bool;
}

/// 프로세스 그룹 핸들
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGroup {
    pgid: u32,
}

impl ProcessGroup {
    /// 그룹 리더 PID로 핸들을 생성합니다.
    pub fn new(pgid: u32) -> Self {
        Self { pgid }
    }

    /// 프로세스 그룹 ID
    pub fn pgid(&self) -> u32 {
        self.pgid
    }
}

#[cfg(unix)]
impl ProcessGroup {
    fn send(
        &self,
        signal: libc::c_int,
        name: &'static str,
        missing_ok: bool,
    ) -> Result<(), ScanEngineError> {
        let pgid = match libc::pid_t::try_from(self.pgid) {
            Ok(pgid) if pgid > 1 => pgid,
            _ => {
                return Err(ScanEngineError::Signal {
                    pgid: self.pgid,
                    signal: name,
                    reason: "invalid process group id".to_owned(),
                });
            }
        };

        // SAFETY: kill(2)은 메모리를 건드리지 않으며, 음수 pid는 해당 그룹에만 전달됩니다.
        let rc = unsafe { libc::kill(-pgid, signal) };
        if rc == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if missing_ok && err.raw_os_error() == Some(libc::ESRCH) {
            // 이미 종료된 그룹
            return Ok(());
        }

        Err(ScanEngineError::Signal {
            pgid: self.pgid,
            signal: name,
            reason: err.to_string(),
        })
    }
}

#[cfg(unix)]
impl SuspendableProcess for ProcessGroup {
    fn suspend(&self) -> Result<(), ScanEngineError> {
        self.send(libc::SIGSTOP, "SIGSTOP", false)
    }

    fn resume(&self) -> Result<(), ScanEngineError> {
        self.send(libc::SIGCONT, "SIGCONT", false)
    }

    fn terminate(&self) -> Result<(), ScanEngineError> {
        self.send(libc::SIGTERM, "SIGTERM", true)?;
        // 멈춘 그룹은 SIGTERM을 처리하지 못함
        self.send(libc::SIGCONT, "SIGCONT", true)
    }

    fn kill(&self) -> Result<(), ScanEngineError> {
        self.send(libc::SIGKILL, "SIGKILL", true)
    }

    fn supports_suspend(&self) -> bool {
        true
    }
}

#[cfg(not(unix))]
impl SuspendableProcess for ProcessGroup {
    fn suspend(&self) -> Result<(), ScanEngineError> {
        Err(ScanEngineError::Unsupported(
            "pausing a scan requires process-group signals".to_owned(),
        ))
    }

    fn resume(&self) -> Result<(), ScanEngineError> {
        Err(ScanEngineError::Unsupported(
            "resuming a scan requires process-group signals".to_owned(),
        ))
    }

    fn terminate(&self) -> Result<(), ScanEngineError> {
        Err(ScanEngineError::Unsupported(
            "graceful termination requires process-group signals".to_owned(),
        ))
    }

    fn kill(&self) -> Result<(), ScanEngineError> {
        Err(ScanEngineError::Unsupported(
            "group kill requires process-group signals".to_owned(),
        ))
    }

    fn supports_suspend(&self) -> bool {
        false
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_group_ids() {
        for pgid in [0, 1] {
            let group = ProcessGroup::new(pgid);
            let err = group.suspend().unwrap_err();
            assert!(matches!(err, ScanEngineError::Signal { .. }));
        }
    }

    #[test]
    fn terminate_on_missing_group_is_ok() {
        // pid_max 상한을 넘는 값은 존재할 수 없는 그룹
        let group = ProcessGroup::new(4_194_304 + 1000);
        group.terminate().unwrap();
        group.kill().unwrap();
        assert!(group.suspend().is_err());
    }

    #[test]
    fn supports_suspend_on_unix() {
        assert!(ProcessGroup::new(1234).supports_suspend());
        assert_eq!(ProcessGroup::new(1234).pgid(), 1234);
    }
}
