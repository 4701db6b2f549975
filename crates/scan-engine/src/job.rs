//! 스캔 작업: 상태 머신과 작업 값 객체
//!
//! ```text
//! Pending ──> Running ──> Completed
//!    │          │ ▲  ──> Stopped
//!    │          ▼ │  ──> Error
//!    │         Paused ──> Stopped / Completed / Error
//!    └──> Stopped
//! ```
//!
//! 상태는 앞으로만 진행하며, 어떤 작업도 Pending으로 돌아가지 않습니다.
//! 종료 상태(Completed, Stopped, Error) 이후에는 전이가 없습니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use scanwarden_core::types::{ScanConfig, ScanResult};

use crate::error::ScanEngineError;

/// 작업 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// 대기열에서 대기 중
    Pending,
    /// 실행 중
    Running,
    /// 일시정지
    Paused,
    /// 결과와 함께 완료
    Completed,
    /// 중지 요청으로 종료
    Stopped,
    /// 복구 불가 실패
    Error,
}

impl JobStatus {
    /// 종료 상태 여부
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }

    /// 프로세스가 살아 있는 상태(Running, Paused) 여부
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// 전이 허용 여부
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Stopped)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Stopped)
                | (Running, Error)
                | (Paused, Running)
                | (Paused, Completed)
                | (Paused, Stopped)
                | (Paused, Error)
        )
    }

    /// 상태 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캔 작업
///
/// 스캔 매니저만 소유하고 변경합니다.
#[derive(Debug, Clone)]
pub struct ScanJob {
    id: String,
    config: ScanConfig,
    status: JobStatus,
    progress: u8,
    result: Option<ScanResult>,
    error: Option<String>,
    submitted_at: SystemTime,
    started_at: Option<SystemTime>,
    finished_at: Option<SystemTime>,
}

impl ScanJob {
    /// 새 작업을 Pending 상태로 생성합니다. 설정의 `scan_id`는 작업 ID로 덮어씁니다.
    pub fn new(id: impl Into<String>, mut config: ScanConfig) -> Self {
        let id = id.into();
        config.scan_id = Some(id.clone());
        Self {
            id,
            config,
            status: JobStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            submitted_at: SystemTime::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// 작업 ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 스캔 설정
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// 현재 상태
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// 진행률 (0-100)
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// 결과
    pub fn result(&self) -> Option<&ScanResult> {
        self.result.as_ref()
    }

    /// 실패 사유
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// 상태를 전이합니다.
    ///
    /// # Errors
    ///
    /// 허용되지 않은 전이면 `ScanEngineError::InvalidTransition`
    pub fn transition(
        &mut self,
        next: JobStatus,
        action: &'static str,
    ) -> Result<(), ScanEngineError> {
        if !self.status.can_transition_to(next) {
            return Err(ScanEngineError::InvalidTransition {
                job_id: self.id.clone(),
                state: self.status.as_str(),
                action,
            });
        }

        let now = SystemTime::now();
        if next == JobStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    /// 진행률을 갱신합니다. 더 작은 값은 무시하며, 갱신 여부를 반환합니다.
    pub fn advance_progress(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if percent > self.progress {
            self.progress = percent;
            true
        } else {
            false
        }
    }

    /// 결과를 저장하고 Completed로 전이합니다.
    pub fn complete(&mut self, result: ScanResult) -> Result<(), ScanEngineError> {
        self.transition(JobStatus::Completed, "complete")?;
        self.progress = 100;
        self.result = Some(result);
        Ok(())
    }

    /// 실패 사유를 저장하고 Error로 전이합니다.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ScanEngineError> {
        self.transition(JobStatus::Error, "fail")?;
        self.error = Some(reason.into());
        Ok(())
    }

    /// 읽기 전용 스냅샷을 만듭니다.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            config: self.config.clone(),
            status: self.status,
            progress: self.progress,
            error: self.error.clone(),
            has_result: self.result.is_some(),
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// 작업 스냅샷 (조회용)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// 작업 ID
    pub id: String,
    /// 스캔 설정
    pub config: ScanConfig,
    /// 상태
    pub status: JobStatus,
    /// 진행률
    pub progress: u8,
    /// 실패 사유
    pub error: Option<String>,
    /// 결과 보유 여부
    pub has_result: bool,
    /// 제출 시각
    pub submitted_at: SystemTime,
    /// 실행 시작 시각
    pub started_at: Option<SystemTime>,
    /// 종료 시각
    pub finished_at: Option<SystemTime>,
}

impl fmt::Display for JobSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}% ({})",
            self.id, self.status, self.progress, self.config
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ScanJob {
        ScanJob::new("job-1", ScanConfig::new(["10.0.0.1"]))
    }

    #[test]
    fn new_job_is_pending_and_owns_id() {
        let job = job();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.progress(), 0);
        assert_eq!(job.config().scan_id.as_deref(), Some("job-1"));
        assert!(job.result().is_none());
    }

    #[test]
    fn caller_scan_id_is_overwritten() {
        let mut config = ScanConfig::new(["10.0.0.1"]);
        config.scan_id = Some("caller".to_owned());
        let job = ScanJob::new("job-2", config);
        assert_eq!(job.config().scan_id.as_deref(), Some("job-2"));
    }

    #[test]
    fn valid_lifecycle() {
        let mut job = job();
        job.transition(JobStatus::Running, "start").unwrap();
        job.transition(JobStatus::Paused, "pause").unwrap();
        job.transition(JobStatus::Running, "resume").unwrap();
        job.transition(JobStatus::Stopped, "stop").unwrap();
        assert!(job.status().is_terminal());
        assert!(job.snapshot().finished_at.is_some());
        assert!(job.snapshot().started_at.is_some());
    }

    #[test]
    fn pause_from_pending_rejected() {
        let mut job = job();
        let err = job.transition(JobStatus::Paused, "pause").unwrap_err();
        assert!(matches!(err, ScanEngineError::InvalidTransition { .. }));
        assert_eq!(job.status(), JobStatus::Pending);
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [JobStatus::Completed, JobStatus::Stopped, JobStatus::Error] {
            for next in [
                JobStatus::Pending,
                JobStatus::Running,
                JobStatus::Paused,
                JobStatus::Completed,
                JobStatus::Stopped,
                JobStatus::Error,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn nothing_returns_to_pending() {
        for from in [JobStatus::Running, JobStatus::Paused] {
            assert!(!from.can_transition_to(JobStatus::Pending));
        }
    }

    #[test]
    fn progress_never_decreases() {
        let mut job = job();
        assert!(job.advance_progress(30));
        assert!(!job.advance_progress(10));
        assert!(job.advance_progress(250));
        assert_eq!(job.progress(), 100);
    }

    #[test]
    fn complete_stores_result() {
        let mut job = job();
        job.transition(JobStatus::Running, "start").unwrap();
        job.complete(ScanResult::failed("job-1", "", "no xml")).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.progress(), 100);
        assert!(job.snapshot().has_result);
    }

    #[test]
    fn fail_stores_reason() {
        let mut job = job();
        job.transition(JobStatus::Running, "start").unwrap();
        job.fail("spawn failed").unwrap();
        assert_eq!(job.error(), Some("spawn failed"));
        assert!(job.result().is_none());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
    }
}
