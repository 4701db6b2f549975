//! 이벤트 시스템: 스캔 작업 생명주기 알림
//!
//! 스캔 매니저는 작업 상태가 바뀔 때마다 [`ScanEvent`]를 발행합니다.
//! [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는 메타데이터이며,
//! [`Event`] trait은 모든 이벤트 타입이 구현해야 하는 인터페이스입니다.
//!
//! 같은 작업에서 나온 이벤트는 모두 작업 ID를 `trace_id`로 공유합니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::{ScanConfig, ScanResult};

// --- 모듈명 상수 ---

/// 스캔 엔진 모듈명
pub const MODULE_SCAN_ENGINE: &str = "scan-engine";

// --- 이벤트 타입 상수 ---

/// 작업 대기열 등록
pub const EVENT_TYPE_QUEUED: &str = "scan.queued";
/// 작업 실행 시작
pub const EVENT_TYPE_STARTED: &str = "scan.started";
/// 진행률 갱신
pub const EVENT_TYPE_PROGRESS: &str = "scan.progress";
/// 일시정지
pub const EVENT_TYPE_PAUSED: &str = "scan.paused";
/// 재개
pub const EVENT_TYPE_RESUMED: &str = "scan.resumed";
/// 정상 완료
pub const EVENT_TYPE_COMPLETED: &str = "scan.completed";
/// 사용자 중지
pub const EVENT_TYPE_STOPPED: &str = "scan.stopped";
/// 실패
pub const EVENT_TYPE_FAILED: &str = "scan.failed";

/// 이벤트 메타데이터: 모든 이벤트에 공통으로 포함되는 추적 정보
///
/// 각 이벤트의 발생 시각, 생성 모듈, 추적 ID를 담고 있어
/// 이벤트 흐름을 추적하고 디버깅할 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명
    pub source_module: String,
    /// 추적 ID: 같은 흐름의 이벤트를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 사용하여 새 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self::new(source_module, uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            unix_timestamp_str(self.timestamp),
            self.source_module,
            self.trace_id,
        )
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 `tokio` 채널을 통한
/// 안전한 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터 (timestamp, source_module, trace_id)
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅 및 라우팅에 사용)
    fn event_type(&self) -> &str;
}

/// 진행률 이벤트 레벨
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressLevel {
    /// 휴리스틱 진행률 갱신
    #[default]
    Info,
    /// stderr 출력 (작업 상태에는 영향 없음)
    Warning,
}

/// 스캔 이벤트 종류와 페이로드
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEventKind {
    /// 대기열에 등록됨
    Queued,
    /// 실행 시작
    Started {
        /// 작업 ID가 기록된 스캔 설정
        config: ScanConfig,
    },
    /// 진행률 갱신
    Progress {
        /// 0-100 진행률
        percent: u8,
        /// 진행률을 유발한 출력 라인 (100자 제한)
        status_text: String,
        /// 이벤트 레벨
        level: ProgressLevel,
    },
    /// 일시정지됨
    Paused,
    /// 재개됨
    Resumed,
    /// 완료 (결과 포함)
    Completed {
        /// 스캔 결과 사본
        result: Box<ScanResult>,
    },
    /// 사용자 요청으로 중지됨
    Stopped,
    /// 실패
    Failed {
        /// 사람이 읽을 수 있는 실패 사유
        error: String,
    },
}

impl ScanEventKind {
    /// 이벤트 타입 상수를 반환합니다.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Queued => EVENT_TYPE_QUEUED,
            Self::Started { .. } => EVENT_TYPE_STARTED,
            Self::Progress { .. } => EVENT_TYPE_PROGRESS,
            Self::Paused => EVENT_TYPE_PAUSED,
            Self::Resumed => EVENT_TYPE_RESUMED,
            Self::Completed { .. } => EVENT_TYPE_COMPLETED,
            Self::Stopped => EVENT_TYPE_STOPPED,
            Self::Failed { .. } => EVENT_TYPE_FAILED,
        }
    }

    /// 종료 상태 이벤트인지 반환합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Stopped | Self::Failed { .. }
        )
    }
}

/// 스캔 작업 이벤트
///
/// 스캔 매니저가 구독자에게 발행하는 단위입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터 (trace_id == job_id)
    pub metadata: EventMetadata,
    /// 작업 ID
    pub job_id: String,
    /// 이벤트 종류
    pub kind: ScanEventKind,
}

impl ScanEvent {
    /// 작업 ID를 trace로 사용하는 이벤트를 생성합니다.
    pub fn new(job_id: impl Into<String>, kind: ScanEventKind) -> Self {
        let job_id = job_id.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::new(MODULE_SCAN_ENGINE, job_id.clone()),
            job_id,
            kind,
        }
    }

    pub fn queued(job_id: impl Into<String>) -> Self {
        Self::new(job_id, ScanEventKind::Queued)
    }

    pub fn started(job_id: impl Into<String>, config: ScanConfig) -> Self {
        Self::new(job_id, ScanEventKind::Started { config })
    }

    pub fn progress(
        job_id: impl Into<String>,
        percent: u8,
        status_text: impl Into<String>,
        level: ProgressLevel,
    ) -> Self {
        Self::new(
            job_id,
            ScanEventKind::Progress {
                percent,
                status_text: status_text.into(),
                level,
            },
        )
    }

    pub fn paused(job_id: impl Into<String>) -> Self {
        Self::new(job_id, ScanEventKind::Paused)
    }

    pub fn resumed(job_id: impl Into<String>) -> Self {
        Self::new(job_id, ScanEventKind::Resumed)
    }

    pub fn completed(job_id: impl Into<String>, result: ScanResult) -> Self {
        Self::new(
            job_id,
            ScanEventKind::Completed {
                result: Box::new(result),
            },
        )
    }

    pub fn stopped(job_id: impl Into<String>) -> Self {
        Self::new(job_id, ScanEventKind::Stopped)
    }

    pub fn failed(job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            job_id,
            ScanEventKind::Failed {
                error: error.into(),
            },
        )
    }

    /// 종료 상태 이벤트인지 반환합니다.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

impl Event for ScanEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        self.kind.event_type()
    }
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScanEvent[{}] job={} type={}",
            &self.id[..8.min(self.id.len())],
            self.job_id,
            self.kind.event_type(),
        )?;
        match &self.kind {
            ScanEventKind::Progress { percent, .. } => write!(f, " progress={percent}%"),
            ScanEventKind::Completed { result } => write!(
                f,
                " hosts={} open_ports={}",
                result.hosts.len(),
                result.open_ports_count()
            ),
            ScanEventKind::Failed { error } => write!(f, " error={error}"),
            _ => Ok(()),
        }
    }
}

/// SystemTime을 사람이 읽을 수 있는 형태로 변환합니다.
fn unix_timestamp_str(time: SystemTime) -> String {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => duration.as_secs().to_string(),
        Err(_) => "unknown".to_owned(),
    }
}
