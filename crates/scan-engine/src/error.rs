//! 스캔 엔진 에러 타입
//!
//! [`ScanEngineError`]는 스캔 엔진 모듈 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<ScanEngineError> for ScanwardenError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 자연스럽게 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **설정**: `Config`, `EmptyTargets` (프로세스 실행 전에 거부)
//! - **프로세스 실행**: `Spawn`
//! - **스트림**: `Stream`
//! - **시그널**: `Signal`, `Unsupported`
//! - **파싱**: `Parse`
//! - **작업 관리**: `JobNotFound`, `InvalidTransition`, `Channel`, `ShutDown`, `Runner`
//! - **파일 I/O**: `Io`

use scanwarden_core::error::{ConfigError, EngineError, ParseError, PipelineError, ScanwardenError};

/// 스캔 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanEngineError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 대상 목록이 비어 있음
    #[error("config error: targets: at least one target is required")]
    EmptyTargets,

    /// 외부 프로세스 실행 실패
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// 실행 파일
        program: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// stdout/stderr 스트림 에러
    #[error("stream error: {0}")]
    Stream(String),

    /// 시그널 전달 실패
    #[error("failed to send {signal} to process group {pgid}: {reason}")]
    Signal {
        /// 프로세스 그룹 ID
        pgid: u32,
        /// 시그널 이름
        signal: &'static str,
        /// 실패 사유
        reason: String,
    },

    /// 현재 플랫폼에서 지원하지 않는 동작
    #[error("unsupported on this platform: {0}")]
    Unsupported(String),

    /// XML 파싱 실패
    #[error("parse error: {0}")]
    Parse(String),

    /// 존재하지 않는 작업
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// 현재 상태에서 허용되지 않는 요청
    #[error("cannot {action} job {job_id} in state {state}")]
    InvalidTransition {
        /// 작업 ID
        job_id: String,
        /// 현재 상태명
        state: &'static str,
        /// 요청된 동작
        action: &'static str,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 종료된 매니저에 대한 요청
    #[error("scan manager is shut down")]
    ShutDown,

    /// 작업 실행 태스크 비정상 종료
    #[error("runner failed: {0}")]
    Runner(String),

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },
}

impl ScanEngineError {
    /// 프로세스 실행 전에 거부되는 설정 에러인지 반환합니다.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::EmptyTargets)
    }

    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<ScanEngineError> for ScanwardenError {
    fn from(err: ScanEngineError) -> Self {
        match err {
            ScanEngineError::Config { field, reason } => {
                ScanwardenError::Config(ConfigError::InvalidValue { field, reason })
            }
            ScanEngineError::EmptyTargets => {
                ScanwardenError::Config(ConfigError::InvalidValue {
                    field: "targets".to_owned(),
                    reason: "at least one target is required".to_owned(),
                })
            }
            ScanEngineError::Spawn { program, source } => ScanwardenError::Engine(
                EngineError::Spawn(format!("failed to spawn '{program}': {source}")),
            ),
            ScanEngineError::Signal {
                pgid,
                signal,
                reason,
            } => ScanwardenError::Engine(EngineError::Signal(format!(
                "failed to send {signal} to process group {pgid}: {reason}"
            ))),
            ScanEngineError::Unsupported(msg) => {
                ScanwardenError::Engine(EngineError::Signal(msg))
            }
            ScanEngineError::Stream(msg) | ScanEngineError::Runner(msg) => {
                ScanwardenError::Engine(EngineError::ScanFailed(msg))
            }
            ScanEngineError::Parse(reason) => {
                ScanwardenError::Parse(ParseError::Failed { offset: 0, reason })
            }
            ScanEngineError::JobNotFound(id) => {
                ScanwardenError::Engine(EngineError::JobNotFound(id))
            }
            err @ ScanEngineError::InvalidTransition { .. } => {
                ScanwardenError::Engine(EngineError::InvalidTransition(err.to_string()))
            }
            ScanEngineError::Channel(msg) => {
                ScanwardenError::Pipeline(PipelineError::ChannelSend(msg))
            }
            ScanEngineError::ShutDown => ScanwardenError::Pipeline(PipelineError::NotRunning),
            ScanEngineError::Io { source, .. } => ScanwardenError::Io(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ScanEngineError::config("threads", "must be 1-64");
        let msg = err.to_string();
        assert!(msg.contains("threads"));
        assert!(msg.contains("must be 1-64"));
        assert!(err.is_config());
    }

    #[test]
    fn empty_targets_is_config_error() {
        assert!(ScanEngineError::EmptyTargets.is_config());
        assert!(!ScanEngineError::Stream("eof".to_owned()).is_config());
    }

    #[test]
    fn spawn_error_display() {
        let err = ScanEngineError::Spawn {
            program: "nmap".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("nmap"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn invalid_transition_display() {
        let err = ScanEngineError::InvalidTransition {
            job_id: "abc".to_owned(),
            state: "pending",
            action: "pause",
        };
        assert_eq!(err.to_string(), "cannot pause job abc in state pending");
    }

    #[test]
    fn converts_config_to_core_config() {
        let err: ScanwardenError = ScanEngineError::EmptyTargets.into();
        assert!(matches!(
            err,
            ScanwardenError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn converts_spawn_to_engine_error() {
        let err: ScanwardenError = ScanEngineError::Spawn {
            program: "nmap".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        assert!(matches!(err, ScanwardenError::Engine(EngineError::Spawn(_))));
    }

    #[test]
    fn converts_job_not_found() {
        let err: ScanwardenError = ScanEngineError::JobNotFound("x".to_owned()).into();
        assert!(matches!(
            err,
            ScanwardenError::Engine(EngineError::JobNotFound(_))
        ));
    }

    #[test]
    fn converts_parse_error() {
        let err: ScanwardenError = ScanEngineError::Parse("bad root".to_owned()).into();
        assert!(matches!(err, ScanwardenError::Parse(_)));
    }
}
