//! 스캔 엔진 설정
//!
//! [`ScanEngineConfig`]는 core의 [`EngineConfig`](scanwarden_core::config::EngineConfig)에서
//! 파생되며, 프로세스 제어 시간 제한과 출력 크기 상한을 담습니다.
//!
//! # 사용 예시
//!
//! ```
//! use scanwarden_engine::ScanEngineConfigBuilder;
//!
//! let config = ScanEngineConfigBuilder::new()
//!     .nmap_path("/usr/bin/nmap")
//!     .stop_timeout_secs(10)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.stop_timeout().as_secs(), 10);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanEngineError;

/// 설정 상한값 상수
const MAX_STOP_TIMEOUT_SECS: u64 = 300;
const MAX_EXIT_GRACE_SECS: u64 = 300;
const MAX_DRAIN_TIMEOUT_SECS: u64 = 60;
const MAX_XML_BYTES: usize = 1024 * 1024 * 1024; // 1 GB
const MAX_CHANNEL_CAPACITY: usize = 65_536;

/// 스캔 엔진 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEngineConfig {
    /// nmap 실행 파일 경로
    pub nmap_path: String,
    /// 정상 종료(SIGTERM) 후 강제 종료까지 대기 시간 (초)
    pub stop_timeout_secs: u64,
    /// XML 문서 종료 후 프로세스 종료를 기다리는 시간 (초)
    pub exit_grace_secs: u64,
    /// 프로세스 종료 후 남은 출력 drain 대기 시간 (초)
    pub drain_timeout_secs: u64,
    /// 캡처할 XML 최대 크기 (바이트)
    pub max_xml_bytes: usize,
    /// 진단용으로 보존할 비-XML 출력 최대 크기 (바이트)
    pub max_transcript_bytes: usize,
    /// 이벤트 broadcast 채널 용량
    pub event_channel_capacity: usize,
    /// 보존할 종료 작업 수 (0이면 무제한)
    pub history_limit: usize,
}

impl Default for ScanEngineConfig {
    fn default() -> Self {
        Self::from_core(&scanwarden_core::config::EngineConfig::default())
    }
}

impl ScanEngineConfig {
    /// core의 `EngineConfig`에서 엔진 설정을 생성합니다.
    pub fn from_core(core: &scanwarden_core::config::EngineConfig) -> Self {
        Self {
            nmap_path: core.nmap_path.clone(),
            stop_timeout_secs: core.stop_timeout_secs,
            exit_grace_secs: core.exit_grace_secs,
            drain_timeout_secs: core.drain_timeout_secs,
            max_xml_bytes: core.max_xml_bytes,
            max_transcript_bytes: core.max_transcript_bytes,
            event_channel_capacity: core.event_channel_capacity,
            history_limit: core.history_limit,
        }
    }

    /// 정상 종료 대기 시간
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// XML 종료 후 프로세스 종료 대기 시간
    pub fn exit_grace(&self) -> Duration {
        Duration::from_secs(self.exit_grace_secs)
    }

    /// 출력 drain 대기 시간
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `nmap_path`: 비어있으면 안 됨
    /// - `stop_timeout_secs`: 1-300
    /// - `exit_grace_secs`: 0-300
    /// - `drain_timeout_secs`: 0-60
    /// - `max_xml_bytes`: 1-1GiB
    /// - `event_channel_capacity`: 1-65536
    pub fn validate(&self) -> Result<(), ScanEngineError> {
        if self.nmap_path.trim().is_empty() {
            return Err(ScanEngineError::config("nmap_path", "must not be empty"));
        }

        if self.stop_timeout_secs == 0 || self.stop_timeout_secs > MAX_STOP_TIMEOUT_SECS {
            return Err(ScanEngineError::config(
                "stop_timeout_secs",
                format!("must be 1-{MAX_STOP_TIMEOUT_SECS}"),
            ));
        }

        if self.exit_grace_secs > MAX_EXIT_GRACE_SECS {
            return Err(ScanEngineError::config(
                "exit_grace_secs",
                format!("must be 0-{MAX_EXIT_GRACE_SECS}"),
            ));
        }

        if self.drain_timeout_secs > MAX_DRAIN_TIMEOUT_SECS {
            return Err(ScanEngineError::config(
                "drain_timeout_secs",
                format!("must be 0-{MAX_DRAIN_TIMEOUT_SECS}"),
            ));
        }

        if self.max_xml_bytes == 0 || self.max_xml_bytes > MAX_XML_BYTES {
            return Err(ScanEngineError::config(
                "max_xml_bytes",
                format!("must be 1-{MAX_XML_BYTES}"),
            ));
        }

        if self.event_channel_capacity == 0 || self.event_channel_capacity > MAX_CHANNEL_CAPACITY
        {
            return Err(ScanEngineError::config(
                "event_channel_capacity",
                format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            ));
        }

        Ok(())
    }
}

/// [`ScanEngineConfig`] 빌더
#[derive(Default)]
pub struct ScanEngineConfigBuilder {
    config: ScanEngineConfig,
}

impl ScanEngineConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// nmap 실행 파일 경로를 설정합니다.
    pub fn nmap_path(mut self, path: impl Into<String>) -> Self {
        self.config.nmap_path = path.into();
        self
    }

    /// 정상 종료 대기 시간(초)을 설정합니다.
    pub fn stop_timeout_secs(mut self, secs: u64) -> Self {
        self.config.stop_timeout_secs = secs;
        self
    }

    /// XML 종료 후 대기 시간(초)을 설정합니다.
    pub fn exit_grace_secs(mut self, secs: u64) -> Self {
        self.config.exit_grace_secs = secs;
        self
    }

    /// drain 대기 시간(초)을 설정합니다.
    pub fn drain_timeout_secs(mut self, secs: u64) -> Self {
        self.config.drain_timeout_secs = secs;
        self
    }

    /// XML 최대 크기를 설정합니다.
    pub fn max_xml_bytes(mut self, bytes: usize) -> Self {
        self.config.max_xml_bytes = bytes;
        self
    }

    /// 진단 출력 최대 크기를 설정합니다.
    pub fn max_transcript_bytes(mut self, bytes: usize) -> Self {
        self.config.max_transcript_bytes = bytes;
        self
    }

    /// 이벤트 채널 용량을 설정합니다.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// 보존할 종료 작업 수를 설정합니다.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ScanEngineError::Config` 반환
    pub fn build(self) -> Result<ScanEngineConfig, ScanEngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
