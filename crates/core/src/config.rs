//! 설정 관리: scanwarden.toml 파싱 및 런타임 설정
//!
//! [`ScanwardenConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SCANWARDEN_ENGINE_NMAP_PATH=/usr/bin/nmap` 형식)
//! 3. 설정 파일 (`scanwarden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), scanwarden_core::error::ScanwardenError> {
//! use scanwarden_core::config::ScanwardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ScanwardenConfig::load("scanwarden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ScanwardenConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ScanwardenError};
use crate::types::{
    DEFAULT_PORT_RANGE, DEFAULT_THREADS, DEFAULT_TIMING_TEMPLATE, Intensity, ScanType,
};

/// 병렬도 힌트 상한
pub const MAX_THREADS: u32 = 64;

/// Scanwarden 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanwardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스캔 엔진 설정
    #[serde(default)]
    pub engine: EngineConfig,
    /// 스캔 요청 기본값
    #[serde(default)]
    pub defaults: ScanDefaults,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ScanwardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScanwardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에서 시작하여 로드합니다.
    ///
    /// 설정 파일 없이 CLI를 실행할 때 사용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ScanwardenError> {
        match Self::load(path.as_ref()).await {
            Err(ScanwardenError::Config(ConfigError::FileNotFound { path })) => {
                tracing::debug!(path = %path, "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanwardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanwardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ScanwardenError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ScanwardenError> {
        toml::from_str(toml_str).map_err(|e| {
            ScanwardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SCANWARDEN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SCANWARDEN_GENERAL_LOG_LEVEL");
        override_string(
            &mut self.general.log_format,
            "SCANWARDEN_GENERAL_LOG_FORMAT",
        );

        // Engine
        override_string(&mut self.engine.nmap_path, "SCANWARDEN_ENGINE_NMAP_PATH");
        override_u64(
            &mut self.engine.stop_timeout_secs,
            "SCANWARDEN_ENGINE_STOP_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.engine.exit_grace_secs,
            "SCANWARDEN_ENGINE_EXIT_GRACE_SECS",
        );
        override_u64(
            &mut self.engine.drain_timeout_secs,
            "SCANWARDEN_ENGINE_DRAIN_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.engine.max_xml_bytes,
            "SCANWARDEN_ENGINE_MAX_XML_BYTES",
        );
        override_usize(
            &mut self.engine.max_transcript_bytes,
            "SCANWARDEN_ENGINE_MAX_TRANSCRIPT_BYTES",
        );
        override_usize(
            &mut self.engine.event_channel_capacity,
            "SCANWARDEN_ENGINE_EVENT_CHANNEL_CAPACITY",
        );
        override_usize(
            &mut self.engine.history_limit,
            "SCANWARDEN_ENGINE_HISTORY_LIMIT",
        );

        // Defaults
        override_string(
            &mut self.defaults.timing_template,
            "SCANWARDEN_DEFAULTS_TIMING_TEMPLATE",
        );
        override_u32(&mut self.defaults.threads, "SCANWARDEN_DEFAULTS_THREADS");
        override_string(
            &mut self.defaults.port_range,
            "SCANWARDEN_DEFAULTS_PORT_RANGE",
        );
        override_parsed(
            &mut self.defaults.scan_type,
            "SCANWARDEN_DEFAULTS_SCAN_TYPE",
            ScanType::from_str_loose,
        );
        override_parsed(
            &mut self.defaults.intensity,
            "SCANWARDEN_DEFAULTS_INTENSITY",
            Intensity::from_str_loose,
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "SCANWARDEN_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "SCANWARDEN_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "SCANWARDEN_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ScanwardenError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.engine.nmap_path.trim().is_empty() {
            return Err(invalid("engine.nmap_path", "must not be empty"));
        }

        if self.engine.stop_timeout_secs == 0 || self.engine.stop_timeout_secs > 300 {
            return Err(invalid("engine.stop_timeout_secs", "must be 1-300"));
        }

        if self.engine.max_xml_bytes == 0 {
            return Err(invalid("engine.max_xml_bytes", "must be greater than 0"));
        }

        if self.engine.event_channel_capacity == 0 {
            return Err(invalid(
                "engine.event_channel_capacity",
                "must be greater than 0",
            ));
        }

        if !is_timing_template(&self.defaults.timing_template) {
            return Err(invalid(
                "defaults.timing_template",
                "must be one of: T0, T1, T2, T3, T4, T5",
            ));
        }

        if self.defaults.threads == 0 || self.defaults.threads > MAX_THREADS {
            return Err(invalid(
                "defaults.threads",
                format!("must be 1-{MAX_THREADS}"),
            ));
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid("metrics.endpoint", "only '/metrics' is supported"));
        }

        Ok(())
    }
}

/// nmap 타이밍 템플릿 토큰(`T0`-`T5`)인지 확인합니다.
pub fn is_timing_template(token: &str) -> bool {
    matches!(token, "T0" | "T1" | "T2" | "T3" | "T4" | "T5")
}

fn invalid(field: &str, reason: impl Into<String>) -> ScanwardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 스캔 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// nmap 실행 파일 경로
    pub nmap_path: String,
    /// 정상 종료 대기 시간 (초), 초과 시 강제 종료
    pub stop_timeout_secs: u64,
    /// XML 문서 종료 후 프로세스 종료 대기 시간 (초)
    pub exit_grace_secs: u64,
    /// 프로세스 종료 후 출력 스트림 drain 대기 시간 (초)
    pub drain_timeout_secs: u64,
    /// 캡처할 XML 최대 크기 (바이트)
    pub max_xml_bytes: usize,
    /// 진단용으로 보존할 비-XML 출력 최대 크기 (바이트)
    pub max_transcript_bytes: usize,
    /// 이벤트 broadcast 채널 용량
    pub event_channel_capacity: usize,
    /// 보존할 종료 작업 수
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nmap_path: "nmap".to_owned(),
            stop_timeout_secs: 5,
            exit_grace_secs: 5,
            drain_timeout_secs: 2,
            max_xml_bytes: 64 * 1024 * 1024, // 64MB
            max_transcript_bytes: 256 * 1024, // 256KB
            event_channel_capacity: 256,
            history_limit: 100,
        }
    }
}

/// 스캔 요청 기본값
///
/// CLI가 인자로 지정되지 않은 값을 채울 때 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanDefaults {
    /// 스캔 유형
    pub scan_type: ScanType,
    /// 스캔 강도
    pub intensity: Intensity,
    /// 타이밍 템플릿
    pub timing_template: String,
    /// 병렬도 힌트
    pub threads: u32,
    /// 포트 범위
    pub port_range: String,
}

impl Default for ScanDefaults {
    fn default() -> Self {
        Self {
            scan_type: ScanType::default(),
            intensity: Intensity::default(),
            timing_template: DEFAULT_TIMING_TEMPLATE.to_owned(),
            threads: DEFAULT_THREADS,
            port_range: DEFAULT_PORT_RANGE.to_owned(),
        }
    }
}

/// Prometheus 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, |v| v.parse::<bool>().ok());
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, |v| v.parse::<usize>().ok());
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, |v| v.parse::<u16>().ok());
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, |v| v.parse::<u32>().ok());
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, |v| v.parse::<u64>().ok());
}

fn override_parsed<T>(target: &mut T, env_key: &str, parse: impl Fn(&str) -> Option<T>) {
    if let Ok(val) = std::env::var(env_key) {
        match parse(val.trim()) {
            Some(parsed) => *target = parsed,
            None => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}
