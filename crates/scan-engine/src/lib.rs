#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`error`]: 엔진 에러 타입 (`ScanEngineError`)
//! - [`config`]: 엔진 설정 (`ScanEngineConfig`, 빌더)
//! - [`command`]: 명령줄 빌더 (`CommandBuilder`, `ScanCommand`)
//! - [`parser`]: nmap XML 결과 파서 (`ResultParser` trait, `NmapXmlParser`, 스크립트 해석기)
//! - [`progress`]: 진행률 휴리스틱 (`ProgressHeuristic`, `PhaseProfile`)
//! - [`process`]: 프로세스 컨트롤러 (`NmapProcessController`, `ScanRunner` trait, 프로세스 그룹 시그널)
//! - [`job`]: 작업 상태 머신 (`ScanJob`, `JobStatus`)
//! - [`manager`]: 작업 큐와 워커 (`ScanManager`, `ScanManagerBuilder`, `Pipeline` 구현)
//! - [`target`]: 대상 문자열 분류
//!
//! # 아키텍처
//!
//! ```text
//! ScanConfig --> ScanManager.submit() --> FIFO queue --> worker
//!                                                         |
//!                                             NmapProcessController
//!                                     CommandBuilder --> nmap (process group)
//!                                                   stdout | stderr
//!                                       ProgressHeuristic   XmlCapture --> NmapXmlParser
//!                                                         |
//!                                              broadcast<ScanEvent>
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod job;
pub mod manager;
pub mod parser;
pub mod process;
pub mod progress;
pub mod target;

// --- 주요 타입 re-export ---

// 매니저
pub use manager::{ScanManager, ScanManagerBuilder};

// 설정
pub use config::{ScanEngineConfig, ScanEngineConfigBuilder};

// 에러
pub use error::ScanEngineError;

// 작업
pub use job::{JobSnapshot, JobStatus, ScanJob};

// 명령줄
pub use command::{CommandBuilder, ScanCommand, validate_port_range};

// 파서
pub use parser::script::{Nbstat, ScriptInterpreter, SmbOsDiscovery};
pub use parser::{NmapXmlParser, ResultParser};

// 진행률
pub use progress::{Band, PhaseProfile, ProgressHeuristic};

// 프로세스
pub use process::signal::{ProcessGroup, SuspendableProcess};
pub use process::{ControlRequest, NmapProcessController, ProgressReporter, RunOutcome, ScanRunner};

// 대상
pub use target::{ParsedTargets, Target, classify_target, normalize_targets, parse_targets};
