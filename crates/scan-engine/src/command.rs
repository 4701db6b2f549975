//! 명령줄 빌더: `ScanConfig`를 nmap 실행 인자로 변환
//!
//! 플래그 순서는 고정입니다. 순서를 바꾸면 일부 플래그가 충돌합니다.
//!
//! 1. 타이밍 템플릿 (`-T4`)
//! 2. 병렬도 힌트 (`--min-parallelism N`, threads > 1 일 때만)
//! 3. 스캔 유형 플래그
//! 4. 탐지 플래그 (`-sV`, `-O`, `-sC`), 유형이 이미 포함하지 않는 것만
//! 5. 포트 범위 (`-p R`), Quick/Discovery 제외
//! 6. 대상 목록
//! 7. XML stdout 출력 (`-oX -`)
//!
//! 사용자 지정 명령(Custom + `custom_command`)은 POSIX 셸 규칙으로 토큰화하여
//! 인용된 인자를 보존하고, `-oX`가 없을 때만 XML 출력 플래그를 덧붙입니다.
//!
//! 셸을 거치지 않고 인자 벡터로 실행합니다. `Display`는 셸 인용 형태로 출력하므로
//! 출력 문자열을 다시 사용자 지정 명령으로 넣어도 같은 인자가 됩니다.

use std::borrow::Cow;
use std::fmt;

use scanwarden_core::config::{MAX_THREADS, is_timing_template};
use scanwarden_core::types::{ScanConfig, ScanType};

use crate::error::ScanEngineError;

/// 기본 실행 파일
pub const DEFAULT_PROGRAM: &str = "nmap";

/// 한 번에 스캔할 수 있는 최대 대상 수
pub const MAX_TARGETS: usize = 10_000;

/// XML 출력 플래그
const XML_FLAG: &str = "-oX";
/// XML 출력 대상 (stdout)
const XML_STDOUT: &str = "-";

/// 실행할 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCommand {
    /// 실행 파일
    pub program: String,
    /// 인자 목록
    pub args: Vec<String>,
}

impl ScanCommand {
    /// XML 출력 플래그가 포함되어 있는지 반환합니다.
    pub fn has_xml_output(&self) -> bool {
        self.args.iter().any(|arg| arg.starts_with(XML_FLAG))
    }
}

impl fmt::Display for ScanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

// NUL 바이트는 인용할 수 없으므로 원문 그대로 출력
fn quote(word: &str) -> Cow<'_, str> {
    shlex::try_quote(word).unwrap_or(Cow::Borrowed(word))
}

/// `ScanConfig` → [`ScanCommand`] 변환기
///
/// 상태가 없는 순수 변환이며, 같은 입력에는 항상 같은 명령을 반환합니다.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl CommandBuilder {
    /// 실행 파일 경로를 지정하여 빌더를 생성합니다.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// 실행 파일 경로
    pub fn program(&self) -> &str {
        &self.program
    }

    /// 스캔 설정으로 명령을 생성합니다.
    ///
    /// # Errors
    ///
    /// - 대상 목록이 비어 있으면 `ScanEngineError::EmptyTargets`
    /// - 대상, 타이밍, 병렬도, 포트 범위가 유효하지 않거나
    ///   Custom이 아닌 유형에 사용자 지정 명령이 있으면 `ScanEngineError::Config`
    pub fn build(&self, config: &ScanConfig) -> Result<ScanCommand, ScanEngineError> {
        validate_targets(&config.targets)?;

        let custom = config.effective_custom_command();
        if custom.is_some() && config.scan_type != ScanType::Custom {
            return Err(ScanEngineError::config(
                "custom_command",
                format!("only allowed with scan type 'custom', got '{}'", config.scan_type),
            ));
        }

        if let Some(custom) = custom {
            return self.build_custom(custom);
        }

        let mut args: Vec<String> = Vec::new();

        if let Some(timing) = config.timing_template.as_deref() {
            args.push(timing_flag(timing)?);
        }

        if config.threads > MAX_THREADS {
            return Err(ScanEngineError::config(
                "threads",
                format!("must be at most {MAX_THREADS}"),
            ));
        }
        if config.threads > 1 {
            args.push("--min-parallelism".to_owned());
            args.push(config.threads.to_string());
        }

        let base: &[&str] = match config.scan_type {
            ScanType::Quick => &["-F"],
            ScanType::Stealth | ScanType::Custom => &["-sS"],
            ScanType::Comprehensive => &["-sS", "-sV", "-O", "-A"],
            ScanType::Discovery => &["-sn"],
        };
        args.extend(base.iter().map(|flag| (*flag).to_owned()));

        if config.scan_type.accepts_port_options() {
            let detection = [
                (config.service_version, "-sV"),
                (config.os_detection, "-O"),
                (config.script_scan, "-sC"),
            ];
            for (enabled, flag) in detection {
                // -A 번들은 -sC를 포함
                let implied = base.contains(&flag)
                    || (flag == "-sC" && base.contains(&"-A"));
                if enabled && !implied {
                    args.push(flag.to_owned());
                }
            }

            if let Some(range) = config
                .port_range
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
            {
                validate_port_range(range)?;
                args.push("-p".to_owned());
                args.push(range.to_owned());
            }
        }

        args.extend(config.targets.iter().map(|t| t.trim().to_owned()));
        args.push(XML_FLAG.to_owned());
        args.push(XML_STDOUT.to_owned());

        Ok(ScanCommand {
            program: self.program.clone(),
            args,
        })
    }

    fn build_custom(&self, custom: &str) -> Result<ScanCommand, ScanEngineError> {
        let tokens = shlex::split(custom).ok_or_else(|| {
            ScanEngineError::config("custom_command", "unbalanced quotes or trailing escape")
        })?;
        let mut tokens = tokens.into_iter();
        let mut args: Vec<String> = Vec::new();

        let program = match tokens.next() {
            Some(first) if first == DEFAULT_PROGRAM => self.program.clone(),
            Some(first) if first.starts_with('-') => {
                args.push(first);
                self.program.clone()
            }
            Some(first) => first,
            None => self.program.clone(),
        };
        args.extend(tokens);

        let mut command = ScanCommand { program, args };
        if !command.has_xml_output() {
            command.args.push(XML_FLAG.to_owned());
            command.args.push(XML_STDOUT.to_owned());
        }
        Ok(command)
    }
}

fn validate_targets(targets: &[String]) -> Result<(), ScanEngineError> {
    if targets.is_empty() {
        return Err(ScanEngineError::EmptyTargets);
    }

    if targets.len() > MAX_TARGETS {
        return Err(ScanEngineError::config(
            "targets",
            format!("at most {MAX_TARGETS} targets per scan, got {}", targets.len()),
        ));
    }

    for target in targets {
        let trimmed = target.trim();
        if trimmed.is_empty() {
            return Err(ScanEngineError::config("targets", "target must not be blank"));
        }
        // 옵션으로 해석되는 대상 차단
        if trimmed.starts_with('-') {
            return Err(ScanEngineError::config(
                "targets",
                format!("target '{trimmed}' must not start with '-'"),
            ));
        }
    }

    Ok(())
}

fn timing_flag(timing: &str) -> Result<String, ScanEngineError> {
    let token = timing.trim().trim_start_matches('-').to_uppercase();
    if !is_timing_template(&token) {
        return Err(ScanEngineError::config(
            "timing_template",
            format!("'{timing}' is not one of T0-T5"),
        ));
    }
    Ok(format!("-{token}"))
}

/// nmap 포트 범위 표현을 검증합니다.
///
/// `22`, `1-1000`, `22,80,443`, `T:80,U:53` 형식을 허용하며 포트는 1-65535 범위여야 합니다.
pub fn validate_port_range(range: &str) -> Result<(), ScanEngineError> {
    let invalid = |reason: String| ScanEngineError::config("port_range", reason);

    for segment in range.split(',') {
        let segment = segment.trim();
        let spec = ["T:", "U:", "S:"]
            .iter()
            .find_map(|prefix| segment.strip_prefix(prefix))
            .unwrap_or(segment);

        if spec.is_empty() {
            return Err(invalid(format!("empty segment in '{range}'")));
        }

        let (low, high) = match spec.split_once('-') {
            Some((low, high)) => (parse_port(low, range)?, parse_port(high, range)?),
            None => {
                let port = parse_port(spec, range)?;
                (port, port)
            }
        };

        if low > high {
            return Err(invalid(format!("descending range '{spec}' in '{range}'")));
        }
    }

    Ok(())
}

fn parse_port(value: &str, range: &str) -> Result<u16, ScanEngineError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(ScanEngineError::config(
            "port_range",
            format!("'{value}' in '{range}' is not a port between 1 and 65535"),
        )),
    }
}
