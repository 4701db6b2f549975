//! 프로세스 컨트롤러: 외부 스캐너 프로세스 하나의 전체 수명 주기
//!
//! [`NmapProcessController`]는 명령을 만들어 프로세스를 실행하고,
//! stdout/stderr를 별도 태스크에서 동시에 읽으며, 제어 요청(일시정지/재개/중지)을
//! 프로세스 그룹 시그널로 전달합니다.
//!
//! # 출력 처리
//!
//! - stdout: XML 선언부터 `</nmaprun>`까지 캡처, 모든 줄을 진행률 휴리스틱에 전달
//! - stderr: 경고 수준 진행 이벤트로 보고, 작업 상태에는 영향 없음
//! - XML이 아닌 줄은 진단용 transcript에 보존
//!
//! # 종료 처리
//!
//! - XML 문서가 끝난 뒤 `exit_grace` 안에 종료하지 않으면 정상 종료를 요청
//! - 중지: SIGTERM + SIGCONT, `stop_timeout` 대기, 초과 시 SIGKILL
//! - 종료 후 `drain_timeout` 동안 남은 출력을 읽고, 넘으면 reader 태스크를 중단
//!
//! 프로세스 핸들과 reader 태스크는 모든 반환 경로에서 정리됩니다.

pub mod capture;
pub mod signal;

use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use scanwarden_core::types::{ScanConfig, ScanResult};

use crate::command::{CommandBuilder, ScanCommand};
use crate::config::ScanEngineConfig;
use crate::error::ScanEngineError;
use crate::parser::{NmapXmlParser, ResultParser};
use crate::progress::ProgressHeuristic;

use self::capture::{CaptureState, Transcript, XmlCapture};
use self::signal::{ProcessGroup, SuspendableProcess};

/// 진행 상태 텍스트 최대 길이 (문자)
const MAX_STATUS_CHARS: usize = 100;

/// reader → 컨트롤러 줄 채널 용량
const LINE_CHANNEL_CAPACITY: usize = 256;

/// 제어 요청
///
/// 일시정지/재개는 시그널 전달 결과를 응답 채널로 돌려받습니다.
#[derive(Debug)]
pub enum ControlRequest {
    /// 일시정지
    Pause {
        /// 시그널 전달 결과
        reply: oneshot::Sender<Result<(), ScanEngineError>>,
    },
    /// 재개
    Resume {
        /// 시그널 전달 결과
        reply: oneshot::Sender<Result<(), ScanEngineError>>,
    },
    /// 중지 (정상 종료 후 강제 종료)
    Stop,
}

/// 실행 결과
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// 프로세스가 끝나고 결과가 만들어짐 (결과 상태는 error일 수 있음)
    Finished(ScanResult),
    /// 중지 요청으로 종료됨
    Stopped,
}

/// 진행 보고 콜백
///
/// 출력 순서대로 호출됩니다. 구현체는 스레드 안전해야 합니다.
pub trait ProgressReporter: Send + Sync {
    /// 휴리스틱 진행률 갱신
    fn progress(&self, percent: u8, status: &str);

    /// stderr 줄
    fn warning(&self, line: &str);

    /// XML이 아닌 stdout 줄
    fn output(&self, _line: &str) {}
}

/// 스캔 실행기 trait
///
/// 매니저는 이 trait을 통해 작업을 실행합니다. 테스트는 가짜 실행기를 주입합니다.
pub trait ScanRunner: Send + Sync + 'static {
    /// 스캔 하나를 끝까지 실행합니다.
    ///
    /// `control`로 들어오는 요청을 처리하며, 진행 상황은 `reporter`로 보고합니다.
    fn run(
        &self,
        config: ScanConfig,
        control: mpsc::Receiver<ControlRequest>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> impl Future<Output = Result<RunOutcome, ScanEngineError>> + Send;
}

/// 출력 스트림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

#[derive(Debug)]
struct StreamLine {
    kind: StreamKind,
    line: String,
}

/// drop 시 reader 태스크를 중단하는 핸들 묶음
struct ReaderTasks(Vec<JoinHandle<()>>);

impl Drop for ReaderTasks {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// nmap 프로세스 컨트롤러
pub struct NmapProcessController {
    config: ScanEngineConfig,
    builder: CommandBuilder,
    parser: Arc<dyn ResultParser>,
}

impl NmapProcessController {
    /// 엔진 설정으로 컨트롤러를 생성합니다.
    pub fn new(config: ScanEngineConfig) -> Self {
        let builder = CommandBuilder::new(config.nmap_path.clone());
        let parser = Arc::new(NmapXmlParser::new().with_max_bytes(config.max_xml_bytes));
        Self {
            config,
            builder,
            parser,
        }
    }

    /// 결과 파서를 교체합니다.
    pub fn with_parser(mut self, parser: Arc<dyn ResultParser>) -> Self {
        self.parser = parser;
        self
    }

    /// 명령 빌더
    pub fn builder(&self) -> &CommandBuilder {
        &self.builder
    }

    fn spawn(&self, command: &ScanCommand) -> Result<Child, ScanEngineError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn().map_err(|source| ScanEngineError::Spawn {
            program: command.program.clone(),
            source,
        })
    }

    async fn execute(
        &self,
        config: ScanConfig,
        mut control: mpsc::Receiver<ControlRequest>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<RunOutcome, ScanEngineError> {
        let scan_id = config.scan_id.clone().unwrap_or_default();
        let command = self.builder.build(&config)?;
        let heuristic = ProgressHeuristic::for_scan_type(config.scan_type);

        info!(scan_id = %scan_id, command = %command, "spawning scanner");
        let mut child = self.spawn(&command)?;
        let spawned_at = SystemTime::now();
        let group = ProcessGroup::new(child.id().unwrap_or_default());
        debug!(scan_id = %scan_id, pgid = group.pgid(), "scanner started");

        let (line_tx, mut line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let mut readers = Vec::with_capacity(2);
        match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => {
                readers.push(tokio::spawn(read_lines(
                    stdout,
                    StreamKind::Stdout,
                    line_tx.clone(),
                )));
                readers.push(tokio::spawn(read_lines(
                    stderr,
                    StreamKind::Stderr,
                    line_tx,
                )));
            }
            _ => {
                let _ = child.start_kill();
                return Err(ScanEngineError::Stream(
                    "scanner output pipes unavailable".to_owned(),
                ));
            }
        }
        let _readers = ReaderTasks(readers);

        let mut capture = XmlCapture::new(self.config.max_xml_bytes);
        let mut transcript = Transcript::new(self.config.max_transcript_bytes);
        let mut progress = 0u8;

        let mut exit_status: Option<ExitStatus> = None;
        let mut streams_open = true;
        let mut control_open = true;
        let mut stop_requested = false;

        let mut grace_at: Option<Instant> = None;
        let mut kill_at: Option<Instant> = None;
        let mut drain_at: Option<Instant> = None;

        loop {
            if exit_status.is_some() && !streams_open {
                break;
            }

            tokio::select! {
                maybe_line = line_rx.recv(), if streams_open => match maybe_line {
                    Some(StreamLine { kind: StreamKind::Stdout, line }) => {
                        let is_xml = capture.push_line(&line);
                        if !is_xml {
                            transcript.push_line(&line);
                            reporter.output(&line);
                        }
                        if let Some(next) = heuristic.estimate(&line, progress) {
                            progress = next;
                            reporter.progress(progress, &status_text(&line));
                        }
                        if capture.state() == CaptureState::Complete && grace_at.is_none() {
                            grace_at = Some(Instant::now() + self.config.exit_grace());
                        }
                    }
                    Some(StreamLine { kind: StreamKind::Stderr, line }) => {
                        transcript.push_line(&line);
                        reporter.warning(&status_text(&line));
                    }
                    None => streams_open = false,
                },

                status = child.wait(), if exit_status.is_none() => match status {
                    Ok(status) => {
                        debug!(scan_id = %scan_id, status = %status, "scanner exited");
                        exit_status = Some(status);
                        drain_at = Some(Instant::now() + self.config.drain_timeout());
                    }
                    Err(e) => {
                        let _ = group.kill();
                        let _ = child.start_kill();
                        return Err(ScanEngineError::Stream(format!(
                            "failed to wait for scanner: {e}"
                        )));
                    }
                },

                request = control.recv(), if control_open => match request {
                    Some(ControlRequest::Pause { reply }) => {
                        let result = group.suspend();
                        if let Err(e) = &result {
                            warn!(scan_id = %scan_id, error = %e, "failed to pause scanner");
                        }
                        let _ = reply.send(result);
                    }
                    Some(ControlRequest::Resume { reply }) => {
                        let result = group.resume();
                        if let Err(e) = &result {
                            warn!(scan_id = %scan_id, error = %e, "failed to resume scanner");
                        }
                        let _ = reply.send(result);
                    }
                    Some(ControlRequest::Stop) if !stop_requested => {
                        stop_requested = true;
                        if exit_status.is_none() && kill_at.is_none() {
                            info!(scan_id = %scan_id, "stopping scanner");
                            kill_at = Some(self.begin_terminate(&group, &mut child));
                        }
                    }
                    Some(ControlRequest::Stop) => {}
                    None => control_open = false,
                },

                _ = sleep_until(grace_at.unwrap_or_else(Instant::now)),
                    if grace_at.is_some() && kill_at.is_none() && exit_status.is_none() =>
                {
                    debug!(scan_id = %scan_id, "scanner still running after xml end, terminating");
                    grace_at = None;
                    kill_at = Some(self.begin_terminate(&group, &mut child));
                }

                _ = sleep_until(kill_at.unwrap_or_else(Instant::now)),
                    if kill_at.is_some() && exit_status.is_none() =>
                {
                    warn!(scan_id = %scan_id, "graceful stop timed out, killing scanner");
                    metrics::counter!(scanwarden_core::metrics::SCAN_KILL_ESCALATIONS_TOTAL)
                        .increment(1);
                    if let Err(e) = group.kill() {
                        debug!(scan_id = %scan_id, error = %e, "group kill failed");
                    }
                    let _ = child.start_kill();
                    kill_at = None;
                }

                _ = sleep_until(drain_at.unwrap_or_else(Instant::now)),
                    if drain_at.is_some() && streams_open =>
                {
                    warn!(scan_id = %scan_id, "output streams still open after exit, abandoning");
                    streams_open = false;
                }
            }
        }

        if stop_requested {
            info!(scan_id = %scan_id, "scanner stopped");
            return Ok(RunOutcome::Stopped);
        }

        let status_desc = exit_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_owned());

        if capture.state() == CaptureState::Overflow {
            let reason = format!(
                "xml output exceeded {} bytes (exit status: {status_desc})",
                self.config.max_xml_bytes
            );
            warn!(scan_id = %scan_id, reason = %reason, "discarding scan output");
            return Ok(RunOutcome::Finished(
                ScanResult::failed(scan_id, transcript.into_string(), reason)
                    .with_start_time_or(spawned_at),
            ));
        }

        if transcript.is_truncated() {
            debug!(scan_id = %scan_id, "diagnostic transcript truncated");
        }

        match capture.into_xml() {
            Some(xml) => {
                if exit_status.is_some_and(|s| !s.success()) {
                    warn!(scan_id = %scan_id, status = %status_desc, "scanner exited with failure status");
                }
                Ok(RunOutcome::Finished(
                    self.parser
                        .parse(&scan_id, &xml)
                        .with_start_time_or(spawned_at),
                ))
            }
            None => {
                let reason = format!("scanner produced no xml output (exit status: {status_desc})");
                warn!(scan_id = %scan_id, reason = %reason, "no scan output");
                Ok(RunOutcome::Finished(
                    ScanResult::failed(scan_id, transcript.into_string(), reason)
                        .with_start_time_or(spawned_at),
                ))
            }
        }
    }

    /// 정상 종료를 요청하고 강제 종료 시각을 반환합니다.
    fn begin_terminate(&self, group: &ProcessGroup, child: &mut Child) -> Instant {
        if let Err(e) = group.terminate() {
            // 그룹 시그널이 없는 플랫폼은 직계 자식만 종료
            debug!(error = %e, "group terminate failed, killing child");
            let _ = child.start_kill();
        }
        Instant::now() + self.config.stop_timeout()
    }
}

impl ScanRunner for NmapProcessController {
    async fn run(
        &self,
        config: ScanConfig,
        control: mpsc::Receiver<ControlRequest>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<RunOutcome, ScanEngineError> {
        self.execute(config, control, reporter).await
    }
}

/// 스트림을 줄 단위로 읽어 채널로 보냅니다. 잘못된 UTF-8은 대체 문자로 바꿉니다.
async fn read_lines<R>(stream: R, kind: StreamKind, tx: mpsc::Sender<StreamLine>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_owned();
                if tx.send(StreamLine { kind, line }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(stream = ?kind, error = %e, "failed to read scanner output");
                break;
            }
        }
    }
}

fn status_text(line: &str) -> String {
    line.trim().chars().take(MAX_STATUS_CHARS).collect()
}
