//! 스캔 매니저: 작업 큐와 단일 워커
//!
//! [`ScanManager`]는 core의 [`Pipeline`] trait을 구현하여 시작/정지/상태 점검
//! 생명주기를 제공합니다.
//!
//! # 내부 아키텍처
//!
//! ```text
//! submit() --> JobTable.queue (FIFO) --notify--> worker loop
//!                    |                               |
//!                    |                          ScanRunner::run()
//!                    |                               |
//!          pause/resume/stop --ControlRequest--> 실행 중인 작업
//!                    |                               |
//!                    +------ broadcast<ScanEvent> <--+
//! ```
//!
//! 작업 테이블(작업 맵, 대기열, 활성 작업)은 하나의 뮤텍스로만 보호합니다.
//! 이벤트는 상태 변경과 같은 잠금 구간에서 발행되므로, 한 작업의 이벤트 순서는
//! 상태 전이 순서와 같습니다.
//!
//! # 재시작 제한
//!
//! `stop()` 후에는 새 인스턴스를 만들어야 합니다.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::{Notify, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use scanwarden_core::error::{PipelineError, ScanwardenError};
use scanwarden_core::event::{ProgressLevel, ScanEvent};
use scanwarden_core::metrics as m;
use scanwarden_core::pipeline::{HealthStatus, Pipeline};
use scanwarden_core::types::{ScanConfig, ScanResult, ScanType};

use crate::command::CommandBuilder;
use crate::config::ScanEngineConfig;
use crate::error::ScanEngineError;
use crate::job::{JobSnapshot, JobStatus, ScanJob};
use crate::process::{
    ControlRequest, NmapProcessController, ProgressReporter, RunOutcome, ScanRunner,
};

/// 매니저 → 실행기 제어 채널 용량
const CONTROL_CHANNEL_CAPACITY: usize = 8;

/// 매니저 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 실행 중인 작업과 제어 채널
struct ActiveJob {
    id: String,
    control: mpsc::Sender<ControlRequest>,
}

/// 뮤텍스로 보호되는 작업 테이블
#[derive(Default)]
struct JobTable {
    jobs: HashMap<String, ScanJob>,
    /// 제출 순서
    order: VecDeque<String>,
    /// 대기 중인 작업 ID (FIFO)
    queue: VecDeque<String>,
    active: Option<ActiveJob>,
    /// 종료 후 제출 거부
    closed: bool,
}

impl JobTable {
    fn get(&self, id: &str) -> Result<&ScanJob, ScanEngineError> {
        self.jobs
            .get(id)
            .ok_or_else(|| ScanEngineError::JobNotFound(id.to_owned()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut ScanJob, ScanEngineError> {
        self.jobs
            .get_mut(id)
            .ok_or_else(|| ScanEngineError::JobNotFound(id.to_owned()))
    }

    fn active_control(&self, id: &str) -> Option<mpsc::Sender<ControlRequest>> {
        self.active
            .as_ref()
            .filter(|active| active.id == id)
            .map(|active| active.control.clone())
    }

    /// 종료된 작업이 `limit`을 넘으면 오래된 것부터 제거합니다. 0이면 무제한.
    fn evict_history(&mut self, limit: usize) {
        if limit == 0 {
            return;
        }

        let active_id = self.active.as_ref().map(|active| active.id.clone());
        let is_evictable = |jobs: &HashMap<String, ScanJob>, id: &String| {
            active_id.as_ref() != Some(id)
                && jobs.get(id).is_some_and(|job| job.status().is_terminal())
        };

        let terminal = self
            .order
            .iter()
            .filter(|id| is_evictable(&self.jobs, *id))
            .count();
        let mut excess = terminal.saturating_sub(limit);
        if excess == 0 {
            return;
        }

        let jobs = &mut self.jobs;
        self.order.retain(|id| {
            if excess > 0 && is_evictable(&*jobs, id) {
                jobs.remove(id);
                excess -= 1;
                debug!(job_id = %id, "evicted finished job from history");
                false
            } else {
                true
            }
        });
    }
}

/// 매니저와 워커가 공유하는 상태
struct Shared {
    table: Mutex<JobTable>,
    events: broadcast::Sender<ScanEvent>,
    wakeup: Notify,
    history_limit: usize,
}

impl Shared {
    /// 작업 테이블을 잠급니다. 패닉으로 오염된 잠금도 그대로 사용합니다.
    fn lock(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ScanEvent) {
        trace!(job_id = %event.job_id, event_type = event.kind.event_type(), "publishing scan event");
        // 구독자가 없으면 버려짐
        let _ = self.events.send(event);
    }
}

fn record_queue_depth(depth: usize) {
    metrics::gauge!(m::SCAN_QUEUE_DEPTH).set(depth as f64);
}

/// 스캔 매니저
///
/// 제출된 작업을 FIFO 대기열에 넣고, 워커 하나가 한 번에 하나씩 실행합니다.
/// 실행은 [`ScanRunner`]에 위임하므로 테스트에서는 가짜 실행기를 주입할 수 있습니다.
pub struct ScanManager<R: ScanRunner> {
    config: ScanEngineConfig,
    state: ManagerState,
    runner: Arc<R>,
    shared: Arc<Shared>,
    /// 제출 시 구성 검증용
    builder: CommandBuilder,
    cancel: CancellationToken,
    /// 백그라운드 태스크 핸들
    tasks: Vec<JoinHandle<()>>,
}

impl ScanManager<NmapProcessController> {
    /// nmap 프로세스 컨트롤러를 실행기로 사용하는 매니저를 생성합니다.
    pub fn nmap(
        config: ScanEngineConfig,
    ) -> Result<(Self, broadcast::Receiver<ScanEvent>), ScanEngineError> {
        let runner = NmapProcessController::new(config.clone());
        ScanManagerBuilder::new().config(config).runner(runner).build()
    }
}

impl<R: ScanRunner> ScanManager<R> {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            ManagerState::Initialized => "initialized",
            ManagerState::Running => "running",
            ManagerState::Stopped => "stopped",
        }
    }

    /// 엔진 설정
    pub fn config(&self) -> &ScanEngineConfig {
        &self.config
    }

    /// 새 이벤트 구독자를 만듭니다. 구독 이후의 이벤트만 받습니다.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.shared.events.subscribe()
    }

    /// 작업을 제출하고 작업 ID를 즉시 반환합니다.
    ///
    /// 매니저가 시작되기 전에도 제출할 수 있으며, 작업은 시작 후 실행됩니다.
    ///
    /// # Errors
    ///
    /// - 대상이 비었거나 설정이 잘못되면 구성 에러 (대기열은 변하지 않음)
    /// - 매니저가 정지되었으면 `ScanEngineError::ShutDown`
    pub fn submit(&self, config: ScanConfig) -> Result<String, ScanEngineError> {
        self.builder.build(&config)?;

        let id = uuid::Uuid::new_v4().to_string();
        let scan_type = config.scan_type;
        let targets = config.targets.len();
        {
            let mut table = self.shared.lock();
            if table.closed {
                return Err(ScanEngineError::ShutDown);
            }
            table.jobs.insert(id.clone(), ScanJob::new(id.clone(), config));
            table.order.push_back(id.clone());
            table.queue.push_back(id.clone());
            record_queue_depth(table.queue.len());
            self.shared.publish(ScanEvent::queued(&id));
        }

        metrics::counter!(m::SCAN_JOBS_SUBMITTED_TOTAL, m::LABEL_SCAN_TYPE => scan_type.to_string())
            .increment(1);
        info!(job_id = %id, scan_type = %scan_type, targets, "scan job queued");
        self.shared.wakeup.notify_one();
        Ok(id)
    }

    /// 실행 중인 작업을 일시정지합니다.
    ///
    /// # Errors
    ///
    /// - 작업이 없으면 `JobNotFound`
    /// - Running이 아니면 `InvalidTransition`
    /// - 시그널 전달 실패 시 해당 에러 (작업 상태는 유지)
    pub async fn pause_job(&self, id: &str) -> Result<(), ScanEngineError> {
        self.signal_job(
            id,
            JobStatus::Running,
            JobStatus::Paused,
            "pause",
            |reply| ControlRequest::Pause { reply },
        )
        .await
    }

    /// 일시정지된 작업을 재개합니다.
    ///
    /// # Errors
    ///
    /// - 작업이 없으면 `JobNotFound`
    /// - Paused가 아니면 `InvalidTransition`
    /// - 시그널 전달 실패 시 해당 에러 (작업 상태는 유지)
    pub async fn resume_job(&self, id: &str) -> Result<(), ScanEngineError> {
        self.signal_job(
            id,
            JobStatus::Paused,
            JobStatus::Running,
            "resume",
            |reply| ControlRequest::Resume { reply },
        )
        .await
    }

    async fn signal_job(
        &self,
        id: &str,
        from: JobStatus,
        to: JobStatus,
        action: &'static str,
        request: fn(oneshot::Sender<Result<(), ScanEngineError>>) -> ControlRequest,
    ) -> Result<(), ScanEngineError> {
        let invalid = |state: JobStatus| ScanEngineError::InvalidTransition {
            job_id: id.to_owned(),
            state: state.as_str(),
            action,
        };

        let control = {
            let table = self.shared.lock();
            let status = table.get(id)?.status();
            if status != from {
                return Err(invalid(status));
            }
            table.active_control(id).ok_or_else(|| invalid(status))?
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        control
            .send(request(reply_tx))
            .await
            .map_err(|_| ScanEngineError::Channel(format!("job {id} is no longer running")))?;
        let delivered = reply_rx
            .await
            .map_err(|_| ScanEngineError::Channel(format!("job {id} finished before {action}")))?;
        delivered?;

        let mut table = self.shared.lock();
        let job = table.get_mut(id)?;
        // 그 사이 중지되었으면 전이하지 않음
        if job.status() == from {
            job.transition(to, action)?;
            let event = if to == JobStatus::Paused {
                ScanEvent::paused(id)
            } else {
                ScanEvent::resumed(id)
            };
            self.shared.publish(event);
            info!(job_id = %id, action, "scan job signalled");
        }
        Ok(())
    }

    /// 작업을 중지합니다.
    ///
    /// - Pending: 대기열에서 빼고 바로 Stopped
    /// - Running/Paused: Stopped로 전이하고 프로세스 종료를 요청합니다.
    ///   `stopped` 이벤트는 남은 출력이 정리된 뒤 워커가 발행합니다.
    /// - 종료 상태: 아무것도 하지 않음
    ///
    /// # Errors
    ///
    /// 작업이 없으면 `JobNotFound`
    pub async fn stop_job(&self, id: &str) -> Result<(), ScanEngineError> {
        let control = {
            let mut table = self.shared.lock();
            let status = table.get(id)?.status();

            if status.is_terminal() {
                debug!(job_id = %id, status = %status, "stop ignored for finished job");
                return Ok(());
            }

            table.get_mut(id)?.transition(JobStatus::Stopped, "stop")?;

            if status == JobStatus::Pending {
                table.queue.retain(|queued| queued != id);
                record_queue_depth(table.queue.len());
                self.shared.publish(ScanEvent::stopped(id));
                metrics::counter!(m::SCAN_JOBS_STOPPED_TOTAL).increment(1);
                info!(job_id = %id, "queued scan job cancelled");
                table.evict_history(self.shared.history_limit);
                return Ok(());
            }

            table.active_control(id)
        };

        match control {
            Some(control) => {
                if control.send(ControlRequest::Stop).await.is_err() {
                    debug!(job_id = %id, "runner already finished");
                }
                info!(job_id = %id, "stop requested");
            }
            None => warn!(job_id = %id, "running job has no control channel"),
        }
        Ok(())
    }

    /// 작업 상태 스냅샷
    ///
    /// # Errors
    ///
    /// 작업이 없으면 `JobNotFound`
    pub fn status(&self, id: &str) -> Result<JobSnapshot, ScanEngineError> {
        Ok(self.shared.lock().get(id)?.snapshot())
    }

    /// 작업 결과. Completed가 아니면 `None`.
    ///
    /// # Errors
    ///
    /// 작업이 없으면 `JobNotFound`
    pub fn result(&self, id: &str) -> Result<Option<ScanResult>, ScanEngineError> {
        Ok(self.shared.lock().get(id)?.result().cloned())
    }

    /// 대기 중인 작업 수
    pub fn queue_depth(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// 실행 중인 작업 ID
    pub fn active_job(&self) -> Option<String> {
        self.shared
            .lock()
            .active
            .as_ref()
            .map(|active| active.id.clone())
    }

    /// 보존 중인 모든 작업 (제출 순서)
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        let table = self.shared.lock();
        table
            .order
            .iter()
            .filter_map(|id| table.jobs.get(id))
            .map(ScanJob::snapshot)
            .collect()
    }
}

impl<R: ScanRunner> Pipeline for ScanManager<R> {
    async fn start(&mut self) -> Result<(), ScanwardenError> {
        match self.state {
            ManagerState::Running => return Err(PipelineError::AlreadyRunning.into()),
            ManagerState::Stopped => {
                return Err(PipelineError::InitFailed(
                    "scan manager cannot be restarted after stop".to_owned(),
                )
                .into());
            }
            ManagerState::Initialized => {}
        }

        info!(queued = self.queue_depth(), "starting scan manager");

        let shared = Arc::clone(&self.shared);
        let runner = Arc::clone(&self.runner);
        let cancel = self.cancel.clone();
        self.tasks
            .push(tokio::spawn(worker_loop(shared, runner, cancel)));

        self.state = ManagerState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ScanwardenError> {
        if self.state != ManagerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping scan manager");

        let active = {
            let mut table = self.shared.lock();
            table.closed = true;
            let queued: Vec<String> = table.queue.drain(..).collect();
            for id in &queued {
                if let Some(job) = table.jobs.get_mut(id) {
                    if job.transition(JobStatus::Stopped, "stop").is_ok() {
                        self.shared.publish(ScanEvent::stopped(id));
                        metrics::counter!(m::SCAN_JOBS_STOPPED_TOTAL).increment(1);
                    }
                }
            }
            record_queue_depth(0);
            if !queued.is_empty() {
                info!(count = queued.len(), "queued scan jobs cancelled");
            }
            table.active.as_ref().map(|active| active.id.clone())
        };

        if let Some(id) = active {
            if let Err(e) = self.stop_job(&id).await {
                warn!(job_id = %id, error = %e, "failed to stop active job");
            }
        }

        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "scan worker task failed");
            }
        }

        self.state = ManagerState::Stopped;
        info!("scan manager stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            ManagerState::Running => {
                if self.tasks.iter().any(JoinHandle::is_finished) {
                    HealthStatus::Unhealthy("scan worker exited".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            ManagerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            ManagerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 스캔 매니저 빌더
///
/// 빌드 시 이벤트 수신 채널을 함께 반환합니다.
pub struct ScanManagerBuilder<R: ScanRunner> {
    config: ScanEngineConfig,
    runner: Option<R>,
}

impl<R: ScanRunner> ScanManagerBuilder<R> {
    /// 기본 설정으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ScanEngineConfig::default(),
            runner: None,
        }
    }

    /// 엔진 설정
    pub fn config(mut self, config: ScanEngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 스캔 실행기
    pub fn runner(mut self, runner: R) -> Self {
        self.runner = Some(runner);
        self
    }

    /// 이벤트 채널 용량
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// 보존할 종료 작업 수
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    /// 매니저와 이벤트 수신 채널을 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정 검증 실패 또는 실행기 누락 시 구성 에러
    pub fn build(
        self,
    ) -> Result<(ScanManager<R>, broadcast::Receiver<ScanEvent>), ScanEngineError> {
        self.config.validate()?;
        let runner = self
            .runner
            .ok_or_else(|| ScanEngineError::config("runner", "scan runner is not set"))?;

        let (events, event_rx) = broadcast::channel(self.config.event_channel_capacity);
        let shared = Arc::new(Shared {
            table: Mutex::new(JobTable::default()),
            events,
            wakeup: Notify::new(),
            history_limit: self.config.history_limit,
        });

        let manager = ScanManager {
            builder: CommandBuilder::new(self.config.nmap_path.clone()),
            config: self.config,
            state: ManagerState::Initialized,
            runner: Arc::new(runner),
            shared,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        };

        Ok((manager, event_rx))
    }
}

impl<R: ScanRunner> Default for ScanManagerBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// 작업 하나의 진행 보고를 작업 테이블로 전달
struct JobReporter {
    shared: Arc<Shared>,
    job_id: String,
}

impl ProgressReporter for JobReporter {
    fn progress(&self, percent: u8, status: &str) {
        let mut table = self.shared.lock();
        let Some(job) = table.jobs.get_mut(&self.job_id) else {
            return;
        };
        // 중지 요청 이후의 진행률은 버림
        if !job.status().is_active() {
            return;
        }
        if job.advance_progress(percent) {
            self.shared.publish(ScanEvent::progress(
                &self.job_id,
                job.progress(),
                status,
                ProgressLevel::Info,
            ));
        }
    }

    fn warning(&self, line: &str) {
        let table = self.shared.lock();
        let Some(job) = table.jobs.get(&self.job_id) else {
            return;
        };
        if !job.status().is_active() {
            return;
        }
        debug!(job_id = %self.job_id, line, "scanner stderr");
        self.shared.publish(ScanEvent::progress(
            &self.job_id,
            job.progress(),
            line,
            ProgressLevel::Warning,
        ));
    }

    fn output(&self, line: &str) {
        trace!(job_id = %self.job_id, line, "scanner output");
    }
}

async fn worker_loop<R: ScanRunner>(
    shared: Arc<Shared>,
    runner: Arc<R>,
    cancel: CancellationToken,
) {
    info!("scan worker started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let next = {
            let mut table = shared.lock();
            start_next(&shared, &mut table)
        };

        match next {
            Some((id, config, control)) => {
                run_job(&shared, &runner, id, config, control).await;
            }
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = shared.wakeup.notified() => {}
                }
            }
        }
    }

    info!("scan worker stopped");
}

/// 대기열에서 다음 Pending 작업을 꺼내 Running으로 전이합니다.
fn start_next(
    shared: &Shared,
    table: &mut JobTable,
) -> Option<(String, ScanConfig, mpsc::Receiver<ControlRequest>)> {
    while let Some(id) = table.queue.pop_front() {
        let Some(job) = table.jobs.get_mut(&id) else {
            continue;
        };
        if job.status() != JobStatus::Pending {
            continue;
        }
        if let Err(e) = job.transition(JobStatus::Running, "start") {
            warn!(job_id = %id, error = %e, "failed to start job");
            continue;
        }
        let config = job.config().clone();

        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        table.active = Some(ActiveJob {
            id: id.clone(),
            control: control_tx,
        });
        record_queue_depth(table.queue.len());
        shared.publish(ScanEvent::started(&id, config.clone()));
        return Some((id, config, control_rx));
    }

    record_queue_depth(0);
    None
}

async fn run_job<R: ScanRunner>(
    shared: &Arc<Shared>,
    runner: &Arc<R>,
    id: String,
    config: ScanConfig,
    control: mpsc::Receiver<ControlRequest>,
) {
    let started = Instant::now();
    let scan_type = config.scan_type;
    info!(job_id = %id, scan_type = %scan_type, "scan job started");

    let reporter: Arc<dyn ProgressReporter> = Arc::new(JobReporter {
        shared: Arc::clone(shared),
        job_id: id.clone(),
    });
    let task_runner = Arc::clone(runner);
    // 실행기 패닉이 워커를 중단시키지 않도록 별도 태스크에서 실행
    let handle = tokio::spawn(async move { task_runner.run(config, control, reporter).await });
    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(e) => Err(ScanEngineError::Runner(format!("scan task aborted: {e}"))),
    };

    finish_job(shared, &id, scan_type, outcome);
    metrics::histogram!(m::SCAN_JOB_DURATION_SECONDS, m::LABEL_SCAN_TYPE => scan_type.to_string())
        .record(started.elapsed().as_secs_f64());
}

/// 실행 결과를 작업에 반영하고 종료 이벤트를 정확히 한 번 발행합니다.
fn finish_job(
    shared: &Shared,
    id: &str,
    scan_type: ScanType,
    outcome: Result<RunOutcome, ScanEngineError>,
) {
    let scan_type = scan_type.to_string();
    let mut table = shared.lock();
    table.active = None;

    let Some(job) = table.jobs.get_mut(id) else {
        warn!(job_id = %id, "finished job missing from table");
        return;
    };

    if job.status() == JobStatus::Stopped {
        // 중지 요청 시점에 이미 전이됨, 결과는 저장하지 않음
        info!(job_id = %id, "scan job stopped");
        metrics::counter!(m::SCAN_JOBS_STOPPED_TOTAL, m::LABEL_SCAN_TYPE => scan_type)
            .increment(1);
        shared.publish(ScanEvent::stopped(id));
    } else {
        match outcome {
            Ok(RunOutcome::Finished(result)) => {
                let label = result.status.to_string();
                let hosts = result.hosts.len();
                let event = ScanEvent::completed(id, result.clone());
                match job.complete(result) {
                    Ok(()) => {
                        info!(job_id = %id, hosts, result = %label, "scan job completed");
                        metrics::counter!(
                            m::SCAN_JOBS_COMPLETED_TOTAL,
                            m::LABEL_SCAN_TYPE => scan_type,
                            m::LABEL_RESULT => label
                        )
                        .increment(1);
                        shared.publish(event);
                    }
                    Err(e) => warn!(job_id = %id, error = %e, "failed to complete job"),
                }
            }
            Ok(RunOutcome::Stopped) => match job.transition(JobStatus::Stopped, "stop") {
                Ok(()) => {
                    info!(job_id = %id, "scan job stopped by runner");
                    metrics::counter!(m::SCAN_JOBS_STOPPED_TOTAL, m::LABEL_SCAN_TYPE => scan_type)
                        .increment(1);
                    shared.publish(ScanEvent::stopped(id));
                }
                Err(e) => warn!(job_id = %id, error = %e, "failed to stop job"),
            },
            Err(e) => {
                let reason = e.to_string();
                match job.fail(reason.clone()) {
                    Ok(()) => {
                        warn!(job_id = %id, error = %reason, "scan job failed");
                        metrics::counter!(m::SCAN_JOBS_FAILED_TOTAL, m::LABEL_SCAN_TYPE => scan_type)
                            .increment(1);
                        shared.publish(ScanEvent::failed(id, reason));
                    }
                    Err(e) => warn!(job_id = %id, error = %e, "failed to record job failure"),
                }
            }
        }
    }

    table.evict_history(shared.history_limit);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use scanwarden_core::event::ScanEventKind;
    use scanwarden_core::types::ResultStatus;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::parser::{NmapXmlParser, ResultParser};

    const ONE_HOST_XML: &str = r#"<?xml version="1.0"?>
<nmaprun scanner="nmap" start="1700000000" version="7.94">
<host><status state="up"/><address addr="10.0.0.1" addrtype="ipv4"/>
<ports><port protocol="tcp" portid="22"><state state="open"/><service name="ssh"/></port></ports>
</host>
<runstats><finished time="1700000010"/></runstats>
</nmaprun>"#;

    /// 가짜 실행기
    #[derive(Clone, Default)]
    struct FakeRunner {
        delay: Duration,
        progress: Vec<(u8, String)>,
        warnings: Vec<String>,
        error: Option<String>,
        panic: bool,
    }

    impl FakeRunner {
        fn new() -> Self {
            Self::default()
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn with_progress(mut self, percent: u8, status: &str) -> Self {
            self.progress.push((percent, status.to_owned()));
            self
        }

        fn with_warning(mut self, line: &str) -> Self {
            self.warnings.push(line.to_owned());
            self
        }

        fn with_error(mut self, reason: &str) -> Self {
            self.error = Some(reason.to_owned());
            self
        }

        fn with_panic(mut self) -> Self {
            self.panic = true;
            self
        }
    }

    impl ScanRunner for FakeRunner {
        async fn run(
            &self,
            config: ScanConfig,
            mut control: mpsc::Receiver<ControlRequest>,
            reporter: Arc<dyn ProgressReporter>,
        ) -> Result<RunOutcome, ScanEngineError> {
            if self.panic {
                panic!("fake runner panic");
            }
            if let Some(reason) = &self.error {
                return Err(ScanEngineError::Runner(reason.clone()));
            }

            for (percent, status) in &self.progress {
                reporter.progress(*percent, status);
            }
            for line in &self.warnings {
                reporter.warning(line);
            }

            let deadline = tokio::time::sleep(self.delay);
            tokio::pin!(deadline);
            let mut paused = false;
            let mut control_open = true;
            loop {
                tokio::select! {
                    _ = &mut deadline, if !paused => break,
                    request = control.recv(), if control_open => match request {
                        Some(ControlRequest::Pause { reply }) => {
                            paused = true;
                            let _ = reply.send(Ok(()));
                        }
                        Some(ControlRequest::Resume { reply }) => {
                            paused = false;
                            let _ = reply.send(Ok(()));
                        }
                        Some(ControlRequest::Stop) => return Ok(RunOutcome::Stopped),
                        None => control_open = false,
                    },
                    else => break,
                }
            }

            let id = config.scan_id.unwrap_or_default();
            Ok(RunOutcome::Finished(
                NmapXmlParser::new().parse(&id, ONE_HOST_XML),
            ))
        }
    }

    fn manager(runner: FakeRunner) -> (ScanManager<FakeRunner>, broadcast::Receiver<ScanEvent>) {
        ScanManagerBuilder::new().runner(runner).build().unwrap()
    }

    fn targets() -> ScanConfig {
        ScanConfig::new(["10.0.0.1"])
    }

    async fn next_event(rx: &mut broadcast::Receiver<ScanEvent>) -> ScanEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// 주어진 작업의 종료 이벤트까지 읽습니다.
    async fn until_terminal(rx: &mut broadcast::Receiver<ScanEvent>, id: &str) -> Vec<ScanEvent> {
        let mut seen = Vec::new();
        loop {
            let event = next_event(rx).await;
            let done = event.job_id == id && event.is_terminal();
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    async fn until_started(rx: &mut broadcast::Receiver<ScanEvent>, id: &str) {
        loop {
            let event = next_event(rx).await;
            if event.job_id == id && matches!(event.kind, ScanEventKind::Started { .. }) {
                return;
            }
        }
    }

    #[test]
    fn builder_requires_runner() {
        let err = ScanManagerBuilder::<FakeRunner>::new().build().err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn builder_validates_config() {
        let result = ScanManagerBuilder::new()
            .runner(FakeRunner::new())
            .event_channel_capacity(0)
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn submit_queues_job_and_publishes_event() {
        let (manager, mut rx) = manager(FakeRunner::new());
        let id = manager.submit(targets()).unwrap();

        assert_eq!(manager.queue_depth(), 1);
        assert_eq!(manager.status(&id).unwrap().status, JobStatus::Pending);
        assert_eq!(manager.status(&id).unwrap().config.scan_id.as_deref(), Some(id.as_str()));

        let event = next_event(&mut rx).await;
        assert_eq!(event.job_id, id);
        assert!(matches!(event.kind, ScanEventKind::Queued));
    }

    #[tokio::test]
    async fn empty_targets_never_enqueued() {
        let (manager, mut rx) = manager(FakeRunner::new());
        let err = manager.submit(ScanConfig::default()).unwrap_err();

        assert!(err.is_config());
        assert_eq!(manager.queue_depth(), 0);
        assert!(manager.jobs().is_empty());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn custom_command_requires_custom_type() {
        let (manager, _rx) = manager(FakeRunner::new());
        let mut config = targets().with_scan_type(ScanType::Stealth);
        config.custom_command = Some("nmap -sV 10.0.0.1".to_owned());
        let err = manager.submit(config).unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn job_runs_to_completion() {
        let (mut manager, mut rx) = manager(FakeRunner::new().with_progress(30, "Host is up"));
        manager.start().await.unwrap();
        let id = manager.submit(targets()).unwrap();

        let events = until_terminal(&mut rx, &id).await;
        let types: Vec<&str> = events.iter().map(|e| e.kind.event_type()).collect();
        assert_eq!(
            types,
            ["scan.queued", "scan.started", "scan.progress", "scan.completed"]
        );

        match &events[3].kind {
            ScanEventKind::Completed { result } => {
                assert_eq!(result.scan_id, id);
                assert_eq!(result.status, ResultStatus::Completed);
                assert_eq!(result.hosts.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let snapshot = manager.status(&id).unwrap();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.progress, 100);
        assert!(manager.result(&id).unwrap().is_some());
        assert!(manager.active_job().is_none());

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn jobs_run_one_at_a_time_in_fifo_order() {
        let (mut manager, mut rx) =
            manager(FakeRunner::new().with_delay(Duration::from_millis(20)));
        let ids: Vec<String> = (0..3).map(|_| manager.submit(targets()).unwrap()).collect();
        manager.start().await.unwrap();

        let mut lifecycle = Vec::new();
        while lifecycle.len() < 6 {
            let event = next_event(&mut rx).await;
            match event.kind {
                ScanEventKind::Started { .. } => lifecycle.push(("start", event.job_id)),
                ScanEventKind::Completed { .. } => lifecycle.push(("done", event.job_id)),
                _ => {}
            }
        }

        let expected: Vec<(&str, String)> = ids
            .iter()
            .flat_map(|id| [("start", id.clone()), ("done", id.clone())])
            .collect();
        assert_eq!(lifecycle, expected);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn runner_error_marks_job_failed() {
        let (mut manager, mut rx) = manager(FakeRunner::new().with_error("nmap not found"));
        manager.start().await.unwrap();
        let id = manager.submit(targets()).unwrap();

        let events = until_terminal(&mut rx, &id).await;
        match &events.last().unwrap().kind {
            ScanEventKind::Failed { error } => assert!(error.contains("nmap not found")),
            other => panic!("unexpected event {other:?}"),
        }

        let snapshot = manager.status(&id).unwrap();
        assert_eq!(snapshot.status, JobStatus::Error);
        assert!(snapshot.error.unwrap().contains("nmap not found"));
        assert!(manager.result(&id).unwrap().is_none());

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn runner_panic_does_not_kill_worker() {
        let (mut manager, mut rx) = manager(FakeRunner::new().with_panic());
        manager.start().await.unwrap();

        let first = manager.submit(targets()).unwrap();
        let events = until_terminal(&mut rx, &first).await;
        assert!(matches!(
            events.last().unwrap().kind,
            ScanEventKind::Failed { .. }
        ));

        let second = manager.submit(targets()).unwrap();
        until_terminal(&mut rx, &second).await;
        assert!(manager.health_check().await.is_healthy());

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn pause_and_resume_running_job() {
        let (mut manager, mut rx) = manager(FakeRunner::new().with_delay(Duration::from_secs(30)));
        manager.start().await.unwrap();
        let id = manager.submit(targets()).unwrap();
        until_started(&mut rx, &id).await;
        assert_eq!(manager.active_job().as_deref(), Some(id.as_str()));

        manager.pause_job(&id).await.unwrap();
        assert_eq!(manager.status(&id).unwrap().status, JobStatus::Paused);
        assert!(matches!(next_event(&mut rx).await.kind, ScanEventKind::Paused));

        let err = manager.pause_job(&id).await.unwrap_err();
        assert!(matches!(err, ScanEngineError::InvalidTransition { .. }));

        manager.resume_job(&id).await.unwrap();
        assert_eq!(manager.status(&id).unwrap().status, JobStatus::Running);
        assert!(matches!(next_event(&mut rx).await.kind, ScanEventKind::Resumed));

        manager.stop_job(&id).await.unwrap();
        let events = until_terminal(&mut rx, &id).await;
        assert!(matches!(events.last().unwrap().kind, ScanEventKind::Stopped));
        assert!(manager.result(&id).unwrap().is_none());

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn pause_requires_running_job() {
        let (manager, _rx) = manager(FakeRunner::new());
        let id = manager.submit(targets()).unwrap();

        let err = manager.pause_job(&id).await.unwrap_err();
        assert!(matches!(err, ScanEngineError::InvalidTransition { .. }));
        let err = manager.resume_job(&id).await.unwrap_err();
        assert!(matches!(err, ScanEngineError::InvalidTransition { .. }));
        assert_eq!(manager.status(&id).unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn stop_pending_job_removes_it_from_queue() {
        let (mut manager, mut rx) = manager(FakeRunner::new());
        let first = manager.submit(targets()).unwrap();
        let second = manager.submit(targets()).unwrap();

        manager.stop_job(&first).await.unwrap();
        assert_eq!(manager.queue_depth(), 1);
        assert_eq!(manager.status(&first).unwrap().status, JobStatus::Stopped);

        manager.start().await.unwrap();
        let events = until_terminal(&mut rx, &second).await;

        let first_events: Vec<&str> = events
            .iter()
            .filter(|e| e.job_id == first)
            .map(|e| e.kind.event_type())
            .collect();
        assert_eq!(first_events, ["scan.queued", "scan.stopped"]);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_on_finished_job_is_noop() {
        let (mut manager, mut rx) = manager(FakeRunner::new());
        manager.start().await.unwrap();
        let id = manager.submit(targets()).unwrap();
        until_terminal(&mut rx, &id).await;

        manager.stop_job(&id).await.unwrap();
        manager.stop_job(&id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(manager.status(&id).unwrap().status, JobStatus::Completed);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_job_is_reported() {
        let (manager, _rx) = manager(FakeRunner::new());
        assert!(matches!(
            manager.status("missing"),
            Err(ScanEngineError::JobNotFound(_))
        ));
        assert!(matches!(
            manager.result("missing"),
            Err(ScanEngineError::JobNotFound(_))
        ));
        assert!(matches!(
            manager.stop_job("missing").await,
            Err(ScanEngineError::JobNotFound(_))
        ));
        assert!(matches!(
            manager.pause_job("missing").await,
            Err(ScanEngineError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_warnings_flagged() {
        let runner = FakeRunner::new()
            .with_progress(30, "Host is up")
            .with_progress(20, "Starting Nmap")
            .with_progress(50, "PORT STATE SERVICE")
            .with_warning("WARNING: RST from 10.0.0.1");
        let (mut manager, mut rx) = manager(runner);
        manager.start().await.unwrap();
        let id = manager.submit(targets()).unwrap();

        let events = until_terminal(&mut rx, &id).await;
        let progress: Vec<(u8, ProgressLevel)> = events
            .iter()
            .filter_map(|e| match &e.kind {
                ScanEventKind::Progress { percent, level, .. } => Some((*percent, *level)),
                _ => None,
            })
            .collect();
        assert_eq!(
            progress,
            [
                (30, ProgressLevel::Info),
                (50, ProgressLevel::Info),
                (50, ProgressLevel::Warning),
            ]
        );

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn pipeline_lifecycle() {
        let (mut manager, _rx) = manager(FakeRunner::new());
        assert_eq!(manager.state_name(), "initialized");
        assert!(manager.health_check().await.is_unhealthy());
        assert!(manager.stop().await.is_err());

        manager.start().await.unwrap();
        assert_eq!(manager.state_name(), "running");
        assert!(manager.health_check().await.is_healthy());
        assert!(manager.start().await.is_err());

        manager.stop().await.unwrap();
        assert_eq!(manager.state_name(), "stopped");
        assert!(manager.health_check().await.is_unhealthy());
        assert!(manager.stop().await.is_err());
        assert!(manager.start().await.is_err());
    }

    #[tokio::test]
    async fn shutdown_stops_active_and_queued_jobs() {
        let (mut manager, mut rx) = manager(FakeRunner::new().with_delay(Duration::from_secs(30)));
        manager.start().await.unwrap();
        let active = manager.submit(targets()).unwrap();
        let queued = manager.submit(targets()).unwrap();
        until_started(&mut rx, &active).await;

        manager.stop().await.unwrap();

        assert_eq!(manager.status(&active).unwrap().status, JobStatus::Stopped);
        assert_eq!(manager.status(&queued).unwrap().status, JobStatus::Stopped);
        assert_eq!(manager.queue_depth(), 0);

        let mut stopped = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if matches!(event.kind, ScanEventKind::Stopped) {
                stopped.push(event.job_id);
            }
        }
        assert_eq!(stopped, [queued, active]);

        assert!(matches!(
            manager.submit(targets()),
            Err(ScanEngineError::ShutDown)
        ));
    }

    #[tokio::test]
    async fn history_limit_evicts_oldest_finished_jobs() {
        let (mut manager, mut rx) = ScanManagerBuilder::new()
            .runner(FakeRunner::new())
            .history_limit(1)
            .build()
            .unwrap();
        manager.start().await.unwrap();

        let first = manager.submit(targets()).unwrap();
        until_terminal(&mut rx, &first).await;
        let second = manager.submit(targets()).unwrap();
        until_terminal(&mut rx, &second).await;

        assert!(matches!(
            manager.status(&first),
            Err(ScanEngineError::JobNotFound(_))
        ));
        assert!(manager.status(&second).is_ok());
        assert_eq!(manager.jobs().len(), 1);

        manager.stop().await.unwrap();
    }
}
