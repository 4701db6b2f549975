//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 엔진은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `scanwarden_scan_engine_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(scanwarden_core::metrics::SCAN_JOBS_SUBMITTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 스캔 유형 레이블 키 (quick, stealth, comprehensive, discovery, custom)
pub const LABEL_SCAN_TYPE: &str = "scan_type";

/// 결과 레이블 키 (completed, error)
pub const LABEL_RESULT: &str = "result";

// ─── Scan Engine ──────────────────────────────────────────────────

/// 제출된 작업 수
pub const SCAN_JOBS_SUBMITTED_TOTAL: &str = "scanwarden_scan_engine_jobs_submitted_total";

/// 완료된 작업 수
pub const SCAN_JOBS_COMPLETED_TOTAL: &str = "scanwarden_scan_engine_jobs_completed_total";

/// 실패한 작업 수
pub const SCAN_JOBS_FAILED_TOTAL: &str = "scanwarden_scan_engine_jobs_failed_total";

/// 중지된 작업 수
pub const SCAN_JOBS_STOPPED_TOTAL: &str = "scanwarden_scan_engine_jobs_stopped_total";

/// 대기 중인 작업 수
pub const SCAN_QUEUE_DEPTH: &str = "scanwarden_scan_engine_queue_depth";

/// 작업 실행 시간
pub const SCAN_JOB_DURATION_SECONDS: &str = "scanwarden_scan_engine_job_duration_seconds";

/// XML 파싱 실패 수
pub const SCAN_PARSE_ERRORS_TOTAL: &str = "scanwarden_scan_engine_parse_errors_total";

/// 강제 종료(SIGKILL)로 승격된 중지 수
pub const SCAN_KILL_ESCALATIONS_TOTAL: &str = "scanwarden_scan_engine_kill_escalations_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없어도 패닉하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(SCAN_JOBS_SUBMITTED_TOTAL, "Total number of submitted scan jobs");
    describe_counter!(
        SCAN_JOBS_COMPLETED_TOTAL,
        "Total number of scan jobs that produced a result"
    );
    describe_counter!(
        SCAN_JOBS_FAILED_TOTAL,
        "Total number of scan jobs that ended in error"
    );
    describe_counter!(
        SCAN_JOBS_STOPPED_TOTAL,
        "Total number of scan jobs stopped on request"
    );
    describe_gauge!(SCAN_QUEUE_DEPTH, "Number of scan jobs waiting in the queue");
    describe_histogram!(
        SCAN_JOB_DURATION_SECONDS,
        "Wall-clock duration of a scan job in seconds"
    );
    describe_counter!(
        SCAN_PARSE_ERRORS_TOTAL,
        "Total number of scan outputs that could not be parsed"
    );
    describe_counter!(
        SCAN_KILL_ESCALATIONS_TOTAL,
        "Total number of graceful stops escalated to a forced kill"
    );
}
