//! 파이프라인 trait: 장기 실행 컴포넌트의 생명주기 정의

use std::future::Future;

use crate::error::ScanwardenError;

/// 컴포넌트 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 일부 기능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 시작/정지/상태 점검을 제공하는 장기 실행 컴포넌트
///
/// 구현체는 `async fn`으로 작성할 수 있습니다.
pub trait Pipeline: Send {
    /// 백그라운드 태스크를 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), ScanwardenError>> + Send;

    /// 백그라운드 태스크를 정지합니다. 실행 중이 아니면 에러를 반환합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), ScanwardenError>> + Send;

    /// 현재 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
