//! 로그 수집기 감독 trait: 다른 로그 수집기를 붙이기 위한 확장 포인트
//!
//! 현재 구현은 `logpilot-supervisor`의 `FluentdPiloter` 하나뿐입니다.
//! Reconciler는 이 trait만 알고 있으므로 다른 수집기(filebeat 등)를
//! 추가할 때 나머지 코드를 수정할 필요가 없습니다.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::SupervisorError;

/// 로그 수집기 프로세스의 생명주기를 관리하는 trait
///
/// `start`/`stop`/`reload`만이 감독자 내부 상태를 변경합니다.
/// 경로 관련 메서드는 부수효과가 없습니다.
pub trait Piloter: Send + Sync + 'static {
    /// 감독자 식별자 (예: `"fluentd"`)
    fn name(&self) -> &str;

    /// 수집기 프로세스를 시작합니다.
    ///
    /// # Errors
    ///
    /// - `SupervisorError::AlreadyStarted`: 이미 프로세스를 보유 중
    /// - `SupervisorError::SpawnFailed`: 프로세스 실행 실패
    fn start(&self) -> impl Future<Output = Result<(), SupervisorError>> + Send;

    /// 수집기 프로세스를 정지합니다.
    fn stop(&self) -> impl Future<Output = Result<(), SupervisorError>> + Send;

    /// 설정을 다시 읽도록 수집기에 요청합니다.
    ///
    /// 호출자 입장에서 블로킹 동작이며 완료까지 최소 reload 지연 시간이 걸립니다.
    ///
    /// # Errors
    ///
    /// - `SupervisorError::NotStarted`: 시작 전에 호출됨
    fn reload(&self) -> impl Future<Output = Result<(), SupervisorError>> + Send;

    /// 컨테이너별 설정 파일 경로
    fn conf_path(&self, container_id: &str) -> PathBuf {
        self.conf_home().join(format!("{container_id}.conf"))
    }

    /// 컨테이너별 설정 파일이 놓이는 디렉토리
    fn conf_home(&self) -> &Path;

    /// 수집기 설정 루트 디렉토리
    fn base_conf(&self) -> &Path;

    /// 컨테이너 destroy 이벤트 훅
    fn on_destroy_event(&self, container_id: &str) -> Result<(), SupervisorError>;
}
