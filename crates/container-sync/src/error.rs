//! 컨테이너 동기화 에러 타입
//!
//! [`SyncError`]는 컨테이너 동기화 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<SyncError> for LogpilotError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logpilot_core::error::{ContainerError, LogpilotError, SupervisorError};

/// 컨테이너 동기화 도메인 에러
///
/// 레이블 항목 하나에 국한되는 에러(`InvalidLabel`, `InvalidTags`, `MountNotFound`)와
/// 컨테이너 처리 전체를 중단시키는 에러로 나뉩니다.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// Docker 소켓 연결 실패
    #[error("docker connection error: {0}")]
    DockerConnection(String),

    /// 컨테이너를 찾을 수 없음
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// 이벤트 스트림 에러 (재구독 대상)
    #[error("event stream error: {0}")]
    EventStream(String),

    /// 로그 레이블 값이 유효하지 않음
    #[error("invalid log label '{label}': {reason}")]
    InvalidLabel {
        /// 레이블 키
        label: String,
        /// 거부 사유
        reason: String,
    },

    /// tags 레이블 파싱 실패
    #[error("invalid tags '{raw}': {reason}")]
    InvalidTags {
        /// 원본 문자열
        raw: String,
        /// 거부 사유
        reason: String,
    },

    /// 컨테이너 경로에 대응하는 마운트가 없음
    #[error("no mount covers container path '{0}'")]
    MountNotFound(String),

    /// 설정 문서 렌더링 실패
    #[error("render failed for container '{container_id}': {reason}")]
    Render {
        /// 대상 컨테이너 ID
        container_id: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 파일 입출력 실패
    #[error("config store error at {path}: {source}")]
    Store {
        /// 대상 경로
        path: String,
        /// 원본 I/O 에러
        #[source]
        source: std::io::Error,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 감독자 호출 실패
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

impl SyncError {
    /// 로그 항목 하나만 건너뛰면 되는 에러인지 여부
    pub fn is_entry_level(&self) -> bool {
        matches!(
            self,
            Self::InvalidLabel { .. } | Self::InvalidTags { .. } | Self::MountNotFound(_)
        )
    }
}

impl From<SyncError> for LogpilotError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::DockerApi(msg) | SyncError::DockerConnection(msg) => {
                LogpilotError::Container(ContainerError::DockerApi(msg))
            }
            SyncError::ContainerNotFound(id) => {
                LogpilotError::Container(ContainerError::NotFound(id))
            }
            SyncError::EventStream(msg) => {
                LogpilotError::Container(ContainerError::EventStream(msg))
            }
            SyncError::Render { container_id, reason } => {
                LogpilotError::Container(ContainerError::SyncFailed {
                    container_id,
                    reason,
                })
            }
            SyncError::Store { source, .. } => LogpilotError::Io(source),
            SyncError::Supervisor(e) => LogpilotError::Supervisor(e),
            other @ (SyncError::InvalidLabel { .. }
            | SyncError::InvalidTags { .. }
            | SyncError::MountNotFound(_)
            | SyncError::Config { .. }
            | SyncError::Channel(_)) => {
                LogpilotError::Container(ContainerError::DockerApi(other.to_string()))
            }
        }
    }
}
