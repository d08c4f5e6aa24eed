//! 에러 타입: 도메인별 에러 정의

/// logpilot 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogpilotError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컨테이너 런타임 관련 에러
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// 로그 수집기 프로세스 감독 에러
    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컨테이너 런타임 에러
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// 컨테이너를 찾을 수 없음
    #[error("container not found: {0}")]
    NotFound(String),

    /// 이벤트 스트림 에러
    #[error("event stream error: {0}")]
    EventStream(String),

    /// 설정 파일 생성/삭제 실패
    #[error("config sync failed for container '{container_id}': {reason}")]
    SyncFailed {
        container_id: String,
        reason: String,
    },
}

/// 로그 수집기 프로세스 감독 에러
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// 이미 프로세스를 보유하고 있음
    #[error("log shipper already started")]
    AlreadyStarted,

    /// 아직 시작되지 않음
    #[error("log shipper has not started")]
    NotStarted,

    /// 프로세스 실행 실패
    #[error("failed to spawn log shipper: {0}")]
    SpawnFailed(String),

    /// 시그널 전송 실패
    #[error("failed to signal pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    /// 자식 프로세스 조회 실패
    #[error("process query failed: {0}")]
    ProcessQuery(String),

    /// reload 확인 태스크가 비정상 종료됨
    #[error("reload aborted: {0}")]
    ReloadAborted(String),
}
