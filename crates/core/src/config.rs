//! 설정 관리: logpilot.toml 파싱 및 런타임 설정
//!
//! [`LogpilotConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGPILOT_PILOT_HOST_ROOT=/host` 형식)
//! 3. 설정 파일 (`logpilot.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logpilot_core::error::LogpilotError> {
//! use logpilot_core::config::LogpilotConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogpilotConfig::load("logpilot.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogpilotConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogpilotError};

/// logpilot 통합 설정
///
/// `logpilot.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 크레이트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogpilotConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Docker 연결 설정
    #[serde(default)]
    pub docker: DockerConfig,
    /// 레이블 해석 및 설정 동기화
    #[serde(default)]
    pub pilot: PilotConfig,
    /// fluentd 감독 설정
    #[serde(default)]
    pub fluentd: FluentdConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogpilotConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogpilotError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 기본값에 환경변수 오버라이드만 적용한 설정을 생성합니다.
    pub fn from_env() -> Result<Self, LogpilotError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogpilotError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogpilotError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogpilotError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogpilotError> {
        toml::from_str(toml_str).map_err(|e| {
            LogpilotError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGPILOT_{SECTION}_{FIELD}`
    /// 예: `LOGPILOT_FLUENTD_EXEC_PATH=/opt/fluentd/bin/fluentd`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGPILOT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGPILOT_GENERAL_LOG_FORMAT");

        // Docker
        override_string(&mut self.docker.socket, "LOGPILOT_DOCKER_SOCKET");
        override_usize(
            &mut self.docker.event_channel_capacity,
            "LOGPILOT_DOCKER_EVENT_CHANNEL_CAPACITY",
        );

        // Pilot
        override_string(&mut self.pilot.label_prefix, "LOGPILOT_PILOT_LABEL_PREFIX");
        override_string(&mut self.pilot.host_root, "LOGPILOT_PILOT_HOST_ROOT");
        override_bool(&mut self.pilot.strict_rescan, "LOGPILOT_PILOT_STRICT_RESCAN");

        // Fluentd
        override_string(&mut self.fluentd.exec_path, "LOGPILOT_FLUENTD_EXEC_PATH");
        override_string(&mut self.fluentd.base_conf, "LOGPILOT_FLUENTD_BASE_CONF");
        override_string(&mut self.fluentd.pos_file, "LOGPILOT_FLUENTD_POS_FILE");
        override_u64(
            &mut self.fluentd.reload_delay_secs,
            "LOGPILOT_FLUENTD_RELOAD_DELAY_SECS",
        );
        override_string(
            &mut self.fluentd.restart_policy,
            "LOGPILOT_FLUENTD_RESTART_POLICY",
        );
        override_u32(
            &mut self.fluentd.restart_max_attempts,
            "LOGPILOT_FLUENTD_RESTART_MAX_ATTEMPTS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGPILOT_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGPILOT_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGPILOT_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogpilotError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.docker.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "docker.event_channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        // 레이블 prefix는 '.'으로 끝나야 이름 세그먼트를 분리할 수 있음
        if self.pilot.label_prefix.is_empty() || !self.pilot.label_prefix.ends_with('.') {
            return Err(ConfigError::InvalidValue {
                field: "pilot.label_prefix".to_owned(),
                reason: "must be non-empty and end with '.'".to_owned(),
            }
            .into());
        }

        if !Path::new(&self.pilot.host_root).is_absolute() {
            return Err(ConfigError::InvalidValue {
                field: "pilot.host_root".to_owned(),
                reason: "must be an absolute path".to_owned(),
            }
            .into());
        }

        if self.fluentd.exec_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "fluentd.exec_path".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if !Path::new(&self.fluentd.base_conf).is_absolute() {
            return Err(ConfigError::InvalidValue {
                field: "fluentd.base_conf".to_owned(),
                reason: "must be an absolute path".to_owned(),
            }
            .into());
        }

        let valid_policies = ["always", "backoff"];
        if !valid_policies.contains(&self.fluentd.restart_policy.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "fluentd.restart_policy".to_owned(),
                reason: format!("must be one of: {}", valid_policies.join(", ")),
            }
            .into());
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metrics.port".to_owned(),
                reason: "must be greater than 0 when metrics are enabled".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

// Default는 derive 매크로로 자동 생성 (각 필드가 Default를 구현하므로)

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
            log_format: "json".to_owned(),
        }
    }
}

/// Docker 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Docker 소켓 경로 (빈 문자열이면 플랫폼 기본값)
    pub socket: String,
    /// 이벤트 감시 태스크와 Reconciler 사이 채널 용량
    pub event_channel_capacity: usize,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: String::new(),
            event_channel_capacity: 256,
        }
    }
}

/// 레이블 해석 및 설정 동기화 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    /// 로그 수집 레이블 prefix
    pub label_prefix: String,
    /// 에이전트 컨테이너에서 호스트 루트가 마운트된 경로
    pub host_root: String,
    /// 재스캔 중 컨테이너 하나라도 실패하면 재스캔 전체를 중단할지 여부
    pub strict_rescan: bool,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            label_prefix: "aliyun.logs.".to_owned(),
            host_root: "/host".to_owned(),
            strict_rescan: true,
        }
    }
}

/// fluentd 감독 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FluentdConfig {
    /// fluentd 실행 파일 경로
    pub exec_path: String,
    /// fluentd 설정 루트 (conf.d, fluentd.conf, plugins 포함)
    pub base_conf: String,
    /// worker 수를 읽을 환경변수 이름
    pub worker_env: String,
    /// 출력 대상을 읽을 환경변수 이름
    pub output_env: String,
    /// tail 입력이 공유하는 pos 파일 경로
    pub pos_file: String,
    /// reload 시그널 후 worker 교체 확인까지 대기 시간 (초)
    pub reload_delay_secs: u64,
    /// 비정상 종료 시 재시작 정책 (always, backoff)
    pub restart_policy: String,
    /// backoff 정책의 최대 연속 재시작 횟수 (0이면 무제한)
    pub restart_max_attempts: u32,
    /// backoff 기본 간격 (밀리초)
    pub restart_backoff_base_ms: u64,
    /// backoff 최대 간격 (밀리초)
    pub restart_backoff_max_ms: u64,
}

impl Default for FluentdConfig {
    fn default() -> Self {
        Self {
            exec_path: "/usr/bin/fluentd".to_owned(),
            base_conf: "/etc/fluentd".to_owned(),
            worker_env: "FLUENTD_WORKER".to_owned(),
            output_env: "FLUENTD_OUTPUT".to_owned(),
            pos_file: "/pilot/pos/fluentd.pos".to_owned(),
            reload_delay_secs: 5,
            restart_policy: "always".to_owned(),
            restart_max_attempts: 0,
            restart_backoff_base_ms: 500,
            restart_backoff_max_ms: 30_000,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
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
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
