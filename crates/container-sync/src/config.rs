//! 컨테이너 동기화 설정
//!
//! [`SyncConfig`]는 core의 `[pilot]`/`[docker]` 섹션을 기반으로
//! 동기화 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logpilot_core::config::LogpilotConfig;
//! use logpilot_container_sync::config::SyncConfig;
//!
//! let core_config = LogpilotConfig::default();
//! let config = SyncConfig::from_core(&core_config);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// 컨테이너 동기화 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 로그 수집 레이블 prefix
    pub label_prefix: String,
    /// 모든 HostDir 앞에 붙는 기준 디렉토리
    pub host_root: PathBuf,
    /// 재스캔 중 컨테이너 하나의 실패가 재스캔 전체를 중단하는지 여부
    pub strict_rescan: bool,
    /// 이벤트 채널 용량
    pub event_channel_capacity: usize,
    /// Docker 소켓 경로 (빈 문자열이면 플랫폼 기본값)
    pub docker_socket: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            label_prefix: "aliyun.logs.".to_owned(),
            host_root: PathBuf::from("/host"),
            strict_rescan: true,
            event_channel_capacity: 256,
            docker_socket: String::new(),
        }
    }
}

/// 설정 상한값 상수
const MAX_EVENT_CHANNEL_CAPACITY: usize = 65_536;
const MAX_LABEL_PREFIX_LEN: usize = 128;

impl SyncConfig {
    /// core 설정에서 동기화 설정을 생성합니다.
    pub fn from_core(core: &logpilot_core::config::LogpilotConfig) -> Self {
        Self {
            label_prefix: core.pilot.label_prefix.clone(),
            host_root: PathBuf::from(&core.pilot.host_root),
            strict_rescan: core.pilot.strict_rescan,
            event_channel_capacity: core.docker.event_channel_capacity,
            docker_socket: core.docker.socket.clone(),
        }
    }

    /// 기준 디렉토리
    pub fn host_root(&self) -> &Path {
        &self.host_root
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.label_prefix.is_empty() || self.label_prefix.len() > MAX_LABEL_PREFIX_LEN {
            return Err(SyncError::Config {
                field: "label_prefix".to_owned(),
                reason: format!("length must be 1-{MAX_LABEL_PREFIX_LEN}"),
            });
        }

        if !self.label_prefix.ends_with('.') {
            return Err(SyncError::Config {
                field: "label_prefix".to_owned(),
                reason: "must end with '.'".to_owned(),
            });
        }

        if !self.host_root.is_absolute() {
            return Err(SyncError::Config {
                field: "host_root".to_owned(),
                reason: "must be an absolute path".to_owned(),
            });
        }

        if self.event_channel_capacity == 0
            || self.event_channel_capacity > MAX_EVENT_CHANNEL_CAPACITY
        {
            return Err(SyncError::Config {
                field: "event_channel_capacity".to_owned(),
                reason: format!("must be 1-{MAX_EVENT_CHANNEL_CAPACITY}"),
            });
        }

        Ok(())
    }
}

/// 동기화 설정 빌더
#[derive(Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 레이블 prefix를 설정합니다.
    pub fn label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.label_prefix = prefix.into();
        self
    }

    /// 기준 디렉토리를 설정합니다.
    pub fn host_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.host_root = root.into();
        self
    }

    /// 엄격 재스캔 여부를 설정합니다.
    pub fn strict_rescan(mut self, strict: bool) -> Self {
        self.config.strict_rescan = strict;
        self
    }

    /// 이벤트 채널 용량을 설정합니다.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// Docker 소켓 경로를 설정합니다.
    pub fn docker_socket(mut self, socket: impl Into<String>) -> Self {
        self.config.docker_socket = socket.into();
        self
    }

    /// 설정을 검증하고 `SyncConfig`를 생성합니다.
    pub fn build(self) -> Result<SyncConfig, SyncError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
