//! 수집기 감독 설정
//!
//! [`FluentdPiloterConfig`]는 core의 `[fluentd]` 섹션에서 파생됩니다.
//! 설정 디렉토리 레이아웃은 `base_conf` 하나로 결정됩니다.
//!
//! ```text
//! <base_conf>/fluentd.conf   메인 설정
//! <base_conf>/plugins        플러그인 디렉토리
//! <base_conf>/conf.d         컨테이너별 설정
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use logpilot_core::error::ConfigError;

/// worker 수 환경변수가 없거나 잘못됐을 때의 값
pub const DEFAULT_WORKER_COUNT: u32 = 1;

const MAX_RELOAD_DELAY: Duration = Duration::from_secs(300);
const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// 크래시 재시작 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    /// 즉시, 무제한 재시작
    Always,
    /// 지수 backoff 후 재시작
    Backoff,
}

impl RestartPolicy {
    /// 설정 문자열을 파싱합니다.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "always" => Some(Self::Always),
            "backoff" => Some(Self::Backoff),
            _ => None,
        }
    }
}

/// fluentd 감독 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluentdPiloterConfig {
    /// fluentd 실행 파일
    pub exec_path: PathBuf,
    /// 설정 루트 디렉토리
    pub base_conf: PathBuf,
    /// worker 수 환경변수 이름
    pub worker_env: String,
    /// 출력 대상 환경변수 이름
    pub output_env: String,
    /// HUP 후 worker 교체 확인까지 대기 시간
    pub reload_delay: Duration,
    /// 재시작 정책
    pub restart_policy: RestartPolicy,
    /// backoff 정책의 최대 연속 재시작 횟수 (0이면 무제한)
    pub restart_max_attempts: u32,
    /// backoff 기본 간격
    pub restart_backoff_base: Duration,
    /// backoff 최대 간격
    pub restart_backoff_max: Duration,
}

impl Default for FluentdPiloterConfig {
    fn default() -> Self {
        Self {
            exec_path: PathBuf::from("/usr/bin/fluentd"),
            base_conf: PathBuf::from("/etc/fluentd"),
            worker_env: "FLUENTD_WORKER".to_owned(),
            output_env: "FLUENTD_OUTPUT".to_owned(),
            reload_delay: Duration::from_secs(5),
            restart_policy: RestartPolicy::Always,
            restart_max_attempts: 0,
            restart_backoff_base: Duration::from_millis(500),
            restart_backoff_max: Duration::from_secs(30),
        }
    }
}

impl FluentdPiloterConfig {
    /// core 설정에서 감독 설정을 생성합니다.
    ///
    /// 알 수 없는 재시작 정책은 `always`로 취급합니다.
    /// core 설정의 `validate()`가 먼저 거부하므로 정상 경로에서는 발생하지 않습니다.
    pub fn from_core(core: &logpilot_core::config::LogpilotConfig) -> Self {
        let f = &core.fluentd;
        let restart_policy = RestartPolicy::parse(&f.restart_policy).unwrap_or_else(|| {
            warn!(policy = %f.restart_policy, "unknown restart policy, using 'always'");
            RestartPolicy::Always
        });
        Self {
            exec_path: PathBuf::from(&f.exec_path),
            base_conf: PathBuf::from(&f.base_conf),
            worker_env: f.worker_env.clone(),
            output_env: f.output_env.clone(),
            reload_delay: Duration::from_secs(f.reload_delay_secs),
            restart_policy,
            restart_max_attempts: f.restart_max_attempts,
            restart_backoff_base: Duration::from_millis(f.restart_backoff_base_ms),
            restart_backoff_max: Duration::from_millis(f.restart_backoff_max_ms),
        }
    }

    /// 컨테이너별 설정 디렉토리
    pub fn conf_home(&self) -> PathBuf {
        self.base_conf.join("conf.d")
    }

    /// 메인 설정 파일
    pub fn conf_file(&self) -> PathBuf {
        self.base_conf.join("fluentd.conf")
    }

    /// 플러그인 디렉토리
    pub fn plugin_dir(&self) -> PathBuf {
        self.base_conf.join("plugins")
    }

    /// 설정 루트
    pub fn base_conf(&self) -> &Path {
        &self.base_conf
    }

    /// 환경변수에서 worker 수를 읽습니다.
    ///
    /// 없거나 양의 정수가 아니면 [`DEFAULT_WORKER_COUNT`]입니다.
    pub fn worker_count(&self) -> u32 {
        match std::env::var(&self.worker_env) {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!(
                        env = %self.worker_env,
                        value = %raw,
                        "invalid worker count, using default"
                    );
                    DEFAULT_WORKER_COUNT
                }
            },
            Err(_) => DEFAULT_WORKER_COUNT,
        }
    }

    /// 출력 대상 환경변수 값
    pub fn output_destination(&self) -> Option<String> {
        std::env::var(&self.output_env)
            .ok()
            .filter(|v| !v.is_empty())
    }

    /// 실행 인자 목록
    pub fn launch_args(&self, workers: u32) -> Vec<String> {
        vec![
            "-c".to_owned(),
            self.conf_file().display().to_string(),
            "-p".to_owned(),
            self.plugin_dir().display().to_string(),
            "--workers".to_owned(),
            workers.to_string(),
        ]
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exec_path.as_os_str().is_empty() {
            return Err(invalid("exec_path", "must not be empty"));
        }

        if !self.base_conf.is_absolute() {
            return Err(invalid("base_conf", "must be an absolute path"));
        }

        if self.worker_env.is_empty() {
            return Err(invalid("worker_env", "must not be empty"));
        }

        if self.reload_delay > MAX_RELOAD_DELAY {
            return Err(invalid(
                "reload_delay",
                &format!("must be at most {}s", MAX_RELOAD_DELAY.as_secs()),
            ));
        }

        if self.restart_policy == RestartPolicy::Backoff {
            if self.restart_backoff_base.is_zero() {
                return Err(invalid("restart_backoff_base", "must be greater than 0"));
            }
            if self.restart_backoff_max < self.restart_backoff_base
                || self.restart_backoff_max > MAX_BACKOFF
            {
                return Err(invalid(
                    "restart_backoff_max",
                    &format!(
                        "must be between restart_backoff_base and {}s",
                        MAX_BACKOFF.as_secs()
                    ),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// 감독 설정 빌더
#[derive(Default)]
pub struct FluentdPiloterConfigBuilder {
    config: FluentdPiloterConfig,
}

impl FluentdPiloterConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 실행 파일 경로를 설정합니다.
    pub fn exec_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.exec_path = path.into();
        self
    }

    /// 설정 루트를 설정합니다.
    pub fn base_conf(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_conf = path.into();
        self
    }

    /// worker 수 환경변수 이름을 설정합니다.
    pub fn worker_env(mut self, name: impl Into<String>) -> Self {
        self.config.worker_env = name.into();
        self
    }

    /// 출력 대상 환경변수 이름을 설정합니다.
    pub fn output_env(mut self, name: impl Into<String>) -> Self {
        self.config.output_env = name.into();
        self
    }

    /// reload 확인 대기 시간을 설정합니다.
    pub fn reload_delay(mut self, delay: Duration) -> Self {
        self.config.reload_delay = delay;
        self
    }

    /// 재시작 정책을 설정합니다.
    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.config.restart_policy = policy;
        self
    }

    /// 최대 연속 재시작 횟수를 설정합니다.
    pub fn restart_max_attempts(mut self, attempts: u32) -> Self {
        self.config.restart_max_attempts = attempts;
        self
    }

    /// backoff 간격을 설정합니다.
    pub fn restart_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.restart_backoff_base = base;
        self.config.restart_backoff_max = max;
        self
    }

    /// 설정을 검증하고 `FluentdPiloterConfig`를 생성합니다.
    pub fn build(self) -> Result<FluentdPiloterConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
