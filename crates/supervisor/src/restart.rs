//! 크래시 재시작 전략
//!
//! 감독자는 프로세스가 종료될 때마다 연속 재시작 횟수를 세고
//! [`RestartStrategy::next_delay`]에 다음 재시작까지의 지연을 묻습니다.
//! `None`이면 재시작을 멈춥니다.
//!
//! 한 세대가 [`STABLE_LIFETIME`] 이상 살아 있었다면 연속 횟수는 1부터 다시 셉니다.

use std::time::Duration;

use crate::config::{FluentdPiloterConfig, RestartPolicy};

/// 이 시간 이상 실행된 프로세스의 종료는 연속 크래시로 세지 않음
pub const STABLE_LIFETIME: Duration = Duration::from_secs(60);

/// 재시작 지연 결정 전략
pub trait RestartStrategy: Send + Sync + 'static {
    /// 전략 이름 (로그용)
    fn name(&self) -> &'static str;

    /// `attempt`번째 연속 재시작 전 대기 시간. `None`이면 재시작하지 않습니다.
    ///
    /// `attempt`는 1부터 시작합니다.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// 즉시, 무제한 재시작
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRestart;

impl RestartStrategy for AlwaysRestart {
    fn name(&self) -> &'static str {
        "always"
    }

    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// 지수 backoff 재시작
///
/// 지연은 `base * 2^(attempt-1)`이며 `max`를 넘지 않습니다.
#[derive(Debug, Clone, Copy)]
pub struct BackoffRestart {
    base: Duration,
    max: Duration,
    max_attempts: Option<u32>,
}

impl BackoffRestart {
    /// 새 backoff 전략을 생성합니다. `max_attempts`가 `None`이면 무제한입니다.
    pub fn new(base: Duration, max: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            base,
            max: max.max(base),
            max_attempts,
        }
    }
}

impl RestartStrategy for BackoffRestart {
    fn name(&self) -> &'static str {
        "backoff"
    }

    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|limit| attempt > limit) {
            return None;
        }
        let exp = attempt.saturating_sub(1).min(31);
        Some(self.base.saturating_mul(1u32 << exp).min(self.max))
    }
}

/// 설정에 맞는 재시작 전략을 생성합니다.
pub fn strategy_from_config(config: &FluentdPiloterConfig) -> Box<dyn RestartStrategy> {
    match config.restart_policy {
        RestartPolicy::Always => Box::new(AlwaysRestart),
        RestartPolicy::Backoff => Box::new(BackoffRestart::new(
            config.restart_backoff_base,
            config.restart_backoff_max,
            (config.restart_max_attempts > 0).then_some(config.restart_max_attempts),
        )),
    }
}

/// 직전 연속 횟수와 종료된 세대의 수명으로 이번 연속 횟수를 계산합니다.
pub(crate) fn next_attempt(previous: u32, lifetime: Duration) -> u32 {
    if lifetime >= STABLE_LIFETIME {
        1
    } else {
        previous.saturating_add(1)
    }
}
