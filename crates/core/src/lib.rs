//! logpilot 공통 크레이트
//!
//! 모든 logpilot 크레이트가 공유하는 에러, 설정, 도메인 타입,
//! 그리고 로그 수집기 감독 trait([`Piloter`])을 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod piloter;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, ContainerError, LogpilotError, SupervisorError};

// 설정
pub use config::LogpilotConfig;

// 감독자 trait
pub use piloter::Piloter;

// 도메인 타입
pub use types::{ContainerDetails, ContainerSummary, LogConfig, MountPoint, Source};
