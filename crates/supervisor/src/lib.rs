//! logpilot 로그 수집기 감독
//!
//! fluentd 프로세스를 시작하고, 종료되면 재시작 전략에 따라 다시 띄우고,
//! SIGHUP으로 reload한 뒤 worker가 교체되지 않았으면 강제 종료합니다.
//!
//! # Module Structure
//!
//! - [`config`]: Supervisor configuration (`FluentdPiloterConfig`, builder)
//! - [`process`]: Child process query and signalling (`ProcessInspector`, `ProcfsInspector`)
//! - [`restart`]: Crash restart strategies (`AlwaysRestart`, `BackoffRestart`)
//! - [`fluentd`]: The supervisor itself (`FluentdPiloter`)

pub mod config;
pub mod fluentd;
pub mod process;
pub mod restart;

pub use config::{FluentdPiloterConfig, FluentdPiloterConfigBuilder, RestartPolicy};
pub use fluentd::{FluentdPiloter, FluentdPiloterBuilder, PILOT_NAME, ReloadOutcome};
pub use process::{ProcessInspector, ProcfsInspector, Signal};
pub use restart::{AlwaysRestart, BackoffRestart, RestartStrategy, strategy_from_config};
