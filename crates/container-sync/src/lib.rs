//! logpilot 컨테이너 동기화
//!
//! 컨테이너 레이블에서 로그 수집 규칙을 추출해 컨테이너별 설정 파일로 렌더링하고,
//! 컨테이너 생명주기 이벤트에 맞춰 설정 파일을 추가/삭제한 뒤 수집기에 reload를 요청합니다.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`SyncError`)
//! - [`config`]: Sync configuration (`SyncConfig`, builder)
//! - [`event`]: Container lifecycle events (`ContainerEvent`, `ContainerAction`)
//! - [`docker`]: Docker API abstraction (`DockerClient` trait, `BollardDockerClient`)
//! - [`mount`]: Mount resolution (`resolve_mount`)
//! - [`labels`]: Label extraction (`extract_log_configs`, `parse_tags`)
//! - [`render`]: Config rendering (`ConfigRenderer`, `FluentdRenderer`)
//! - [`store`]: Per-container config files (`ConfigStore`)
//! - [`watcher`]: Event subscription (`EventWatcher`)
//! - [`reconciler`]: Main orchestrator (`Reconciler`, `ReconcilerBuilder`)
//!
//! # Architecture
//!
//! ```text
//! Docker events --> EventWatcher --mpsc--> Reconciler
//!                                              |
//!                                  extract_log_configs() + resolve_mount()
//!                                              |
//!                                     ConfigRenderer.render()
//!                                              |
//!                                      ConfigStore.write()
//!                                              |
//!                                       Piloter.reload()
//! ```

pub mod config;
pub mod docker;
pub mod error;
pub mod event;
pub mod labels;
pub mod mount;
pub mod reconciler;
pub mod render;
pub mod store;
pub mod watcher;

// --- Public API Re-exports ---

// Reconciler (main orchestrator)
pub use reconciler::{Reconciler, ReconcilerBuilder};

// Configuration
pub use config::{SyncConfig, SyncConfigBuilder};

// Error
pub use error::SyncError;

// Events
pub use event::{ContainerAction, ContainerEvent};

// Docker API
pub use docker::{BollardDockerClient, DockerClient, EventStream};

// Label extraction / mount resolution
pub use labels::{extract_log_configs, parse_tags, source_of};
pub use mount::resolve_mount;

// Rendering / storage
pub use render::{ConfigRenderer, FluentdRenderer, RenderContext};
pub use store::ConfigStore;

// Watcher
pub use watcher::EventWatcher;
