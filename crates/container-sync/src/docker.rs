//! Docker API abstraction for testability.
//!
//! The [`DockerClient`] trait abstracts the bollard Docker API, allowing
//! production code to use [`BollardDockerClient`] while tests use `MockDockerClient`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ EventWatcher │   │  Reconciler  │
//! └──────┬───────┘   └──────┬───────┘
//!        │ events()         │ list/inspect
//!        ▼                  ▼
//!        ┌──────────────────┐
//!        │   DockerClient   │ (trait)
//!        └──────────────────┘
//!            │          │
//!            ▼          ▼
//!       ┌────────┐  ┌──────┐
//!       │Bollard │  │ Mock │
//!       └───┬────┘  └──────┘
//!           ▼
//!     Docker Daemon
//! ```
//!
//! # Container ID Validation
//!
//! `inspect_container` validates the id before calling the daemon:
//! - Must be 1-64 characters
//! - Must contain only ASCII hex digits ([0-9a-fA-F])

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;

use logpilot_core::types::{ContainerDetails, ContainerSummary, MountPoint};

use crate::error::SyncError;
use crate::event::ContainerEvent;

/// 이벤트 구독 스트림
///
/// `None`은 정상 종료(EOF), `Some(Err(..))`는 재구독 대상 에러입니다.
pub type EventStream = BoxStream<'static, Result<ContainerEvent, SyncError>>;

/// Validates a container ID to prevent injection attacks.
///
/// Docker container IDs are 64-character hex strings (or shorter prefix forms).
pub fn validate_container_id(id: &str) -> Result<(), SyncError> {
    if id.is_empty() || id.len() > 64 {
        return Err(SyncError::DockerApi(format!(
            "invalid container ID: length {} (must be 1-64)",
            id.len()
        )));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SyncError::DockerApi(
            "invalid container ID: contains non-hex characters".to_owned(),
        ));
    }
    Ok(())
}

/// Trait abstracting Docker API operations.
///
/// The trait is `Send + Sync + 'static`, allowing safe sharing across async contexts.
///
/// # Implementations
///
/// - [`BollardDockerClient`]: Production implementation using the `bollard` library
/// - `MockDockerClient`: Test implementation with configurable responses (available in tests only)
pub trait DockerClient: Send + Sync + 'static {
    /// Lists all containers, running and stopped.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::DockerApi` if the Docker API call fails.
    fn list_containers(
        &self,
    ) -> impl Future<Output = Result<Vec<ContainerSummary>, SyncError>> + Send;

    /// Inspects a specific container.
    ///
    /// # Errors
    ///
    /// - `SyncError::ContainerNotFound`: Container does not exist (404)
    /// - `SyncError::DockerApi`: Invalid ID or other API errors
    fn inspect_container(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ContainerDetails, SyncError>> + Send;

    /// Subscribes to container-scoped lifecycle events.
    ///
    /// Each call opens a fresh subscription. Events emitted between two
    /// subscriptions are not replayed.
    fn events(&self) -> EventStream;

    /// Checks Docker daemon connectivity.
    fn ping(&self) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Production Docker client implementation using `bollard`.
///
/// Internally uses `Arc<bollard::Docker>` for safe sharing across async tasks.
pub struct BollardDockerClient {
    docker: Arc<bollard::Docker>,
}

impl BollardDockerClient {
    /// Connects to Docker using the default local socket.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::DockerConnection` if the connection fails.
    pub fn connect_local() -> Result<Self, SyncError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            SyncError::DockerConnection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::DockerConnection` if the connection fails.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, SyncError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    SyncError::DockerConnection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// 소켓 경로가 비어 있으면 플랫폼 기본값으로 연결합니다.
    pub fn connect(socket_path: &str) -> Result<Self, SyncError> {
        if socket_path.is_empty() {
            Self::connect_local()
        } else {
            Self::connect_with_socket(socket_path)
        }
    }
}

impl DockerClient for BollardDockerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, SyncError> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| SyncError::DockerApi(format!("list containers failed: {e}")))?;

        let result = containers
            .into_iter()
            .map(|container| {
                let name = container
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_owned())
                    .unwrap_or_default();
                ContainerSummary {
                    id: container.id.unwrap_or_default(),
                    name,
                    state: container.state.unwrap_or_default(),
                }
            })
            .collect();

        Ok(result)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, SyncError> {
        validate_container_id(id)?;

        let details = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => SyncError::ContainerNotFound(id.to_owned()),
                other => SyncError::DockerApi(format!("inspect container failed: {other}")),
            })?;

        let labels = details
            .config
            .and_then(|c| c.labels)
            .unwrap_or_default();
        let mounts = details
            .mounts
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                Some(MountPoint {
                    destination: m.destination?,
                    source: m.source?,
                })
            })
            .collect();

        Ok(ContainerDetails {
            id: details.id.unwrap_or_else(|| id.to_owned()),
            name: details
                .name
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_default(),
            labels,
            log_path: details.log_path.unwrap_or_default(),
            mounts,
        })
    }

    fn events(&self) -> EventStream {
        use bollard::system::EventsOptions;

        let options = EventsOptions::<String> {
            filters: HashMap::from([("type".to_owned(), vec!["container".to_owned()])]),
            ..Default::default()
        };

        self.docker
            .events(Some(options))
            .map(|item| match item {
                Ok(message) => {
                    let action = message.action.unwrap_or_default();
                    let container_id = message.actor.and_then(|a| a.id).unwrap_or_default();
                    Ok(ContainerEvent::new(&action, container_id))
                }
                Err(e) => Err(SyncError::EventStream(e.to_string())),
            })
            .boxed()
    }

    async fn ping(&self) -> Result<(), SyncError> {
        self.docker
            .ping()
            .await
            .map_err(|e| SyncError::DockerConnection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// 테스트용 Mock Docker 클라이언트
///
/// 설정 가능한 응답을 반환하여 Docker 없이도 테스트할 수 있습니다.
/// `events()` 호출마다 준비된 스크립트를 하나씩 꺼내며, 남은 스크립트가 없으면
/// 즉시 종료되는 스트림을 반환합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockDockerClient {
    /// list/inspect 호출 시 사용할 컨테이너 목록
    pub containers: Vec<ContainerDetails>,
    /// inspect 시 실패를 시뮬레이션할 컨테이너 ID
    pub failing_inspect: Vec<String>,
    /// 구독별 이벤트 스크립트
    pub subscriptions: std::sync::Mutex<std::collections::VecDeque<Vec<Result<ContainerEvent, SyncError>>>>,
    /// events() 호출 횟수
    pub subscribe_count: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockDockerClient {
    /// 빈 컨테이너 목록으로 mock 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 테스트용 컨테이너를 추가합니다.
    pub fn with_containers(mut self, containers: Vec<ContainerDetails>) -> Self {
        self.containers = containers;
        self
    }

    /// 지정한 컨테이너의 inspect가 실패하도록 설정합니다.
    pub fn with_failing_inspect(mut self, id: impl Into<String>) -> Self {
        self.failing_inspect.push(id.into());
        self
    }

    /// 다음 구독에서 방출할 이벤트 스크립트를 추가합니다.
    pub fn with_subscription(self, items: Vec<Result<ContainerEvent, SyncError>>) -> Self {
        if let Ok(mut subs) = self.subscriptions.lock() {
            subs.push_back(items);
        }
        self
    }

    /// events() 호출 횟수
    pub fn subscribe_count(&self) -> usize {
        self.subscribe_count
            .load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl DockerClient for MockDockerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, SyncError> {
        Ok(self
            .containers
            .iter()
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                state: "running".to_owned(),
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, SyncError> {
        if self.failing_inspect.iter().any(|f| f == id) {
            return Err(SyncError::DockerApi("mock inspect failure".to_owned()));
        }
        self.containers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| SyncError::ContainerNotFound(id.to_owned()))
    }

    fn events(&self) -> EventStream {
        self.subscribe_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let items = self
            .subscriptions
            .lock()
            .ok()
            .and_then(|mut subs| subs.pop_front())
            .unwrap_or_default();
        futures::stream::iter(items).boxed()
    }

    async fn ping(&self) -> Result<(), SyncError> {
        Ok(())
    }
}
