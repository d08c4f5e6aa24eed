//! Reconciler -- 디스크의 설정 파일을 실제 컨테이너 집합과 일치시킴
//!
//! # 동작 순서
//! ```text
//! run()
//!   ├─ rescan()        재스캔 잠금 → conf.d 비우기 → 전체 컨테이너 list/inspect → 설정 생성
//!   ├─ start_piloter() 수집기 시작 요청 (실패해도 계속) → reloadable = true
//!   └─ watch()         EventWatcher ──mpsc──> handle_event() (한 번에 하나씩, 도착 순서대로)
//! ```
//!
//! 개별 이벤트 처리는 재스캔 잠금을 잡지 않습니다. 재스캔과 동시에 처리되는
//! 이벤트가 있을 수 있습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use logpilot_core::Piloter;
use logpilot_core::metrics as m;
use logpilot_core::types::ContainerDetails;

use crate::config::SyncConfig;
use crate::docker::DockerClient;
use crate::error::SyncError;
use crate::event::{ContainerAction, ContainerEvent};
use crate::labels::{extract_log_configs, source_of};
use crate::render::{ConfigRenderer, RenderContext};
use crate::store::ConfigStore;
use crate::watcher::EventWatcher;

/// 컨테이너 설정 동기화 오케스트레이터
pub struct Reconciler<D: DockerClient, P: Piloter, R: ConfigRenderer> {
    config: SyncConfig,
    docker: Arc<D>,
    piloter: Arc<P>,
    renderer: R,
    store: ConfigStore,
    /// 전체 재스캔끼리만 배제
    rescan_lock: Mutex<()>,
    /// 수집기 최초 시작 이후에만 true
    reloadable: AtomicBool,
}

impl<D: DockerClient, P: Piloter, R: ConfigRenderer> Reconciler<D, P, R> {
    /// 설정 저장소
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// 수집기 감독자
    pub fn piloter(&self) -> &P {
        &self.piloter
    }

    /// reload 요청을 수집기에 전달하는 단계인지 여부
    pub fn is_reloadable(&self) -> bool {
        self.reloadable.load(Ordering::SeqCst)
    }

    /// 재스캔, 수집기 시작, 이벤트 감시를 차례로 실행합니다.
    ///
    /// 이벤트 스트림이 EOF로 끝나면 `Ok(())`를 반환합니다.
    ///
    /// 수집기 시작 실패는 로그만 남깁니다. 재시도는 수집기의 재시작 전략이 맡고,
    /// 그동안의 reload 요청은 실패로 기록됩니다.
    ///
    /// # Errors
    ///
    /// 최초 재스캔 실패 또는 이벤트 감시 태스크 실패 시 반환합니다.
    pub async fn run(&self) -> Result<(), SyncError> {
        self.reloadable.store(false, Ordering::SeqCst);
        let written = self.rescan().await?;
        info!(containers = written, "initial rescan complete");
        if let Err(e) = self.start_piloter().await {
            error!(
                piloter = self.piloter.name(),
                error = %e,
                "log shipper failed to start, watching events anyway"
            );
        }
        self.watch().await
    }

    /// 설정 디렉토리를 비우고 모든 컨테이너(정지 포함)의 설정을 다시 생성합니다.
    ///
    /// 설정 파일을 작성한 컨테이너 수를 반환합니다.
    pub async fn rescan(&self) -> Result<usize, SyncError> {
        let _guard = self.rescan_lock.lock().await;
        let started = Instant::now();

        self.store.ensure_dir().await?;
        let wiped = self.store.wipe().await?;
        metrics::gauge!(m::SYNC_MANAGED_CONTAINERS).set(0.0);
        debug!(dir = %self.store.dir().display(), wiped, "config directory wiped");

        let containers = self.docker.list_containers().await?;
        let mut written = 0;
        for summary in &containers {
            match self.sync_container(&summary.id).await {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) if !self.config.strict_rescan => {
                    warn!(
                        container_id = %summary.id,
                        error = %e,
                        "skipping container during rescan"
                    );
                }
                Err(e) => {
                    error!(container_id = %summary.id, error = %e, "rescan aborted");
                    return Err(e);
                }
            }
        }

        metrics::histogram!(m::SYNC_RESCAN_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        Ok(written)
    }

    /// 수집기 시작을 요청하고 reload 요청을 허용합니다.
    ///
    /// 시작이 실패해도 reload는 허용됩니다.
    pub async fn start_piloter(&self) -> Result<(), SyncError> {
        let result = self.piloter.start().await;
        self.reloadable.store(true, Ordering::SeqCst);
        result?;
        info!(piloter = self.piloter.name(), "log shipper started, reloads enabled");
        Ok(())
    }

    /// 이벤트 스트림을 구독하고 EOF까지 이벤트를 순서대로 처리합니다.
    ///
    /// 이벤트 하나의 처리 실패는 로그만 남기고 다음 이벤트로 진행합니다.
    pub async fn watch(&self) -> Result<(), SyncError> {
        let (tx, mut rx) = mpsc::channel(self.config.event_channel_capacity);
        let watcher = tokio::spawn(EventWatcher::new(Arc::clone(&self.docker)).run(tx));

        while let Some(event) = rx.recv().await {
            if let Err(e) = self.handle_event(&event).await {
                error!(event = %event, error = %e, "failed to process container event");
            }
        }

        watcher
            .await
            .map_err(|e| SyncError::Channel(format!("event watcher task failed: {e}")))?
    }

    /// 컨테이너 이벤트 하나를 처리합니다.
    pub async fn handle_event(&self, event: &ContainerEvent) -> Result<(), SyncError> {
        metrics::counter!(m::SYNC_EVENTS_TOTAL, m::LABEL_ACTION => event.action.as_str().to_owned())
            .increment(1);

        let id = event.container_id.as_str();
        match &event.action {
            ContainerAction::Start => {
                if self.store.exists(id).await? {
                    debug!(container_id = id, "config already exists, skipping start event");
                    return Ok(());
                }
                self.sync_container(id).await.map(|_| ())
            }
            ContainerAction::Destroy => self.remove_container(id).await,
            ContainerAction::Other(_) => Ok(()),
        }
    }

    /// 컨테이너 메타데이터로 설정 파일을 생성합니다.
    ///
    /// 유효한 로그 레이블이 없으면 파일을 만들지 않고 `Ok(false)`를 반환합니다.
    pub async fn new_container(&self, details: &ContainerDetails) -> Result<bool, SyncError> {
        let configs =
            extract_log_configs(&self.config.label_prefix, self.config.host_root(), details);
        if configs.is_empty() {
            debug!(container_id = %details.id, "no log labels");
            return Ok(false);
        }

        let source = source_of(details);
        let document = self.renderer.render(&RenderContext {
            container_id: &details.id,
            source: &source,
            configs: &configs,
        })?;
        let path = self.store.write(&details.id, &document).await?;

        metrics::counter!(m::SYNC_CONFIGS_WRITTEN_TOTAL).increment(1);
        metrics::gauge!(m::SYNC_MANAGED_CONTAINERS).increment(1.0);
        info!(
            container = %details,
            path = %path.display(),
            streams = configs.len(),
            "container config saved"
        );

        self.try_reload().await;
        Ok(true)
    }

    async fn sync_container(&self, id: &str) -> Result<bool, SyncError> {
        let details = self.docker.inspect_container(id).await?;
        self.new_container(&details).await
    }

    async fn remove_container(&self, id: &str) -> Result<(), SyncError> {
        if let Err(e) = self.piloter.on_destroy_event(id) {
            warn!(container_id = id, error = %e, "destroy hook failed");
        }

        if !self.store.remove(id).await? {
            debug!(container_id = id, "no config to remove");
            return Ok(());
        }

        metrics::counter!(m::SYNC_CONFIGS_REMOVED_TOTAL).increment(1);
        metrics::gauge!(m::SYNC_MANAGED_CONTAINERS).decrement(1.0);
        info!(container_id = id, "container config removed");

        self.try_reload().await;
        Ok(())
    }

    // 최초 시작 전 요청은 큐에 쌓지 않고 버림
    async fn try_reload(&self) {
        if !self.is_reloadable() {
            debug!("reload suppressed until log shipper has started");
            return;
        }
        if let Err(e) = self.piloter.reload().await {
            warn!(piloter = self.piloter.name(), error = %e, "reload failed");
        }
    }
}

/// Reconciler 빌더
pub struct ReconcilerBuilder<D: DockerClient, P: Piloter, R: ConfigRenderer> {
    config: SyncConfig,
    docker: Option<Arc<D>>,
    piloter: Option<Arc<P>>,
    renderer: Option<R>,
}

impl<D: DockerClient, P: Piloter, R: ConfigRenderer> ReconcilerBuilder<D, P, R> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
            docker: None,
            piloter: None,
            renderer: None,
        }
    }

    /// 동기화 설정을 지정합니다.
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Docker 클라이언트를 설정합니다.
    pub fn docker_client(mut self, docker: Arc<D>) -> Self {
        self.docker = Some(docker);
        self
    }

    /// 수집기 감독자를 설정합니다. 설정 저장소 디렉토리는 감독자의 `conf_home()`입니다.
    pub fn piloter(mut self, piloter: Arc<P>) -> Self {
        self.piloter = Some(piloter);
        self
    }

    /// 설정 렌더러를 설정합니다.
    pub fn renderer(mut self, renderer: R) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Reconciler를 빌드합니다.
    pub fn build(self) -> Result<Reconciler<D, P, R>, SyncError> {
        self.config.validate()?;

        let missing = |field: &str| SyncError::Config {
            field: field.to_owned(),
            reason: format!("{field} must be provided"),
        };
        let docker = self.docker.ok_or_else(|| missing("docker_client"))?;
        let piloter = self.piloter.ok_or_else(|| missing("piloter"))?;
        let renderer = self.renderer.ok_or_else(|| missing("renderer"))?;
        let store = ConfigStore::new(piloter.conf_home());

        Ok(Reconciler {
            config: self.config,
            docker,
            piloter,
            renderer,
            store,
            rescan_lock: Mutex::new(()),
            reloadable: AtomicBool::new(false),
        })
    }
}

impl<D: DockerClient, P: Piloter, R: ConfigRenderer> Default for ReconcilerBuilder<D, P, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;

    use logpilot_core::error::SupervisorError;
    use logpilot_core::types::MountPoint;

    use crate::docker::MockDockerClient;
    use crate::render::FluentdRenderer;

    /// 호출 횟수를 기록하는 테스트용 감독자
    struct RecordingPiloter {
        conf_home: PathBuf,
        base_conf: PathBuf,
        starts: AtomicUsize,
        reloads: AtomicUsize,
        destroy_hooks: AtomicUsize,
        fail_start: bool,
    }

    impl RecordingPiloter {
        fn new(base: &Path) -> Self {
            Self {
                conf_home: base.join("conf.d"),
                base_conf: base.to_path_buf(),
                starts: AtomicUsize::new(0),
                reloads: AtomicUsize::new(0),
                destroy_hooks: AtomicUsize::new(0),
                fail_start: false,
            }
        }

        fn reloads(&self) -> usize {
            self.reloads.load(Ordering::SeqCst)
        }
    }

    impl Piloter for RecordingPiloter {
        fn name(&self) -> &str {
            "recording"
        }

        async fn start(&self) -> Result<(), SupervisorError> {
            if self.fail_start {
                return Err(SupervisorError::SpawnFailed("mock".to_owned()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<(), SupervisorError> {
            Ok(())
        }

        async fn reload(&self) -> Result<(), SupervisorError> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn conf_home(&self) -> &Path {
            &self.conf_home
        }

        fn base_conf(&self) -> &Path {
            &self.base_conf
        }

        fn on_destroy_event(&self, _container_id: &str) -> Result<(), SupervisorError> {
            self.destroy_hooks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn labelled(id: &str) -> ContainerDetails {
        ContainerDetails {
            id: id.to_owned(),
            name: format!("/{id}"),
            labels: [(
                "aliyun.logs.access".to_owned(),
                "/var/log/app/access.log".to_owned(),
            )]
            .into_iter()
            .collect(),
            log_path: format!("/var/lib/docker/containers/{id}/{id}-json.log"),
            mounts: vec![MountPoint {
                destination: "/var/log/app".to_owned(),
                source: "/data/logs/app".to_owned(),
            }],
        }
    }

    fn unlabelled(id: &str) -> ContainerDetails {
        ContainerDetails {
            id: id.to_owned(),
            name: format!("/{id}"),
            ..Default::default()
        }
    }

    type TestReconciler = Reconciler<MockDockerClient, RecordingPiloter, FluentdRenderer>;

    fn build(
        docker: MockDockerClient,
        piloter: RecordingPiloter,
        strict: bool,
    ) -> (TestReconciler, Arc<MockDockerClient>, Arc<RecordingPiloter>) {
        let docker = Arc::new(docker);
        let piloter = Arc::new(piloter);
        let config = crate::config::SyncConfigBuilder::new()
            .strict_rescan(strict)
            .build()
            .unwrap();
        let reconciler = ReconcilerBuilder::new()
            .config(config)
            .docker_client(Arc::clone(&docker))
            .piloter(Arc::clone(&piloter))
            .renderer(FluentdRenderer::new("/pilot/pos/fluentd.pos"))
            .build()
            .unwrap();
        (reconciler, docker, piloter)
    }

    #[test]
    fn builder_requires_collaborators() {
        let result: Result<TestReconciler, _> = ReconcilerBuilder::new().build();
        assert!(matches!(result, Err(SyncError::Config { .. })));
    }

    #[tokio::test]
    async fn rescan_wipes_and_writes_labelled_containers() {
        let dir = tempfile::tempdir().unwrap();
        let docker = MockDockerClient::new().with_containers(vec![labelled("aa11"), unlabelled("bb22")]);
        let (reconciler, _, piloter) = build(docker, RecordingPiloter::new(dir.path()), true);

        std::fs::create_dir_all(dir.path().join("conf.d/sub")).unwrap();
        std::fs::write(dir.path().join("conf.d/stale.conf"), "old").unwrap();

        let written = reconciler.rescan().await.unwrap();
        assert_eq!(written, 1);
        assert!(!dir.path().join("conf.d/stale.conf").exists());
        assert!(dir.path().join("conf.d/sub").is_dir());
        assert!(reconciler.store().exists("aa11").await.unwrap());
        assert!(!reconciler.store().exists("bb22").await.unwrap());
        // 시작 전에는 reload 요청이 버려짐
        assert_eq!(piloter.reloads(), 0);
    }

    #[tokio::test]
    async fn strict_rescan_aborts_on_container_failure() {
        let dir = tempfile::tempdir().unwrap();
        let docker = MockDockerClient::new()
            .with_containers(vec![labelled("aa11"), labelled("bb22")])
            .with_failing_inspect("aa11");
        let (reconciler, _, _) = build(docker, RecordingPiloter::new(dir.path()), true);

        assert!(reconciler.rescan().await.is_err());
    }

    #[tokio::test]
    async fn lenient_rescan_skips_failed_container() {
        let dir = tempfile::tempdir().unwrap();
        let docker = MockDockerClient::new()
            .with_containers(vec![labelled("aa11"), labelled("bb22")])
            .with_failing_inspect("aa11");
        let (reconciler, _, _) = build(docker, RecordingPiloter::new(dir.path()), false);

        assert_eq!(reconciler.rescan().await.unwrap(), 1);
        assert!(reconciler.store().exists("bb22").await.unwrap());
    }

    #[tokio::test]
    async fn start_piloter_enables_reload() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, _, piloter) =
            build(MockDockerClient::new(), RecordingPiloter::new(dir.path()), true);
        assert!(!reconciler.is_reloadable());
        reconciler.start_piloter().await.unwrap();
        assert!(reconciler.is_reloadable());
        assert_eq!(piloter.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_start_still_enables_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut piloter = RecordingPiloter::new(dir.path());
        piloter.fail_start = true;
        let (reconciler, _, _) = build(MockDockerClient::new(), piloter, true);
        let err = reconciler.start_piloter().await.unwrap_err();
        assert!(matches!(err, SyncError::Supervisor(_)));
        assert!(reconciler.is_reloadable());
    }

    #[tokio::test]
    async fn start_event_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let docker = MockDockerClient::new().with_containers(vec![labelled("aa11")]);
        let (reconciler, _, piloter) = build(docker, RecordingPiloter::new(dir.path()), true);
        reconciler.store().ensure_dir().await.unwrap();
        reconciler.start_piloter().await.unwrap();

        let event = ContainerEvent::new("start", "aa11");
        reconciler.handle_event(&event).await.unwrap();
        reconciler.handle_event(&event).await.unwrap();

        assert!(reconciler.store().exists("aa11").await.unwrap());
        assert_eq!(piloter.reloads(), 1);
    }

    #[tokio::test]
    async fn start_event_for_unlabelled_container_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let docker = MockDockerClient::new().with_containers(vec![unlabelled("cc33")]);
        let (reconciler, _, piloter) = build(docker, RecordingPiloter::new(dir.path()), true);
        reconciler.store().ensure_dir().await.unwrap();
        reconciler.start_piloter().await.unwrap();

        reconciler
            .handle_event(&ContainerEvent::new("start", "cc33"))
            .await
            .unwrap();
        assert!(!reconciler.store().exists("cc33").await.unwrap());
        assert_eq!(piloter.reloads(), 0);
    }

    #[tokio::test]
    async fn start_event_inspect_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, _, _) =
            build(MockDockerClient::new(), RecordingPiloter::new(dir.path()), true);
        reconciler.store().ensure_dir().await.unwrap();
        let err = reconciler
            .handle_event(&ContainerEvent::new("start", "dead"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ContainerNotFound(_)));
    }

    #[tokio::test]
    async fn destroy_event_removes_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, _, piloter) =
            build(MockDockerClient::new(), RecordingPiloter::new(dir.path()), true);
        reconciler.store().ensure_dir().await.unwrap();
        reconciler.store().write("aa11", "doc").await.unwrap();
        reconciler.start_piloter().await.unwrap();

        reconciler
            .handle_event(&ContainerEvent::new("destroy", "aa11"))
            .await
            .unwrap();
        assert!(!reconciler.store().exists("aa11").await.unwrap());
        assert_eq!(piloter.reloads(), 1);
        assert_eq!(piloter.destroy_hooks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn destroy_event_without_config_does_not_reload() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, _, piloter) =
            build(MockDockerClient::new(), RecordingPiloter::new(dir.path()), true);
        reconciler.store().ensure_dir().await.unwrap();
        reconciler.start_piloter().await.unwrap();

        reconciler
            .handle_event(&ContainerEvent::new("destroy", "ghost"))
            .await
            .unwrap();
        assert_eq!(piloter.reloads(), 0);
    }

    #[tokio::test]
    async fn other_actions_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let docker = MockDockerClient::new().with_containers(vec![labelled("aa11")]);
        let (reconciler, _, _) = build(docker, RecordingPiloter::new(dir.path()), true);
        reconciler.store().ensure_dir().await.unwrap();

        reconciler
            .handle_event(&ContainerEvent::new("die", "aa11"))
            .await
            .unwrap();
        assert!(!reconciler.store().exists("aa11").await.unwrap());
    }

    #[tokio::test]
    async fn run_rescans_starts_then_watches_until_eof() {
        let dir = tempfile::tempdir().unwrap();
        let docker = MockDockerClient::new()
            .with_containers(vec![labelled("aa11"), labelled("bb22")])
            .with_subscription(vec![Ok(ContainerEvent::new("destroy", "aa11"))]);
        let (reconciler, docker, piloter) = build(docker, RecordingPiloter::new(dir.path()), true);

        reconciler.run().await.unwrap();

        assert_eq!(piloter.starts.load(Ordering::SeqCst), 1);
        // 재스캔 중에는 reload 없음, destroy 이벤트에서 한 번
        assert_eq!(piloter.reloads(), 1);
        assert!(!reconciler.store().exists("aa11").await.unwrap());
        assert!(reconciler.store().exists("bb22").await.unwrap());
        assert_eq!(docker.subscribe_count(), 1);
    }

    #[tokio::test]
    async fn run_watches_events_when_start_fails() {
        let dir = tempfile::tempdir().unwrap();
        let docker = MockDockerClient::new()
            .with_containers(vec![labelled("aa11")])
            .with_subscription(vec![Ok(ContainerEvent::new("destroy", "aa11"))]);
        let mut piloter = RecordingPiloter::new(dir.path());
        piloter.fail_start = true;
        let (reconciler, docker, piloter) = build(docker, piloter, true);

        reconciler.run().await.unwrap();

        assert_eq!(docker.subscribe_count(), 1);
        assert!(!reconciler.store().exists("aa11").await.unwrap());
        assert_eq!(piloter.reloads(), 1);
    }

    #[tokio::test]
    async fn run_continues_after_event_failure() {
        let dir = tempfile::tempdir().unwrap();
        let docker = MockDockerClient::new()
            .with_containers(vec![labelled("bb22")])
            .with_failing_inspect("bb22")
            .with_subscription(vec![
                Ok(ContainerEvent::new("start", "dead")),
                Ok(ContainerEvent::new("destroy", "aa11")),
            ]);
        let (reconciler, _, _) = build(docker, RecordingPiloter::new(dir.path()), false);

        reconciler.run().await.unwrap();
        assert!(reconciler.store().container_ids().await.unwrap().is_empty());
    }
}
