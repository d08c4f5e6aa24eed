//! fluentd 감독자 -- 시작, 크래시 재시작, HUP reload와 강제 종료 에스컬레이션
//!
//! # 상태
//! ```text
//! Stopped --start()--> Running --exit--> (restart strategy) --launch--> Running
//!    |                                            ^
//!    +--spawn 실패--> (restart strategy) ----------+
//!                         |
//!                      reload(): children before → SIGHUP → delay → children after
//!                                before == after → SIGKILL stale workers
//! ```
//!
//! 보유 중인 프로세스 핸들은 하나의 잠금 뒤에 있으며 `start()`, exit 감시 태스크의
//! 재시작 경로, `reload()`만 접근합니다. 세대(generation) 번호로 이전 세대의 exit
//! 감시 태스크가 새 핸들을 지우는 일을 막습니다.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use logpilot_core::Piloter;
use logpilot_core::error::{ConfigError, SupervisorError};
use logpilot_core::metrics as m;

use crate::config::FluentdPiloterConfig;
use crate::process::{ProcessInspector, ProcfsInspector, Signal};
use crate::restart::{RestartStrategy, next_attempt, strategy_from_config};

/// 감독자 식별자
pub const PILOT_NAME: &str = "fluentd";

/// 실행 실패 직후 다시 실행하기 전 최소 대기 시간
pub const SPAWN_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// reload 확인 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// 자식 프로세스 집합이 바뀜
    Replaced,
    /// 자식 프로세스 집합이 그대로여서 강제 종료함
    StaleKilled {
        /// SIGKILL을 보낸 프로세스 수
        killed: usize,
    },
}

impl ReloadOutcome {
    fn metric_label(self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::StaleKilled { .. } => "stale_killed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ProcessHandle {
    pid: u32,
    generation: u64,
    started_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    running: Option<ProcessHandle>,
    spawns: u64,
    consecutive_restarts: u32,
    /// 재시작 루프가 진행 중인지 여부 (루프는 최대 하나)
    restarting: bool,
}

struct Shared<I: ProcessInspector> {
    config: FluentdPiloterConfig,
    inspector: I,
    strategy: Box<dyn RestartStrategy>,
    state: Mutex<State>,
}

impl<I: ProcessInspector> Shared<I> {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        // 잠금 구간에 panic 지점이 없으므로 poison 상태여도 값은 일관됨
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 프로세스를 실행하고 exit 감시 태스크를 띄웁니다.
    fn launch(self: &Arc<Self>) -> Result<u32, SupervisorError> {
        let mut state = self.lock_state();
        if state.running.is_some() {
            return Err(SupervisorError::AlreadyStarted);
        }

        let workers = self.config.worker_count();
        let child = Command::new(&self.config.exec_path)
            .args(self.config.launch_args(workers))
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SupervisorError::SpawnFailed(format!("{}: {e}", self.config.exec_path.display()))
            })?;
        let pid = child.id().ok_or_else(|| {
            SupervisorError::SpawnFailed("process exited before its pid was read".to_owned())
        })?;

        state.spawns += 1;
        let generation = state.spawns;
        state.running = Some(ProcessHandle {
            pid,
            generation,
            started_at: Instant::now(),
        });
        drop(state);

        metrics::counter!(m::SUPERVISOR_SPAWNS_TOTAL).increment(1);
        info!(pid, generation, workers, "fluentd started");

        tokio::spawn(Arc::clone(self).watch_exit(child, generation));
        Ok(pid)
    }

    async fn watch_exit(self: Arc<Self>, mut child: Child, generation: u64) {
        let result = child.wait().await;

        let (pid, lifetime) = {
            let mut state = self.lock_state();
            let handle = match state.running {
                Some(handle) if handle.generation == generation => handle,
                _ => return,
            };
            state.running = None;
            state.restarting = true;
            (handle.pid, handle.started_at.elapsed())
        };

        match result {
            Ok(status) if status.success() => {
                info!(pid, generation, "fluentd exited");
            }
            Ok(status) => {
                warn!(pid, generation, status = %status, "fluentd exited abnormally");
            }
            Err(e) => {
                error!(pid, generation, error = %e, "failed to wait for fluentd");
            }
        }

        self.restart_after(lifetime, false).await;
    }

    /// 재시작 전략이 멈추라고 할 때까지 다시 실행합니다.
    ///
    /// 실행 실패도 연속 재시작 한 번으로 세고, 다음 시도 전 최소
    /// [`SPAWN_RETRY_INTERVAL`]을 기다립니다.
    async fn restart_after(self: Arc<Self>, lifetime: Duration, spawn_failed: bool) {
        let mut lifetime = lifetime;
        let mut spawn_failed = spawn_failed;

        loop {
            let attempt = {
                let mut state = self.lock_state();
                state.consecutive_restarts = next_attempt(state.consecutive_restarts, lifetime);
                state.consecutive_restarts
            };

            let Some(mut delay) = self.strategy.next_delay(attempt) else {
                error!(
                    attempt,
                    strategy = self.strategy.name(),
                    "restart limit reached, fluentd stays down"
                );
                break;
            };
            if spawn_failed {
                delay = delay.max(SPAWN_RETRY_INTERVAL);
            }

            if !delay.is_zero() {
                info!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "restarting fluentd after delay"
                );
                tokio::time::sleep(delay).await;
            }

            match self.launch() {
                Ok(pid) => {
                    metrics::counter!(m::SUPERVISOR_RESTARTS_TOTAL).increment(1);
                    info!(pid, attempt, "fluentd restarted");
                    break;
                }
                Err(SupervisorError::AlreadyStarted) => {
                    debug!("fluentd was started concurrently, skipping restart");
                    break;
                }
                Err(e) => {
                    metrics::counter!(m::SUPERVISOR_SPAWN_FAILURES_TOTAL).increment(1);
                    warn!(attempt, error = %e, "fluentd restart failed, retrying");
                    lifetime = Duration::ZERO;
                    spawn_failed = true;
                }
            }
        }

        self.lock_state().restarting = false;
    }

    /// 실행 실패 후 재시작 루프가 없으면 하나를 띄웁니다.
    fn schedule_restart(self: &Arc<Self>) {
        {
            let mut state = self.lock_state();
            if state.restarting || state.running.is_some() {
                return;
            }
            state.restarting = true;
        }
        tokio::spawn(Arc::clone(self).restart_after(Duration::ZERO, true));
    }

    async fn verify_reload(&self, pid: u32) -> Result<ReloadOutcome, SupervisorError> {
        let before = self.inspector.children_of(pid)?;
        self.inspector.signal(pid, Signal::Hangup)?;
        debug!(pid, workers = ?before, "reload signal sent");

        tokio::time::sleep(self.config.reload_delay).await;

        let after = self.inspector.children_of(pid)?;
        if before != after {
            info!(pid, before = ?before, after = ?after, "fluentd worker replaced");
            return Ok(ReloadOutcome::Replaced);
        }

        warn!(pid, workers = ?after, "reload did not replace worker, killing stale worker");
        let mut killed = 0;
        for worker in &after {
            // 이미 종료된 worker(ESRCH)가 있어도 나머지는 계속 종료
            match self.inspector.signal(*worker, Signal::Kill) {
                Ok(()) => {
                    killed += 1;
                    metrics::counter!(m::SUPERVISOR_STALE_WORKERS_KILLED_TOTAL).increment(1);
                }
                Err(e) => warn!(pid, worker, error = %e, "failed to kill stale worker"),
            }
        }
        Ok(ReloadOutcome::StaleKilled { killed })
    }
}

/// fluentd 프로세스 감독자
pub struct FluentdPiloter<I: ProcessInspector = ProcfsInspector> {
    shared: Arc<Shared<I>>,
    conf_home: PathBuf,
}

impl FluentdPiloter<ProcfsInspector> {
    /// procfs 조회기와 설정의 재시작 정책으로 감독자를 생성합니다.
    pub fn new(config: FluentdPiloterConfig) -> Result<Self, ConfigError> {
        FluentdPiloterBuilder::new()
            .config(config)
            .inspector(ProcfsInspector::default())
            .build()
    }
}

impl<I: ProcessInspector> FluentdPiloter<I> {
    /// 감독 설정
    pub fn config(&self) -> &FluentdPiloterConfig {
        &self.shared.config
    }

    /// 현재 프로세스 pid
    pub fn pid(&self) -> Option<u32> {
        self.shared.lock_state().running.map(|h| h.pid)
    }

    /// 프로세스 보유 여부
    pub fn is_running(&self) -> bool {
        self.pid().is_some()
    }

    /// 지금까지 실행한 프로세스 수 (재시작 포함)
    pub fn spawn_count(&self) -> u64 {
        self.shared.lock_state().spawns
    }

    /// reload를 수행하고 worker 교체 여부를 반환합니다.
    ///
    /// 확인 절차는 별도 태스크에서 실행되지만 호출자는 완료까지 기다립니다.
    ///
    /// # Errors
    ///
    /// - `SupervisorError::NotStarted`: 보유 중인 프로세스 없음
    /// - `SupervisorError::ProcessQuery` / `Signal`: 조회 또는 시그널 실패
    /// - `SupervisorError::ReloadAborted`: 확인 태스크가 비정상 종료됨
    pub async fn reload_verified(&self) -> Result<ReloadOutcome, SupervisorError> {
        let pid = self.pid().ok_or(SupervisorError::NotStarted)?;
        let shared = Arc::clone(&self.shared);

        let outcome = tokio::spawn(async move { shared.verify_reload(pid).await })
            .await
            .map_err(|e| SupervisorError::ReloadAborted(e.to_string()))
            .and_then(|result| result);

        let label = match &outcome {
            Ok(o) => o.metric_label(),
            Err(_) => "error",
        };
        metrics::counter!(m::SUPERVISOR_RELOADS_TOTAL, m::LABEL_RESULT => label).increment(1);
        outcome
    }
}

impl<I: ProcessInspector> Piloter for FluentdPiloter<I> {
    fn name(&self) -> &str {
        PILOT_NAME
    }

    async fn start(&self) -> Result<(), SupervisorError> {
        let config = self.config();
        match config.output_destination() {
            Some(output) => info!(env = %config.output_env, output = %output, "fluentd output"),
            None => debug!(env = %config.output_env, "fluentd output not set"),
        }

        match self.shared.launch() {
            Ok(_) => {
                self.shared.lock_state().consecutive_restarts = 0;
                Ok(())
            }
            Err(SupervisorError::AlreadyStarted) => Err(SupervisorError::AlreadyStarted),
            Err(e) => {
                // 첫 실행 실패도 재시작 전략에 넘겨 계속 시도
                metrics::counter!(m::SUPERVISOR_SPAWN_FAILURES_TOTAL).increment(1);
                self.shared.schedule_restart();
                Err(e)
            }
        }
    }

    async fn stop(&self) -> Result<(), SupervisorError> {
        info!("stop requested, fluentd keeps running until the agent exits");
        Ok(())
    }

    async fn reload(&self) -> Result<(), SupervisorError> {
        self.reload_verified().await.map(|_| ())
    }

    fn conf_home(&self) -> &Path {
        &self.conf_home
    }

    fn base_conf(&self) -> &Path {
        self.shared.config.base_conf()
    }

    fn on_destroy_event(&self, container_id: &str) -> Result<(), SupervisorError> {
        debug!(container_id, "destroy hook has nothing to do for fluentd");
        Ok(())
    }
}

/// 감독자 빌더
pub struct FluentdPiloterBuilder<I: ProcessInspector> {
    config: FluentdPiloterConfig,
    inspector: Option<I>,
    strategy: Option<Box<dyn RestartStrategy>>,
}

impl<I: ProcessInspector> FluentdPiloterBuilder<I> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: FluentdPiloterConfig::default(),
            inspector: None,
            strategy: None,
        }
    }

    /// 감독 설정을 지정합니다.
    pub fn config(mut self, config: FluentdPiloterConfig) -> Self {
        self.config = config;
        self
    }

    /// 프로세스 조회기를 설정합니다.
    pub fn inspector(mut self, inspector: I) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// 재시작 전략을 지정합니다. 없으면 설정의 재시작 정책을 따릅니다.
    pub fn restart_strategy(mut self, strategy: Box<dyn RestartStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// 감독자를 빌드합니다.
    pub fn build(self) -> Result<FluentdPiloter<I>, ConfigError> {
        self.config.validate()?;

        let inspector = self.inspector.ok_or_else(|| ConfigError::InvalidValue {
            field: "inspector".to_owned(),
            reason: "inspector must be provided".to_owned(),
        })?;
        let strategy = self
            .strategy
            .unwrap_or_else(|| strategy_from_config(&self.config));

        info!(
            exec = %self.config.exec_path.display(),
            base_conf = %self.config.base_conf.display(),
            restart = strategy.name(),
            "fluentd piloter configured"
        );

        Ok(FluentdPiloter {
            conf_home: self.config.conf_home(),
            shared: Arc::new(Shared {
                config: self.config,
                inspector,
                strategy,
                state: Mutex::new(State::default()),
            }),
        })
    }
}

impl<I: ProcessInspector> Default for FluentdPiloterBuilder<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, VecDeque};

    use crate::config::FluentdPiloterConfigBuilder;
    use crate::restart::{AlwaysRestart, BackoffRestart};

    /// 미리 정한 자식 집합을 순서대로 돌려주고 시그널을 기록하는 조회기
    #[derive(Default)]
    struct ScriptedInspector {
        children: Mutex<VecDeque<BTreeSet<u32>>>,
        signals: Mutex<Vec<(u32, Signal)>>,
        // 시그널 전송이 실패하는 pid (이미 종료된 프로세스 흉내)
        gone: BTreeSet<u32>,
    }

    impl ScriptedInspector {
        fn with_children(sets: &[&[u32]]) -> Self {
            Self {
                children: Mutex::new(
                    sets.iter()
                        .map(|s| s.iter().copied().collect())
                        .collect(),
                ),
                signals: Mutex::new(Vec::new()),
                gone: BTreeSet::new(),
            }
        }

        fn with_gone(mut self, pids: &[u32]) -> Self {
            self.gone = pids.iter().copied().collect();
            self
        }
    }

    impl ProcessInspector for Arc<ScriptedInspector> {
        fn children_of(&self, _pid: u32) -> Result<BTreeSet<u32>, SupervisorError> {
            self.children
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SupervisorError::ProcessQuery("script exhausted".to_owned()))
        }

        fn signal(&self, pid: u32, signal: Signal) -> Result<(), SupervisorError> {
            self.signals.lock().unwrap().push((pid, signal));
            if self.gone.contains(&pid) {
                return Err(SupervisorError::Signal {
                    pid,
                    reason: "No such process".to_owned(),
                });
            }
            Ok(())
        }
    }

    fn fake_fluentd(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-fluentd");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn config_for(dir: &Path, exec: PathBuf) -> FluentdPiloterConfig {
        FluentdPiloterConfigBuilder::new()
            .exec_path(exec)
            .base_conf(dir)
            .worker_env("TEST_LOGPILOT_FLUENTD_WORKER_UNSET")
            .reload_delay(Duration::from_millis(50))
            .build()
            .unwrap()
    }

    fn piloter<I: ProcessInspector>(
        config: FluentdPiloterConfig,
        inspector: I,
        strategy: Box<dyn RestartStrategy>,
    ) -> FluentdPiloter<I> {
        FluentdPiloterBuilder::new()
            .config(config)
            .inspector(inspector)
            .restart_strategy(strategy)
            .build()
            .unwrap()
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn builder_requires_inspector() {
        let result = FluentdPiloterBuilder::<ProcfsInspector>::new().build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let config = FluentdPiloterConfig {
            base_conf: PathBuf::from("relative"),
            ..FluentdPiloterConfig::default()
        };
        assert!(FluentdPiloter::new(config).is_err());
    }

    #[test]
    fn path_accessors_are_derived_from_base_conf() {
        let config = FluentdPiloterConfigBuilder::new()
            .base_conf("/etc/fluentd")
            .build()
            .unwrap();
        let p = FluentdPiloter::new(config).unwrap();
        assert_eq!(p.name(), "fluentd");
        assert_eq!(p.conf_home(), Path::new("/etc/fluentd/conf.d"));
        assert_eq!(p.base_conf(), Path::new("/etc/fluentd"));
        assert_eq!(
            p.conf_path("abc123"),
            PathBuf::from("/etc/fluentd/conf.d/abc123.conf")
        );
    }

    #[tokio::test]
    async fn reload_before_start_is_not_started() {
        let dir = tempfile::tempdir().unwrap();
        let p = piloter(
            config_for(dir.path(), PathBuf::from("/bin/true")),
            Arc::new(ScriptedInspector::default()),
            Box::new(AlwaysRestart),
        );
        assert!(matches!(p.reload().await, Err(SupervisorError::NotStarted)));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let p = piloter(
            config_for(dir.path(), dir.path().join("missing-fluentd")),
            Arc::new(ScriptedInspector::default()),
            Box::new(AlwaysRestart),
        );
        assert!(matches!(p.start().await, Err(SupervisorError::SpawnFailed(_))));
        assert!(!p.is_running());
        assert_eq!(p.spawn_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let exec = fake_fluentd(dir.path(), "exec sleep 30");
        let p = piloter(
            config_for(dir.path(), exec),
            Arc::new(ScriptedInspector::default()),
            Box::new(AlwaysRestart),
        );

        p.start().await.unwrap();
        assert!(p.is_running());
        assert!(matches!(p.start().await, Err(SupervisorError::AlreadyStarted)));
        assert_eq!(p.spawn_count(), 1);
    }

    #[tokio::test]
    async fn stop_keeps_process_running() {
        let dir = tempfile::tempdir().unwrap();
        let exec = fake_fluentd(dir.path(), "exec sleep 30");
        let p = piloter(
            config_for(dir.path(), exec),
            Arc::new(ScriptedInspector::default()),
            Box::new(AlwaysRestart),
        );
        p.start().await.unwrap();
        p.stop().await.unwrap();
        assert!(p.is_running());
        p.on_destroy_event("abc123").unwrap();
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn launch_passes_config_plugin_and_worker_args() {
        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args");
        let exec = fake_fluentd(
            dir.path(),
            &format!("echo \"$@\" > {}\nexec sleep 30", args_file.display()),
        );
        let config = FluentdPiloterConfig {
            worker_env: "TEST_LOGPILOT_FLUENTD_WORKER".to_owned(),
            ..config_for(dir.path(), exec)
        };
        // SAFETY: serial_test로 환경변수 접근 테스트를 직렬화
        unsafe { std::env::set_var("TEST_LOGPILOT_FLUENTD_WORKER", "2") };

        let p = piloter(
            config,
            Arc::new(ScriptedInspector::default()),
            Box::new(AlwaysRestart),
        );
        p.start().await.unwrap();
        unsafe { std::env::remove_var("TEST_LOGPILOT_FLUENTD_WORKER") };

        wait_until(|| std::fs::read_to_string(&args_file).is_ok_and(|s| s.ends_with('\n'))).await;
        let args = std::fs::read_to_string(&args_file).unwrap();
        let base = dir.path().display();
        assert_eq!(
            args.trim_end(),
            format!("-c {base}/fluentd.conf -p {base}/plugins --workers 2")
        );
    }

    #[tokio::test]
    async fn reload_with_replaced_worker_only_sends_hangup() {
        let dir = tempfile::tempdir().unwrap();
        let exec = fake_fluentd(dir.path(), "exec sleep 30");
        let inspector = Arc::new(ScriptedInspector::with_children(&[&[10], &[11]]));
        let p = piloter(
            config_for(dir.path(), exec),
            Arc::clone(&inspector),
            Box::new(AlwaysRestart),
        );
        p.start().await.unwrap();
        let pid = p.pid().unwrap();

        let started = Instant::now();
        let outcome = p.reload_verified().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(outcome, ReloadOutcome::Replaced);
        assert_eq!(*inspector.signals.lock().unwrap(), vec![(pid, Signal::Hangup)]);
    }

    #[tokio::test]
    async fn reload_with_unchanged_worker_kills_it() {
        let dir = tempfile::tempdir().unwrap();
        let exec = fake_fluentd(dir.path(), "exec sleep 30");
        let inspector = Arc::new(ScriptedInspector::with_children(&[&[10], &[10]]));
        let p = piloter(
            config_for(dir.path(), exec),
            Arc::clone(&inspector),
            Box::new(AlwaysRestart),
        );
        p.start().await.unwrap();
        let pid = p.pid().unwrap();

        let outcome = p.reload_verified().await.unwrap();
        assert_eq!(outcome, ReloadOutcome::StaleKilled { killed: 1 });
        assert_eq!(
            *inspector.signals.lock().unwrap(),
            vec![(pid, Signal::Hangup), (10, Signal::Kill)]
        );
    }

    #[tokio::test]
    async fn reload_keeps_killing_after_a_worker_already_exited() {
        let dir = tempfile::tempdir().unwrap();
        let exec = fake_fluentd(dir.path(), "exec sleep 30");
        let inspector =
            Arc::new(ScriptedInspector::with_children(&[&[10, 11], &[10, 11]]).with_gone(&[10]));
        let p = piloter(
            config_for(dir.path(), exec),
            Arc::clone(&inspector),
            Box::new(AlwaysRestart),
        );
        p.start().await.unwrap();
        let pid = p.pid().unwrap();

        let outcome = p.reload_verified().await.unwrap();
        assert_eq!(outcome, ReloadOutcome::StaleKilled { killed: 1 });
        assert_eq!(
            *inspector.signals.lock().unwrap(),
            vec![(pid, Signal::Hangup), (10, Signal::Kill), (11, Signal::Kill)]
        );
    }

    #[tokio::test]
    async fn reload_query_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let exec = fake_fluentd(dir.path(), "exec sleep 30");
        let inspector = Arc::new(ScriptedInspector::with_children(&[&[10]]));
        let p = piloter(
            config_for(dir.path(), exec),
            Arc::clone(&inspector),
            Box::new(AlwaysRestart),
        );
        p.start().await.unwrap();

        let err = p.reload().await.unwrap_err();
        assert!(matches!(err, SupervisorError::ProcessQuery(_)));
    }

    #[tokio::test]
    async fn crashed_process_is_restarted_with_new_pid() {
        let dir = tempfile::tempdir().unwrap();
        let exec = fake_fluentd(dir.path(), "exec sleep 30");
        let p = piloter(
            config_for(dir.path(), exec),
            ProcfsInspector::default(),
            Box::new(AlwaysRestart),
        );
        p.start().await.unwrap();
        let first = p.pid().unwrap();

        ProcfsInspector::default().signal(first, Signal::Kill).unwrap();

        wait_until(|| p.pid().is_some_and(|pid| pid != first)).await;
        assert_eq!(p.spawn_count(), 2);
    }

    #[tokio::test]
    async fn backoff_strategy_stops_after_limit() {
        let dir = tempfile::tempdir().unwrap();
        let exec = fake_fluentd(dir.path(), "exit 1");
        let p = piloter(
            config_for(dir.path(), exec),
            Arc::new(ScriptedInspector::default()),
            Box::new(BackoffRestart::new(
                Duration::from_millis(1),
                Duration::from_millis(1),
                Some(2),
            )),
        );
        p.start().await.unwrap();

        wait_until(|| p.spawn_count() == 3 && !p.is_running()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(p.spawn_count(), 3);
        assert!(!p.is_running());
    }

    #[tokio::test]
    async fn clean_exit_is_also_restarted() {
        let dir = tempfile::tempdir().unwrap();
        let exec = fake_fluentd(dir.path(), "exit 0");
        let p = piloter(
            config_for(dir.path(), exec),
            Arc::new(ScriptedInspector::default()),
            Box::new(BackoffRestart::new(
                Duration::from_millis(1),
                Duration::from_millis(1),
                Some(1),
            )),
        );
        p.start().await.unwrap();

        wait_until(|| p.spawn_count() == 2 && !p.is_running()).await;
    }

    #[tokio::test]
    async fn failed_relaunch_keeps_retrying() {
        let dir = tempfile::tempdir().unwrap();
        // 첫 실행이 자기 자신을 지우고 종료 → 재실행은 spawn 단계에서 실패
        let exec = fake_fluentd(dir.path(), "rm -f \"$0\"\nexit 1");
        let p = piloter(
            config_for(dir.path(), exec),
            Arc::new(ScriptedInspector::default()),
            Box::new(AlwaysRestart),
        );
        p.start().await.unwrap();

        wait_until(|| !p.is_running()).await;
        assert_eq!(p.spawn_count(), 1);

        fake_fluentd(dir.path(), "exec sleep 30");
        wait_until(|| p.is_running()).await;
        assert_eq!(p.spawn_count(), 2);
    }

    #[tokio::test]
    async fn failed_start_is_retried_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let exec = dir.path().join("fake-fluentd");
        let p = piloter(
            config_for(dir.path(), exec),
            Arc::new(ScriptedInspector::default()),
            Box::new(AlwaysRestart),
        );
        assert!(matches!(p.start().await, Err(SupervisorError::SpawnFailed(_))));
        assert!(!p.is_running());

        fake_fluentd(dir.path(), "exec sleep 30");
        wait_until(|| p.is_running()).await;
        assert_eq!(p.spawn_count(), 1);
    }

    #[tokio::test]
    async fn backoff_limit_also_bounds_spawn_retries() {
        let dir = tempfile::tempdir().unwrap();
        let p = piloter(
            config_for(dir.path(), dir.path().join("missing-fluentd")),
            Arc::new(ScriptedInspector::default()),
            Box::new(BackoffRestart::new(
                Duration::from_millis(1),
                Duration::from_millis(1),
                Some(2),
            )),
        );
        assert!(p.start().await.is_err());

        wait_until(|| !p.shared.lock_state().restarting).await;
        assert_eq!(p.spawn_count(), 0);
        assert!(!p.is_running());
    }
}
