//! Daemon assembly -- configuration loading, component wiring, and lifecycle.
//!
//! # Startup
//!
//! 1. Load `logpilot.toml` (or defaults), apply `LOGPILOT_*` env and CLI overrides, validate
//! 2. Install the Prometheus recorder when `[metrics].enabled`
//! 3. Connect to Docker and ping it
//! 4. Build `FluentdPiloter` and `Reconciler`
//! 5. Run the reconciler (initial rescan, fluentd start, event loop) until
//!    the event stream ends or SIGTERM/SIGINT arrives

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::broadcast;

use logpilot_container_sync::{
    BollardDockerClient, ConfigRenderer, DockerClient, FluentdRenderer, Reconciler,
    ReconcilerBuilder, SyncConfig,
};
use logpilot_core::Piloter;
use logpilot_core::config::LogpilotConfig;
use logpilot_supervisor::{FluentdPiloter, FluentdPiloterConfig};

use crate::cli::DaemonCli;
use crate::metrics_server;

/// Load the effective configuration for this invocation.
///
/// Precedence: CLI flags > `LOGPILOT_*` environment > config file > defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or validation fails.
pub async fn load_config(cli: &DaemonCli) -> Result<LogpilotConfig> {
    let mut config = match &cli.config {
        Some(path) => LogpilotConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config {}: {e}", path.display()))?,
        None => LogpilotConfig::default(),
    };
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;
    Ok(config)
}

/// Build the reconciler with the production fluentd supervisor and renderer.
pub fn build_reconciler<D: DockerClient>(
    config: &LogpilotConfig,
    docker: Arc<D>,
) -> Result<Reconciler<D, FluentdPiloter, FluentdRenderer>> {
    let piloter = FluentdPiloter::new(FluentdPiloterConfig::from_core(config))
        .map_err(|e| anyhow::anyhow!("failed to build fluentd supervisor: {e}"))?;

    ReconcilerBuilder::new()
        .config(SyncConfig::from_core(config))
        .docker_client(docker)
        .piloter(Arc::new(piloter))
        .renderer(FluentdRenderer::new(&config.fluentd.pos_file))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build reconciler: {e}"))
}

/// Run the daemon until the event stream ends or a shutdown signal arrives.
pub async fn run(config: LogpilotConfig) -> Result<()> {
    let start_time = Instant::now();
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let uptime_task = if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
        record_build_info();
        Some(spawn_uptime_updater(start_time, shutdown_tx.subscribe()))
    } else {
        None
    };

    let docker = Arc::new(
        BollardDockerClient::connect(&config.docker.socket)
            .map_err(|e| anyhow::anyhow!("failed to create docker client: {e}"))?,
    );
    docker
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("docker daemon is not reachable: {e}"))?;
    tracing::info!(socket = %config.docker.socket, "connected to docker");

    let reconciler = build_reconciler(&config, docker)?;
    tracing::info!(
        label_prefix = %config.pilot.label_prefix,
        host_root = %config.pilot.host_root,
        conf_home = %reconciler.store().dir().display(),
        "logpilot-daemon starting"
    );

    let result = run_until_shutdown(&reconciler, wait_for_shutdown_signal()).await;

    let _ = shutdown_tx.send(());
    if let Some(task) = uptime_task {
        let _ = task.await;
    }

    tracing::info!("logpilot-daemon shut down");
    result
}

/// Drive the reconciler, racing it against `shutdown`.
///
/// The supervisor's `stop()` is invoked on the way out either way.
pub async fn run_until_shutdown<D, P, R, S>(
    reconciler: &Reconciler<D, P, R>,
    shutdown: S,
) -> Result<()>
where
    D: DockerClient,
    P: Piloter,
    R: ConfigRenderer,
    S: Future<Output = Result<&'static str>>,
{
    let outcome = tokio::select! {
        result = reconciler.run() => {
            result.map_err(|e| anyhow::anyhow!("reconciler failed: {e}")).map(|()| {
                tracing::info!("container event stream ended");
            })
        }
        signal = shutdown => {
            signal.map(|name| tracing::info!(signal = name, "shutdown signal received"))
        }
    };

    if let Err(e) = reconciler.piloter().stop().await {
        tracing::warn!(error = %e, "failed to stop log shipper");
    }
    outcome
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {e}"))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

fn record_build_info() {
    use logpilot_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use logpilot_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
