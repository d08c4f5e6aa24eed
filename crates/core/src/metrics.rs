//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logpilot_`
//! - 모듈명: `sync_`, `supervisor_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logpilot_core::metrics::SYNC_EVENTS_TOTAL, "action" => "start").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 이벤트 액션 레이블 키 (start, destroy)
pub const LABEL_ACTION: &str = "action";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Container Sync 메트릭 ──────────────────────────────────────────

/// Sync: 처리한 컨테이너 이벤트 수 (counter, label: action)
pub const SYNC_EVENTS_TOTAL: &str = "logpilot_sync_events_total";

/// Sync: 이벤트 스트림 재구독 횟수 (counter)
pub const SYNC_STREAM_RESUBSCRIBES_TOTAL: &str = "logpilot_sync_stream_resubscribes_total";

/// Sync: 작성된 컨테이너 설정 파일 수 (counter)
pub const SYNC_CONFIGS_WRITTEN_TOTAL: &str = "logpilot_sync_configs_written_total";

/// Sync: 삭제된 컨테이너 설정 파일 수 (counter)
pub const SYNC_CONFIGS_REMOVED_TOTAL: &str = "logpilot_sync_configs_removed_total";

/// Sync: 잘못된 레이블로 건너뛴 로그 항목 수 (counter)
pub const SYNC_LABEL_ERRORS_TOTAL: &str = "logpilot_sync_label_errors_total";

/// Sync: 설정 파일을 보유한 컨테이너 수 (gauge)
pub const SYNC_MANAGED_CONTAINERS: &str = "logpilot_sync_managed_containers";

/// Sync: 재스캔 소요 시간 (histogram, 초)
pub const SYNC_RESCAN_DURATION_SECONDS: &str = "logpilot_sync_rescan_duration_seconds";

// ─── Supervisor 메트릭 ──────────────────────────────────────────────

/// Supervisor: 실행된 수집기 프로세스 수 (counter)
pub const SUPERVISOR_SPAWNS_TOTAL: &str = "logpilot_supervisor_spawns_total";

/// Supervisor: 수집기 프로세스 종료로 인한 재시작 수 (counter)
pub const SUPERVISOR_RESTARTS_TOTAL: &str = "logpilot_supervisor_restarts_total";

/// Supervisor: 수집기 프로세스 실행 실패 수 (counter)
pub const SUPERVISOR_SPAWN_FAILURES_TOTAL: &str = "logpilot_supervisor_spawn_failures_total";

/// Supervisor: reload 요청 수 (counter, label: result)
pub const SUPERVISOR_RELOADS_TOTAL: &str = "logpilot_supervisor_reloads_total";

/// Supervisor: reload 후 강제 종료한 worker 수 (counter)
pub const SUPERVISOR_STALE_WORKERS_KILLED_TOTAL: &str =
    "logpilot_supervisor_stale_workers_killed_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logpilot_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version)
pub const DAEMON_BUILD_INFO: &str = "logpilot_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 재스캔 소요 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 60s 범위 (컨테이너 수에 비례)
pub const RESCAN_DURATION_BUCKETS: [f64; 8] = [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `logpilot-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Container Sync
    describe_counter!(
        SYNC_EVENTS_TOTAL,
        "Total number of container lifecycle events handled"
    );
    describe_counter!(
        SYNC_STREAM_RESUBSCRIBES_TOTAL,
        "Total number of event stream resubscriptions after an error"
    );
    describe_counter!(
        SYNC_CONFIGS_WRITTEN_TOTAL,
        "Total number of per-container config files written"
    );
    describe_counter!(
        SYNC_CONFIGS_REMOVED_TOTAL,
        "Total number of per-container config files removed"
    );
    describe_counter!(
        SYNC_LABEL_ERRORS_TOTAL,
        "Total number of log label entries skipped as invalid"
    );
    describe_gauge!(
        SYNC_MANAGED_CONTAINERS,
        "Number of containers with a config file on disk"
    );
    describe_histogram!(
        SYNC_RESCAN_DURATION_SECONDS,
        "Time to complete a full container rescan in seconds"
    );

    // Supervisor
    describe_counter!(
        SUPERVISOR_SPAWNS_TOTAL,
        "Total number of log shipper processes spawned"
    );
    describe_counter!(
        SUPERVISOR_RESTARTS_TOTAL,
        "Total number of log shipper restarts after exit"
    );
    describe_counter!(
        SUPERVISOR_SPAWN_FAILURES_TOTAL,
        "Total number of failed log shipper spawn attempts"
    );
    describe_counter!(
        SUPERVISOR_RELOADS_TOTAL,
        "Total number of reload requests by result"
    );
    describe_counter!(
        SUPERVISOR_STALE_WORKERS_KILLED_TOTAL,
        "Total number of stale workers killed after reload"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Logpilot daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
