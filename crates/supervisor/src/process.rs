//! 프로세스 조회 및 시그널 전송
//!
//! reload 확인 절차는 감독 대상 프로세스의 직계 자식 목록을 비교합니다.
//! [`ProcessInspector`]는 그 조회와 시그널 전송을 추상화하며,
//! 기본 구현 [`ProcfsInspector`]는 `/proc/<pid>/stat`의 부모 pid를 읽습니다.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use logpilot_core::error::SupervisorError;

/// 감독자가 보내는 시그널
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// 설정 reload 요청 (SIGHUP)
    Hangup,
    /// 강제 종료 (SIGKILL)
    Kill,
}

impl Signal {
    /// libc 시그널 번호
    pub fn as_raw(self) -> libc::c_int {
        match self {
            Self::Hangup => libc::SIGHUP,
            Self::Kill => libc::SIGKILL,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hangup => write!(f, "SIGHUP"),
            Self::Kill => write!(f, "SIGKILL"),
        }
    }
}

/// 프로세스 조회/시그널 인터페이스
pub trait ProcessInspector: Send + Sync + 'static {
    /// `pid`를 부모로 갖는 프로세스 pid 집합
    fn children_of(&self, pid: u32) -> Result<BTreeSet<u32>, SupervisorError>;

    /// `pid`에 시그널을 보냅니다.
    fn signal(&self, pid: u32, signal: Signal) -> Result<(), SupervisorError>;
}

/// procfs 기반 구현
#[derive(Debug, Clone)]
pub struct ProcfsInspector {
    proc_root: PathBuf,
}

impl Default for ProcfsInspector {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcfsInspector {
    /// procfs 마운트 위치로 생성합니다.
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// procfs 마운트 위치
    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }
}

impl ProcessInspector for ProcfsInspector {
    fn children_of(&self, pid: u32) -> Result<BTreeSet<u32>, SupervisorError> {
        let entries = std::fs::read_dir(&self.proc_root).map_err(|e| {
            SupervisorError::ProcessQuery(format!("{}: {e}", self.proc_root.display()))
        })?;

        let mut children = BTreeSet::new();
        for entry in entries.flatten() {
            let Some(candidate) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            // 조회 도중 종료된 프로세스는 건너뜀
            let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            if parse_ppid(&stat) == Some(pid) {
                children.insert(candidate);
            }
        }

        debug!(pid, children = ?children, "queried child processes");
        Ok(children)
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), SupervisorError> {
        let target = libc::pid_t::try_from(pid)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| SupervisorError::Signal {
                pid,
                reason: "invalid pid".to_owned(),
            })?;

        // SAFETY: kill(2)는 메모리를 건드리지 않으며, target은 양수라 프로세스 그룹에 전달되지 않음
        let rc = unsafe { libc::kill(target, signal.as_raw()) };
        if rc != 0 {
            return Err(SupervisorError::Signal {
                pid,
                reason: std::io::Error::last_os_error().to_string(),
            });
        }
        debug!(pid, signal = %signal, "signal sent");
        Ok(())
    }
}

/// `/proc/<pid>/stat` 한 줄에서 부모 pid를 추출합니다.
///
/// comm 필드는 괄호 안에 공백이나 `)`를 포함할 수 있으므로 마지막 `)` 이후를 파싱합니다.
/// 형식: `pid (comm) state ppid ...`
pub fn parse_ppid(stat: &str) -> Option<u32> {
    let (_, rest) = stat.rsplit_once(')')?;
    let mut fields = rest.split_whitespace();
    let _state = fields.next()?;
    fields.next()?.parse().ok()
}
