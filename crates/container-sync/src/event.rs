//! Container lifecycle events.
//!
//! [`ContainerEvent`] is the decoded form of one runtime event message:
//! an action string and the actor (container) id. Only `start` and `destroy`
//! drive reconciliation; every other action decodes to [`ContainerAction::Other`].
//!
//! # Examples
//!
//! ```
//! use logpilot_container_sync::{ContainerAction, ContainerEvent};
//!
//! let event = ContainerEvent::new("start", "abc123def456");
//! assert_eq!(event.action, ContainerAction::Start);
//! ```

use std::fmt;

use logpilot_core::types::short_id;
use serde::{Deserialize, Serialize};

/// Container lifecycle action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerAction {
    /// 컨테이너 시작됨
    Start,
    /// 컨테이너 삭제됨
    Destroy,
    /// 처리 대상이 아닌 액션 (원본 문자열 보존)
    Other(String),
}

impl ContainerAction {
    /// 런타임이 보고한 액션 문자열을 디코딩합니다.
    ///
    /// `exec_start: sh` 같은 복합 액션은 `Other`로 분류됩니다.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "start" => Self::Start,
            "destroy" => Self::Destroy,
            other => Self::Other(other.to_owned()),
        }
    }

    /// 메트릭 레이블용 이름
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Destroy => "destroy",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container event received from the runtime's event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEvent {
    /// 이벤트 액션
    pub action: ContainerAction,
    /// 대상 컨테이너 ID
    pub container_id: String,
}

impl ContainerEvent {
    /// 액션 문자열과 컨테이너 ID로 이벤트를 생성합니다.
    pub fn new(action: &str, container_id: impl Into<String>) -> Self {
        Self {
            action: ContainerAction::parse(action),
            container_id: container_id.into(),
        }
    }
}

impl fmt::Display for ContainerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, short_id(&self.container_id))
    }
}
