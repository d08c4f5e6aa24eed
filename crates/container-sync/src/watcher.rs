//! 이벤트 감시: 런타임 이벤트 스트림 구독 및 재구독
//!
//! [`EventWatcher`]는 컨테이너 이벤트를 구독해 `start`/`destroy` 이벤트만
//! mpsc 채널로 전달합니다. 스트림 에러가 나면 즉시 재구독하고,
//! 스트림이 정상 종료(EOF)되면 채널 송신자를 drop하여 소비자에게 종료를 알립니다.
//!
//! 재구독 사이에 발생한 이벤트는 재생되지 않습니다.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use logpilot_core::metrics as m;

use crate::docker::DockerClient;
use crate::error::SyncError;
use crate::event::{ContainerAction, ContainerEvent};

/// 컨테이너 이벤트 감시자
pub struct EventWatcher<D: DockerClient> {
    docker: Arc<D>,
}

impl<D: DockerClient> EventWatcher<D> {
    /// 새 감시자를 생성합니다.
    pub fn new(docker: Arc<D>) -> Self {
        Self { docker }
    }

    /// 스트림이 EOF로 끝나거나 수신자가 닫힐 때까지 이벤트를 전달합니다.
    ///
    /// # Errors
    ///
    /// `SyncError::Channel`: 수신자가 먼저 닫힘
    pub async fn run(self, tx: mpsc::Sender<ContainerEvent>) -> Result<(), SyncError> {
        let mut subscription: u64 = 0;
        loop {
            subscription += 1;
            debug!(subscription, "subscribing to container events");
            let mut stream = self.docker.events();

            loop {
                match stream.next().await {
                    None => {
                        info!(subscription, "container event stream ended");
                        return Ok(());
                    }
                    Some(Ok(event)) => {
                        if let ContainerAction::Other(action) = &event.action {
                            debug!(action = action.as_str(), "ignoring container event");
                            continue;
                        }
                        tx.send(event).await.map_err(|_| {
                            SyncError::Channel("event receiver dropped".to_owned())
                        })?;
                    }
                    Some(Err(e)) => {
                        metrics::counter!(m::SYNC_STREAM_RESUBSCRIBES_TOTAL).increment(1);
                        warn!(subscription, error = %e, "container event stream failed, resubscribing");
                        break;
                    }
                }
            }
        }
    }
}
