//! 로그 전용 알림 전송기.
//!
//! 텔레그램 토큰 없이 실행할 때 (`xtr-bot check` 등) 알림을 로그로만 남깁니다.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;
use xtr_core::Destination;

use crate::types::{AlertSender, DispatchError, NotificationResult};

/// 메시지를 tracing 로그로 출력하는 전송기.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSender;

#[async_trait]
impl AlertSender for LogSender {
    async fn send(
        &self,
        destination: Option<&Destination>,
        text: &str,
        artifact: Option<&Path>,
    ) -> NotificationResult<()> {
        let destination = destination.ok_or(DispatchError::DestinationUnset)?;

        info!(
            destination = %destination,
            artifact = ?artifact.map(|p| p.display().to_string()),
            "{}",
            text
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
