//! 텔레그램 명령어 처리.
//!
//! 봇 명령어를 파이프라인의 설정 변경과 즉시 확인으로 연결합니다.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use xtr_core::{AlertMode, Destination, TimeRange};
use xtr_notification::{escape_html, BotCommandHandler, CommandResponse, NotificationResult};

use crate::pipeline::{AlertPipeline, ConfigSummary};

/// 파이프라인 연동 봇 핸들러.
pub struct PipelineCommands {
    pipeline: Arc<AlertPipeline>,
}

impl PipelineCommands {
    /// 새 핸들러 생성.
    pub fn new(pipeline: Arc<AlertPipeline>) -> Self {
        Self { pipeline }
    }

    /// 모드 이름 (첫 글자 대문자).
    fn mode_title(mode: AlertMode) -> String {
        let name = mode.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// 채팅 표시 이름.
    fn chat_name(destination: &Destination) -> String {
        match &destination.name {
            Some(name) => escape_html(name),
            None => destination.chat_id.to_string(),
        }
    }
}

/// `/summary` 응답 본문.
pub fn summary_html(summary: &ConfigSummary) -> String {
    let config = &summary.config;
    let channel = config
        .destination
        .as_ref()
        .map(PipelineCommands::chat_name)
        .unwrap_or_else(|| "None selected.".to_string());
    let watermark = summary
        .watermark
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string());
    let stats = &summary.stats;

    format!(
        "📋 <b>Current Configuration Summary</b>\n\n\
         <b>Alert Mode</b>\n<u>{mode}</u> - {mode_description}.\n\n\
         <b>Time range</b>\n{range}\n\n\
         <b>Channel for Alerts</b>\n{channel}\n\n\
         <b>Polling</b>\n\
         Symbol: <code>{symbol}</code>\n\
         Last bar: {watermark}\n\
         Ticks: {ticks} | Fetches: {fetches} | Fetch errors: {fetch_errors}\n\
         New bars: {changes} | Alerts sent: {alerts_sent} | Dispatch errors: {dispatch_errors}",
        mode = PipelineCommands::mode_title(config.mode),
        mode_description = config.mode.description(),
        range = config.time_range.description(),
        channel = channel,
        symbol = summary.symbol,
        watermark = watermark,
        ticks = stats.ticks,
        fetches = stats.fetches,
        fetch_errors = stats.fetch_errors,
        changes = stats.changes,
        alerts_sent = stats.alerts_sent,
        dispatch_errors = stats.dispatch_errors,
    )
}

#[async_trait]
impl BotCommandHandler for PipelineCommands {
    async fn handle_start(&self, chat: Destination) -> NotificationResult<CommandResponse> {
        let name = Self::chat_name(&chat);
        self.pipeline.on_user_select_destination(chat).await;

        Ok(CommandResponse::html(format!(
            "✅ Selected this chat for updates: <b>{}</b>",
            name
        )))
    }

    async fn handle_stop(&self, chat: &Destination) -> NotificationResult<CommandResponse> {
        debug!(chat = %chat, "알림 중지 요청");
        self.pipeline.on_user_clear_destination().await;

        Ok(CommandResponse::html(
            "🛑 Notifications have been stopped for this chat.",
        ))
    }

    async fn handle_check(&self, chat: &Destination) -> NotificationResult<CommandResponse> {
        // 결과와 실패 안내문은 파이프라인이 잠금 안에서 직접 보냄
        if let Err(e) = self.pipeline.on_user_request_check(chat).await {
            debug!(chat = %chat, "즉시 확인 종료: {}", e);
        }
        Ok(CommandResponse::delivered())
    }

    async fn handle_mode(&self, mode: AlertMode) -> NotificationResult<CommandResponse> {
        self.pipeline.on_user_set_mode(mode).await;

        Ok(CommandResponse::html(format!(
            "⚙️ Alert mode set to: <b>{}</b> - {}.",
            mode,
            mode.description()
        )))
    }

    async fn handle_time_range(&self, range: TimeRange) -> NotificationResult<CommandResponse> {
        self.pipeline.on_user_set_time_range(range).await;

        Ok(CommandResponse::html(format!(
            "🕙 You chose: <b>{}</b> ({})",
            range,
            range.description()
        )))
    }

    async fn handle_summary(&self) -> NotificationResult<CommandResponse> {
        let summary = self.pipeline.summary().await;
        Ok(CommandResponse::html(summary_html(&summary)))
    }
}
