//! 텔레그램 봇 명령어 핸들러.
//!
//! 사용자로부터 명령어를 수신하고 처리합니다.
//! - `/start` - 현재 채팅을 알림 대상으로 선택
//! - `/stop` - 알림 중지
//! - `/check` - 현재 RSI 즉시 확인 (차트 첨부, 핸들러가 직접 전송)
//! - `/mode` - 알림 모드 설정
//! - `/timerange` - RSI 계산 기간 설정
//! - `/summary` - 현재 설정 요약

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use xtr_core::{AlertMode, Destination, TimeRange};

use crate::telegram::{TelegramConfig, TelegramSender};
use crate::types::{escape_html, DispatchError, NotificationResult};

/// 텔레그램 봇 업데이트 응답.
#[derive(Debug, Deserialize)]
struct TelegramUpdates {
    ok: bool,
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

/// 개별 업데이트.
#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

/// 메시지 정보.
#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: TelegramChat,
    text: Option<String>,
}

/// 채팅 정보.
#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
    title: Option<String>,
    username: Option<String>,
    first_name: Option<String>,
}

impl TelegramChat {
    /// 알림 대상으로 변환 (그룹 제목, @사용자명, 이름 순).
    fn destination(&self) -> Destination {
        let name = self
            .title
            .clone()
            .or_else(|| self.username.as_ref().map(|u| format!("@{}", u)))
            .or_else(|| self.first_name.clone());

        match name {
            Some(name) => Destination::new(self.id).with_name(name),
            None => Destination::new(self.id),
        }
    }
}

/// 봇 명령어 타입.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// 현재 채팅을 알림 대상으로 선택
    Start,
    /// 알림 대상 해제
    Stop,
    /// 즉시 RSI 확인
    Check,
    /// 알림 모드 설정 (인자가 없으면 선택지 안내)
    Mode(Option<AlertMode>),
    /// 조회 기간 설정 (인자가 없으면 선택지 안내)
    TimeRange(Option<TimeRange>),
    /// 설정 요약
    Summary,
    /// 도움말
    Help,
    /// 인자를 해석할 수 없음
    InvalidArgument { command: String, value: String },
    /// 알 수 없는 명령어
    Unknown(String),
}

impl BotCommand {
    /// 텍스트에서 명령어 파싱.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        // /명령어 형식 확인
        let Some(body) = text.strip_prefix('/') else {
            return BotCommand::Unknown(text.to_string());
        };

        let parts: Vec<&str> = body.split_whitespace().collect();
        // 그룹 채팅의 "/check@MyBot" 형식
        let command = parts
            .first()
            .map(|s| s.split('@').next().unwrap_or_default().to_lowercase());
        let argument = parts.get(1).copied();

        match command.as_deref() {
            Some("start") => BotCommand::Start,
            Some("stop") => BotCommand::Stop,
            Some("check") | Some("c") => BotCommand::Check,
            Some("mode") | Some("m") => match argument {
                None => BotCommand::Mode(None),
                Some(value) => match value.parse::<AlertMode>() {
                    Ok(mode) => BotCommand::Mode(Some(mode)),
                    Err(_) => BotCommand::InvalidArgument {
                        command: "mode".to_string(),
                        value: value.to_string(),
                    },
                },
            },
            Some("timerange") | Some("range") | Some("t") => match argument {
                None => BotCommand::TimeRange(None),
                Some(value) => match value.parse::<TimeRange>() {
                    Ok(range) => BotCommand::TimeRange(Some(range)),
                    Err(_) => BotCommand::InvalidArgument {
                        command: "timerange".to_string(),
                        value: value.to_string(),
                    },
                },
            },
            Some("summary") | Some("s") => BotCommand::Summary,
            Some("help") | Some("h") => BotCommand::Help,
            _ => BotCommand::Unknown(text.to_string()),
        }
    }
}

/// 명령어 응답 데이터.
#[derive(Debug, Clone)]
pub struct CommandResponse {
    /// 응답 텍스트 (HTML 형식)
    pub text: String,
    /// 핸들러가 이미 요청한 채팅으로 결과를 보냈는지 여부
    pub delivered: bool,
}

impl CommandResponse {
    /// HTML 형식 응답 생성.
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delivered: false,
        }
    }

    /// 핸들러가 직접 전송을 마친 경우의 응답 (추가 응답 없음).
    pub fn delivered() -> Self {
        Self {
            text: String::new(),
            delivered: true,
        }
    }
}

/// 봇 명령어 핸들러 trait.
///
/// 각 명령어의 실제 로직을 구현합니다. `chat`은 명령을 보낸 채팅입니다.
#[async_trait]
pub trait BotCommandHandler: Send + Sync {
    /// 알림 대상 선택.
    async fn handle_start(&self, chat: Destination) -> NotificationResult<CommandResponse>;

    /// 알림 대상 해제.
    async fn handle_stop(&self, chat: &Destination) -> NotificationResult<CommandResponse>;

    /// 즉시 RSI 확인.
    ///
    /// 차트 파일은 다른 작업과 공유되므로 구현체가 렌더링과 같은 임계 구역
    /// 안에서 `chat`으로 직접 전송하고 `CommandResponse::delivered()`를 반환합니다.
    async fn handle_check(&self, chat: &Destination) -> NotificationResult<CommandResponse>;

    /// 알림 모드 설정.
    async fn handle_mode(&self, mode: AlertMode) -> NotificationResult<CommandResponse>;

    /// 조회 기간 설정.
    async fn handle_time_range(&self, range: TimeRange) -> NotificationResult<CommandResponse>;

    /// 설정 요약.
    async fn handle_summary(&self) -> NotificationResult<CommandResponse>;
}

/// `/mode` 선택지 안내.
pub fn mode_menu() -> CommandResponse {
    CommandResponse::html(
        "Choose a mode:\n\n\
         🚫 /mode off - Turn off any alerts and reports\n\
         ✅ /mode on - Turn on hourly reports\n\
         🚨 /mode alert - Set to alert mode",
    )
}

/// `/timerange` 선택지 안내.
pub fn time_range_menu() -> CommandResponse {
    CommandResponse::html(
        "Choose a time range:\n\n\
         🕙 /timerange 1d - Last 24 hours\n\
         📅 /timerange 1w - Last week\n\
         ⌛ /timerange 1M - Last month",
    )
}

/// 도움말 메시지.
pub fn help_message() -> CommandResponse {
    CommandResponse::html(
        "🤖 <b>RSI Alert Bot</b>\n\n\
         <b>Commands:</b>\n\n\
         /start - Start sending updates to this chat\n\
         /stop - Stop notifications\n\
         /check - Check the current RSI\n\
         /mode [off|on|alert] - Set the mode for RSI alerts\n\
         /timerange [1d|1w|1M] - Set the time range for RSI calculation\n\
         /summary - Display the current configuration summary\n\
         /help - Show this message",
    )
}

/// 텔레그램 봇 핸들러.
///
/// Long polling으로 업데이트를 수신하고 명령어를 처리합니다.
pub struct TelegramBotHandler<H: BotCommandHandler> {
    sender: TelegramSender,
    handler: Arc<H>,
    last_update_id: RwLock<i64>,
    /// 허용된 채팅 ID 목록 (비어있으면 모두 허용)
    allowed_chat_ids: Vec<i64>,
}

impl<H: BotCommandHandler> TelegramBotHandler<H> {
    /// 새 봇 핸들러 생성.
    pub fn new(config: TelegramConfig, handler: Arc<H>) -> Self {
        Self {
            sender: TelegramSender::new(config),
            handler,
            last_update_id: RwLock::new(0),
            allowed_chat_ids: Vec::new(),
        }
    }

    /// 허용 채팅 ID 설정.
    pub fn with_allowed_chat_ids(mut self, chat_ids: Vec<i64>) -> Self {
        self.allowed_chat_ids = chat_ids;
        self
    }

    fn is_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chat_ids.is_empty() || self.allowed_chat_ids.contains(&chat_id)
    }

    /// 봇 폴링 시작.
    ///
    /// 무한 루프로 업데이트를 수신합니다.
    pub async fn start_polling(&self) {
        info!("텔레그램 봇 폴링 시작");

        loop {
            if let Err(e) = self.poll_once().await {
                error!("업데이트 폴링 실패: {}", e);
                // 에러 발생 시 잠시 대기
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }

    /// 업데이트를 한 번 받아 모두 처리하고 처리한 개수를 반환합니다.
    pub async fn poll_once(&self) -> NotificationResult<usize> {
        let updates = self.poll_updates().await?;
        let count = updates.len();

        for update in updates {
            if let Err(e) = self.process_update(update).await {
                error!("업데이트 처리 실패: {}", e);
            }
        }

        Ok(count)
    }

    /// 업데이트 폴링.
    async fn poll_updates(&self) -> NotificationResult<Vec<TelegramUpdate>> {
        let last_id = *self.last_update_id.read().await;
        let timeout_secs = self.sender.config().poll_timeout_secs;

        let params = serde_json::json!({
            "offset": last_id + 1,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });

        let response = self
            .sender
            .client()
            .post(self.sender.config().method_url("getUpdates"))
            .json(&params)
            .timeout(Duration::from_secs(timeout_secs + 5))
            .send()
            .await?;

        let updates: TelegramUpdates = response.json().await?;

        if !updates.ok {
            return Err(DispatchError::TransportFailure(
                "텔레그램 API 응답 실패".to_string(),
            ));
        }

        // 마지막 업데이트 ID 갱신
        if let Some(last) = updates.result.last() {
            *self.last_update_id.write().await = last.update_id;
        }

        Ok(updates.result)
    }

    /// 개별 업데이트 처리.
    async fn process_update(&self, update: TelegramUpdate) -> NotificationResult<()> {
        let Some(message) = update.message else {
            return Ok(());
        };

        let chat_id = message.chat.id;

        // 허용된 채팅 ID 확인
        if !self.is_allowed(chat_id) {
            warn!(chat_id = chat_id, "허용되지 않은 채팅 ID에서 메시지 수신");
            return Ok(());
        }

        let Some(text) = message.text else {
            return Ok(());
        };

        debug!(
            chat_id = chat_id,
            text = %text,
            "명령어 수신"
        );

        // 명령어 파싱 및 처리
        let command = BotCommand::parse(&text);
        let response = self
            .execute_command(command, message.chat.destination())
            .await?;

        // 응답 전송
        self.send_response(chat_id, &response).await
    }

    /// 명령어 실행.
    async fn execute_command(
        &self,
        command: BotCommand,
        chat: Destination,
    ) -> NotificationResult<CommandResponse> {
        match command {
            BotCommand::Start => self.handler.handle_start(chat).await,
            BotCommand::Stop => self.handler.handle_stop(&chat).await,
            BotCommand::Check => self.handler.handle_check(&chat).await,
            BotCommand::Mode(Some(mode)) => self.handler.handle_mode(mode).await,
            BotCommand::Mode(None) => Ok(mode_menu()),
            BotCommand::TimeRange(Some(range)) => self.handler.handle_time_range(range).await,
            BotCommand::TimeRange(None) => Ok(time_range_menu()),
            BotCommand::Summary => self.handler.handle_summary().await,
            BotCommand::Help => Ok(help_message()),
            BotCommand::InvalidArgument { command, value } => {
                let menu = if command == "mode" {
                    mode_menu()
                } else {
                    time_range_menu()
                };
                Ok(CommandResponse::html(format!(
                    "❓ Unknown value for /{}: <code>{}</code>\n\n{}",
                    command,
                    escape_html(&value),
                    menu.text
                )))
            }
            BotCommand::Unknown(text) => Ok(CommandResponse::html(format!(
                "❓ <b>Unknown command</b>\n\n\
                 Input: <code>{}</code>\n\n\
                 Use /help to see the available commands.",
                escape_html(&text)
            ))),
        }
    }

    /// 응답 메시지 전송.
    async fn send_response(
        &self,
        chat_id: i64,
        response: &CommandResponse,
    ) -> NotificationResult<()> {
        if response.delivered {
            return Ok(());
        }

        self.sender.send_message(chat_id, &response.text).await?;

        debug!(chat_id = chat_id, "응답 전송 완료");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(BotCommand::parse("/start"), BotCommand::Start);
        assert_eq!(BotCommand::parse("/stop"), BotCommand::Stop);
        assert_eq!(BotCommand::parse("  /check  "), BotCommand::Check);
        assert_eq!(BotCommand::parse("/summary"), BotCommand::Summary);
        assert_eq!(BotCommand::parse("/help"), BotCommand::Help);
    }

    #[test]
    fn test_parse_command_with_bot_mention() {
        assert_eq!(BotCommand::parse("/check@XtrRsiBot"), BotCommand::Check);
        assert_eq!(
            BotCommand::parse("/mode@XtrRsiBot off"),
            BotCommand::Mode(Some(AlertMode::Off))
        );
    }

    #[test]
    fn test_parse_mode_command() {
        assert_eq!(BotCommand::parse("/mode"), BotCommand::Mode(None));
        assert_eq!(
            BotCommand::parse("/mode on"),
            BotCommand::Mode(Some(AlertMode::AlwaysOn))
        );
        assert_eq!(
            BotCommand::parse("/mode alert"),
            BotCommand::Mode(Some(AlertMode::ThresholdOnly))
        );
        assert_eq!(
            BotCommand::parse("/mode loud"),
            BotCommand::InvalidArgument {
                command: "mode".to_string(),
                value: "loud".to_string()
            }
        );
    }

    #[test]
    fn test_parse_timerange_command() {
        assert_eq!(BotCommand::parse("/timerange"), BotCommand::TimeRange(None));
        assert_eq!(
            BotCommand::parse("/timerange 1d"),
            BotCommand::TimeRange(Some(TimeRange::Day))
        );
        assert_eq!(
            BotCommand::parse("/timerange 1M"),
            BotCommand::TimeRange(Some(TimeRange::Month))
        );
        assert!(matches!(
            BotCommand::parse("/timerange 2y"),
            BotCommand::InvalidArgument { .. }
        ));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(matches!(BotCommand::parse("/unknown"), BotCommand::Unknown(_)));
        assert!(matches!(BotCommand::parse("not a command"), BotCommand::Unknown(_)));
    }

    #[test]
    fn test_chat_destination_name() {
        let group = TelegramChat {
            id: -100,
            title: Some("Traders".to_string()),
            username: None,
            first_name: None,
        };
        assert_eq!(group.destination().name.as_deref(), Some("Traders"));

        let private = TelegramChat {
            id: 42,
            title: None,
            username: Some("alice".to_string()),
            first_name: Some("Alice".to_string()),
        };
        assert_eq!(private.destination().name.as_deref(), Some("@alice"));
    }

    #[test]
    fn test_menus_list_options() {
        assert!(mode_menu().text.contains("/mode alert"));
        assert!(time_range_menu().text.contains("/timerange 1M"));
        assert!(help_message().text.contains("/summary"));
    }
}
