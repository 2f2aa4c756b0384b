//! 텔레그램 알림 서비스.
//!
//! Telegram Bot API를 통해 RSI 알림과 차트를 전송합니다.

use crate::types::{AlertSender, DispatchError, NotificationResult};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, error, info, warn};
use xtr_core::{Destination, TelegramSettings};

/// 텔레그램 API 기본 URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// 텔레그램 알림 전송 설정.
///
/// # 보안
/// - `Debug` 구현은 봇 토큰을 출력하지 않습니다.
pub struct TelegramConfig {
    /// @BotFather에서 받은 봇 토큰
    pub bot_token: SecretString,
    /// Bot API 기본 URL
    pub api_base_url: String,
    /// 파싱 모드 (HTML 또는 MarkdownV2)
    pub parse_mode: String,
    /// getUpdates long polling 타임아웃 (초)
    pub poll_timeout_secs: u64,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***REDACTED***")
            .field("api_base_url", &self.api_base_url)
            .field("parse_mode", &self.parse_mode)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl Clone for TelegramConfig {
    fn clone(&self) -> Self {
        Self {
            bot_token: SecretString::new(self.bot_token.expose_secret().into()),
            api_base_url: self.api_base_url.clone(),
            parse_mode: self.parse_mode.clone(),
            poll_timeout_secs: self.poll_timeout_secs,
        }
    }
}

impl TelegramConfig {
    /// 새 텔레그램 설정을 생성합니다.
    pub fn new(bot_token: impl Into<String>) -> Self {
        let bot_token: String = bot_token.into();
        Self {
            bot_token: SecretString::new(bot_token.into_boxed_str()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            parse_mode: "HTML".to_string(),
            poll_timeout_secs: 30,
        }
    }

    /// `TELEGRAM_BOT_TOKEN` 환경 변수에서 설정을 생성합니다.
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self::new(bot_token))
    }

    /// `[telegram]` 설정 섹션 값을 적용합니다.
    pub fn with_settings(mut self, settings: &TelegramSettings) -> Self {
        self.api_base_url = settings.api_base_url.trim_end_matches('/').to_string();
        self.poll_timeout_secs = settings.poll_timeout_secs;
        self
    }

    /// API 기본 URL 변경 (테스트 서버 등).
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bot API 메서드 URL.
    pub(crate) fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base_url,
            self.bot_token.expose_secret(),
            method
        )
    }
}

/// Bot API 에러 응답.
#[derive(Debug, Deserialize)]
struct TelegramErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<TelegramErrorParameters>,
}

#[derive(Debug, Deserialize)]
struct TelegramErrorParameters {
    retry_after: Option<u64>,
}

/// 텔레그램 알림 전송기.
pub struct TelegramSender {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramSender {
    /// 새 텔레그램 전송기를 생성합니다.
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// 설정 반환.
    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    /// HTTP 클라이언트 반환.
    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// 텍스트 메시지를 전송합니다.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> NotificationResult<()> {
        let params = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": self.config.parse_mode,
            "disable_web_page_preview": true,
        });

        debug!(chat_id = chat_id, "Sending Telegram message");

        let response = self
            .client
            .post(self.config.method_url("sendMessage"))
            .json(&params)
            .send()
            .await?;

        Self::check_response(response).await
    }

    /// 파일을 캡션과 함께 문서로 전송합니다.
    pub async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> NotificationResult<()> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DispatchError::ArtifactUnreadable(format!("{}: {}", path.display(), e)))?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rsi_plot.svg".to_string());
        let mime = if file_name.ends_with(".svg") {
            "image/svg+xml"
        } else {
            "application/octet-stream"
        };

        let document = Part::bytes(bytes).file_name(file_name).mime_str(mime)?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", self.config.parse_mode.clone())
            .part("document", document);

        debug!(chat_id = chat_id, path = %path.display(), "Sending Telegram document");

        let response = self
            .client
            .post(self.config.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        Self::check_response(response).await
    }

    /// Bot API 응답 상태 확인.
    async fn check_response(response: reqwest::Response) -> NotificationResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<TelegramErrorBody>(&body).ok();

        // 요청 한도 제한 확인
        if status.as_u16() == 429 {
            let retry_after = parsed
                .as_ref()
                .and_then(|b| b.parameters.as_ref())
                .and_then(|p| p.retry_after)
                .unwrap_or(60);
            warn!(retry_after, "Telegram rate limited");
            return Err(DispatchError::RateLimited(retry_after));
        }

        let description = parsed.and_then(|b| b.description).unwrap_or(body);
        error!("Failed to send Telegram message: {} - {}", status, description);
        Err(DispatchError::TransportFailure(format!(
            "HTTP {}: {}",
            status.as_u16(),
            description
        )))
    }
}

#[async_trait]
impl AlertSender for TelegramSender {
    async fn send(
        &self,
        destination: Option<&Destination>,
        text: &str,
        artifact: Option<&Path>,
    ) -> NotificationResult<()> {
        let destination = destination.ok_or(DispatchError::DestinationUnset)?;

        match artifact {
            Some(path) => self.send_document(destination.chat_id, path, text).await?,
            None => self.send_message(destination.chat_id, text).await?,
        }

        info!(destination = %destination, "Telegram notification sent successfully");
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
