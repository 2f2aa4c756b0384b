//! 알림 타입 및 trait 정의.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use xtr_core::{AlertLabel, DecimalExt, Destination, TimeRange};

/// 백그라운드 조회 실패 시 알림 대상에 보내는 안내문.
pub const FETCH_FAILURE_NOTICE: &str = "Failed to fetch RSI data. Please try again later.";

/// RSI 알림 메시지.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    /// 알림 레이블
    pub label: AlertLabel,
    /// 최신 RSI 값
    pub value: Decimal,
    /// 거래 심볼
    pub symbol: String,
    /// RSI 계산 기간
    pub time_range: TimeRange,
}

impl AlertMessage {
    /// 새 알림 메시지를 생성합니다.
    pub fn new(
        label: AlertLabel,
        value: Decimal,
        symbol: impl Into<String>,
        time_range: TimeRange,
    ) -> Self {
        Self {
            label,
            value,
            symbol: symbol.into(),
            time_range,
        }
    }

    /// 텔레그램 HTML 본문.
    pub fn to_html(&self) -> String {
        format!(
            "<b>{title}</b>\n\n\
             Current RSI: <b>{value}</b>\n\
             Signal: {label}\n\
             <i>{symbol} · {range}</i>",
            title = self.label.title(),
            value = format_rsi(self.value),
            label = self.label,
            symbol = self.symbol,
            range = self.time_range.description(),
        )
    }
}

/// RSI 값을 소수점 둘째 자리까지 표시합니다.
pub fn format_rsi(value: Decimal) -> String {
    format!("{:.2}", value.round_half_up(2))
}

/// 텔레그램 HTML 본문에 넣을 텍스트 이스케이프.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// 알림 작업용 Result 타입.
pub type NotificationResult<T> = Result<T, DispatchError>;

/// 알림 전송 에러.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("알림 대상이 설정되지 않았습니다")]
    DestinationUnset,

    #[error("알림 전송 실패: {0}")]
    TransportFailure(String),

    #[error("요청 한도 초과: {0}초 후 재시도")]
    RateLimited(u64),

    #[error("첨부 파일을 읽을 수 없습니다: {0}")]
    ArtifactUnreadable(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::TransportFailure(err.to_string())
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::TransportFailure(format!("응답 파싱 실패: {}", err))
    }
}

/// 알림 전송기 trait.
///
/// `destination`이 None이면 `DispatchError::DestinationUnset`을 반환해야 합니다.
#[async_trait]
pub trait AlertSender: Send + Sync {
    /// 텍스트와 선택적 첨부 파일을 전송합니다.
    async fn send(
        &self,
        destination: Option<&Destination>,
        text: &str,
        artifact: Option<&Path>,
    ) -> NotificationResult<()>;

    /// 전송기 이름을 반환합니다.
    fn name(&self) -> &str;
}
