//! 알림 설정과 알림 정책.
//!
//! 사용자 명령으로 바뀌는 알림 설정(`AlertConfig`)과, 최신 RSI 값으로부터
//! 알림 여부와 레이블을 결정하는 순수 함수 `should_alert`를 정의합니다.
//!
//! # 사용 예시
//!
//! ```rust
//! use rust_decimal_macros::dec;
//! use xtr_core::{should_alert, AlertLabel, AlertMode};
//!
//! assert_eq!(
//!     should_alert(AlertMode::ThresholdOnly, dec!(75), false),
//!     Some(AlertLabel::Overbought)
//! );
//! assert_eq!(should_alert(AlertMode::Off, dec!(20), false), None);
//! ```

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::XtrError;

/// 과매수 기준값. 이 값을 초과하면 매도 알림.
pub const OVERBOUGHT_THRESHOLD: Decimal = dec!(70);

/// 과매도 기준값. 이 값 미만이면 매수 알림.
pub const OVERSOLD_THRESHOLD: Decimal = dec!(30);

/// 알림 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMode {
    /// 알림 및 리포트 없음
    Off,
    /// 새 봉마다 리포트
    #[serde(alias = "on")]
    AlwaysOn,
    /// 과매수/과매도 구간에서만 알림
    #[default]
    #[serde(alias = "alert")]
    ThresholdOnly,
}

impl AlertMode {
    /// 사용자에게 보여줄 모드 설명.
    pub fn description(&self) -> &'static str {
        match self {
            AlertMode::Off => "no alerts or reports will be sent",
            AlertMode::AlwaysOn => "hourly reports will be sent",
            AlertMode::ThresholdOnly => "reports will be sent based on RSI thresholds",
        }
    }

    /// 명령어 인자로 쓰이는 짧은 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertMode::Off => "off",
            AlertMode::AlwaysOn => "on",
            AlertMode::ThresholdOnly => "alert",
        }
    }
}

impl fmt::Display for AlertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertMode {
    type Err = XtrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(AlertMode::Off),
            "on" | "always_on" | "always" => Ok(AlertMode::AlwaysOn),
            "alert" | "threshold_only" | "threshold" => Ok(AlertMode::ThresholdOnly),
            other => Err(XtrError::InvalidInput(format!("알 수 없는 알림 모드: {}", other))),
        }
    }
}

/// RSI 계산 대상 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// 최근 24시간
    #[serde(alias = "1d")]
    Day,
    /// 최근 7일
    #[serde(alias = "1w")]
    Week,
    /// 최근 30일
    #[default]
    #[serde(alias = "1M")]
    Month,
}

impl TimeRange {
    /// 조회 구간 길이.
    pub fn lookback(&self) -> Duration {
        match self {
            TimeRange::Day => Duration::days(1),
            TimeRange::Week => Duration::days(7),
            TimeRange::Month => Duration::days(30),
        }
    }

    /// 차트 x축 눈금 간격.
    pub fn tick_spacing(&self) -> Duration {
        match self {
            TimeRange::Day => Duration::hours(1),
            TimeRange::Week => Duration::days(1),
            TimeRange::Month => Duration::weeks(1),
        }
    }

    /// 차트 x축 눈금 레이블 형식 (chrono strftime).
    pub fn tick_format(&self) -> &'static str {
        match self {
            TimeRange::Day => "%Y-%m-%d %H:%M",
            TimeRange::Week | TimeRange::Month => "%Y-%m-%d",
        }
    }

    /// 명령어 인자로 쓰이는 짧은 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "1d",
            TimeRange::Week => "1w",
            TimeRange::Month => "1M",
        }
    }

    /// 사용자에게 보여줄 기간 설명.
    pub fn description(&self) -> &'static str {
        match self {
            TimeRange::Day => "Last day.",
            TimeRange::Week => "Last week.",
            TimeRange::Month => "Last month.",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = XtrError;

    /// `1M`(월)과 `1m`은 구분하지 않습니다. 분 단위 기간은 지원하지 않습니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" | "d" | "day" => Ok(TimeRange::Day),
            "1w" | "w" | "week" => Ok(TimeRange::Week),
            "1m" | "m" | "month" => Ok(TimeRange::Month),
            other => Err(XtrError::InvalidInput(format!("알 수 없는 기간: {}", other))),
        }
    }
}

/// 알림 레이블 (심각도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLabel {
    /// 과매수 (매도 신호)
    Overbought,
    /// 과매도 (매수 신호)
    Oversold,
    /// 중립
    Neutral,
}

impl AlertLabel {
    /// RSI 값이 속한 구간의 레이블.
    pub fn classify(value: Decimal) -> Self {
        if value > OVERBOUGHT_THRESHOLD {
            AlertLabel::Overbought
        } else if value < OVERSOLD_THRESHOLD {
            AlertLabel::Oversold
        } else {
            AlertLabel::Neutral
        }
    }

    /// 알림 메시지 제목.
    pub fn title(&self) -> &'static str {
        match self {
            AlertLabel::Overbought => "RSI Alert - SELL NOW ⚠️",
            AlertLabel::Oversold => "RSI Alert - BUY NOW 📈",
            AlertLabel::Neutral => "RSI Alert",
        }
    }
}

impl fmt::Display for AlertLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLabel::Overbought => f.write_str("Sell/Overbought"),
            AlertLabel::Oversold => f.write_str("Buy/Oversold"),
            AlertLabel::Neutral => f.write_str("Neutral"),
        }
    }
}

/// 알림을 받을 채팅.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// 채팅 ID
    pub chat_id: i64,
    /// 채팅 이름 (그룹 제목 또는 사용자 이름)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Destination {
    /// 이름 없는 대상 생성.
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            name: None,
        }
    }

    /// 이름을 설정합니다.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.chat_id),
            None => write!(f, "{}", self.chat_id),
        }
    }
}

/// 프로세스 수명 동안 유지되는 알림 설정.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// 알림 모드
    pub mode: AlertMode,
    /// RSI 계산 대상 기간
    pub time_range: TimeRange,
    /// 알림 대상 채팅
    pub destination: Option<Destination>,
}

impl AlertConfig {
    /// 주어진 모드와 기간으로 설정을 생성합니다 (대상 없음).
    pub fn new(mode: AlertMode, time_range: TimeRange) -> Self {
        Self {
            mode,
            time_range,
            destination: None,
        }
    }

    /// 주기 폴링이 동작해야 하는지 확인합니다 (대상이 있고 모드가 Off가 아님).
    pub fn is_active(&self) -> bool {
        self.destination.is_some() && self.mode != AlertMode::Off
    }
}

/// 알림 발송 여부와 레이블을 결정합니다.
///
/// - `forced` (사용자의 명시적 확인)이면 항상 레이블을 반환합니다.
/// - `ThresholdOnly`: 70 초과면 `Overbought`, 30 미만이면 `Oversold`, 그 외엔 없음.
/// - `AlwaysOn`: 항상 `Neutral`.
/// - `Off`: 없음.
pub fn should_alert(mode: AlertMode, value: Decimal, forced: bool) -> Option<AlertLabel> {
    match mode {
        AlertMode::ThresholdOnly => match AlertLabel::classify(value) {
            AlertLabel::Neutral if !forced => None,
            label => Some(label),
        },
        AlertMode::AlwaysOn => Some(AlertLabel::Neutral),
        AlertMode::Off if forced => Some(AlertLabel::Neutral),
        AlertMode::Off => None,
    }
}
