//! 설정 관리.
//!
//! 기본값 → `config/default.toml`(선택) → `XTR__` 접두사 환경 변수 순으로
//! 덮어써서 애플리케이션 설정을 만듭니다. API 키와 봇 토큰 같은 비밀값은
//! 여기서 다루지 않고 각 커넥터가 환경 변수에서 직접 읽습니다.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{AlertMode, TimeRange};
use crate::error::{XtrError, XtrResult};
use crate::types::Timeframe;

/// Bybit이 한 번에 반환하는 최대 봉 개수.
pub const PROVIDER_MAX_BARS: u32 = 1000;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 시장 데이터 설정
    pub market: MarketConfig,
    /// 폴러 설정
    pub poller: PollerConfig,
    /// 알림 기본값
    pub alert: AlertSettings,
    /// 텔레그램 설정
    pub telegram: TelegramSettings,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 시장 데이터 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketConfig {
    /// 거래 심볼
    pub symbol: String,
    /// Bybit 상품 카테고리 (spot, linear, inverse)
    pub category: String,
    /// 봉 간격 (분)
    pub interval_minutes: u64,
    /// 조회당 최대 봉 개수
    pub max_bars: u32,
    /// RSI 기간
    pub rsi_period: usize,
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 수신 윈도우 (밀리초)
    pub recv_window: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbol: "SOLUSDT".to_string(),
            category: "spot".to_string(),
            interval_minutes: 60,
            // 31일 × 24시간
            max_bars: 744,
            rsi_period: 14,
            base_url: "https://api.bybit.com".to_string(),
            timeout_secs: 10,
            recv_window: 5000,
        }
    }
}

impl MarketConfig {
    /// 봉 간격을 타임프레임으로 반환.
    pub fn timeframe(&self) -> XtrResult<Timeframe> {
        Timeframe::from_minutes(self.interval_minutes).ok_or_else(|| {
            XtrError::Config(format!(
                "지원하지 않는 봉 간격: {}분",
                self.interval_minutes
            ))
        })
    }

    /// 요청 타임아웃을 Duration으로 반환.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 스케줄 정책 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// 매 틱마다 조회하고 워터마크로 새 봉을 판단
    #[default]
    FixedInterval,
    /// 거래소 서버 시각 기준 매 정시에 한 번 조회
    TopOfHour,
}

/// 폴러 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    /// 틱 주기 (초)
    pub interval_secs: u64,
    /// 스케줄 정책
    pub schedule: ScheduleKind,
    /// 통계 요약을 남기는 틱 간격
    pub stats_every_ticks: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            schedule: ScheduleKind::FixedInterval,
            stats_every_ticks: 720,
        }
    }
}

impl PollerConfig {
    /// 틱 주기를 Duration으로 반환.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// 알림 기본값.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertSettings {
    /// 시작 시 알림 모드
    pub mode: AlertMode,
    /// 시작 시 조회 기간
    pub time_range: TimeRange,
    /// 차트 파일 경로 (매 발송마다 덮어씀)
    pub artifact_path: PathBuf,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            mode: AlertMode::ThresholdOnly,
            time_range: TimeRange::Month,
            artifact_path: PathBuf::from("rsi_plot.svg"),
        }
    }
}

/// 텔레그램 설정 (토큰 제외).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Bot API 기본 URL
    pub api_base_url: String,
    /// 명령을 허용할 채팅 ID (비어있으면 모두 허용)
    pub allowed_chat_ids: Vec<i64>,
    /// long polling 타임아웃 (초)
    pub poll_timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.telegram.org".to_string(),
            allowed_chat_ids: Vec::new(),
            poll_timeout_secs: 30,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> XtrResult<Self> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("XTR")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("telegram.allowed_chat_ids")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> XtrResult<Self> {
        Self::load("config/default.toml")
    }

    /// 값의 범위를 검사합니다.
    pub fn validate(&self) -> XtrResult<()> {
        self.market.timeframe()?;

        if self.market.max_bars == 0 || self.market.max_bars > PROVIDER_MAX_BARS {
            return Err(XtrError::Config(format!(
                "max_bars는 1..={} 범위여야 합니다: {}",
                PROVIDER_MAX_BARS, self.market.max_bars
            )));
        }
        if self.market.rsi_period == 0 {
            return Err(XtrError::Config("rsi_period는 0보다 커야 합니다".to_string()));
        }
        if self.poller.interval_secs == 0 {
            return Err(XtrError::Config(
                "poller.interval_secs는 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}
