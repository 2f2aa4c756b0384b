//! Bybit V5 시장 데이터 커넥터.
//!
//! `GET /v5/market/kline`으로 봉을, `GET /v5/market/time`으로 서버 시각을
//! 조회합니다. 자격증명이 설정되면 모든 요청에 V5 HMAC-SHA256 서명 헤더를
//! 붙입니다 (공개 엔드포인트에서는 생략 가능).

use crate::traits::{FetchResult, MarketDataProvider};
use crate::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error};
use xtr_core::{MarketConfig, PriceBar, PriceSeries, Timeframe};

type HmacSha256 = Hmac<Sha256>;

/// kline 요청 한 번에 받을 수 있는 최대 봉 개수.
pub const MAX_KLINE_LIMIT: u32 = 1000;

// ============================================================================
// 설정
// ============================================================================

/// Bybit API 자격증명.
///
/// # 보안
/// - `Debug` 구현은 키 앞뒤 4자만 남기고 시크릿은 출력하지 않습니다.
pub struct BybitCredentials {
    /// API 키
    pub api_key: SecretString,
    /// API 시크릿
    pub api_secret: SecretString,
}

impl BybitCredentials {
    /// 새 자격증명 생성.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        let api_key: String = api_key.into();
        let api_secret: String = api_secret.into();
        Self {
            api_key: SecretString::new(api_key.into_boxed_str()),
            api_secret: SecretString::new(api_secret.into_boxed_str()),
        }
    }

    /// `BYBIT_API_KEY`/`BYBIT_API_SECRET` 환경 변수에서 생성.
    ///
    /// 둘 중 하나라도 없거나 비어있으면 `None`을 반환합니다.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("BYBIT_API_KEY").ok().filter(|v| !v.is_empty())?;
        let api_secret = std::env::var("BYBIT_API_SECRET")
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self::new(api_key, api_secret))
    }
}

impl fmt::Debug for BybitCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chars: Vec<char> = self.api_key.expose_secret().chars().collect();
        let masked_key = if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("BybitCredentials")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}

/// Bybit 클라이언트 설정.
#[derive(Debug)]
pub struct BybitConfig {
    /// REST API 기본 URL
    pub base_url: String,
    /// 상품 카테고리 (spot, linear, inverse)
    pub category: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 수신 윈도우 (밀리초)
    pub recv_window: u64,
    /// 서명용 자격증명 (없으면 서명 없이 요청)
    pub credentials: Option<BybitCredentials>,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self::from_market(&MarketConfig::default())
    }
}

impl BybitConfig {
    /// `[market]` 설정 섹션에서 생성 (자격증명 없음).
    pub fn from_market(market: &MarketConfig) -> Self {
        Self {
            base_url: market.base_url.trim_end_matches('/').to_string(),
            category: market.category.clone(),
            timeout_secs: market.timeout_secs,
            recv_window: market.recv_window,
            credentials: None,
        }
    }

    /// 기본 URL 변경 (테스트 서버 등).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// 자격증명 설정.
    pub fn with_credentials(mut self, credentials: Option<BybitCredentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// `list`의 각 행: [startTime, open, high, low, close, volume, turnover]
#[derive(Debug, Deserialize)]
struct BybitKlineResult {
    #[serde(default)]
    list: Option<Vec<Vec<String>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitServerTime {
    #[serde(default)]
    time_second: Option<serde_json::Value>,
}

// ============================================================================
// Bybit 클라이언트
// ============================================================================

/// Bybit 시장 데이터 클라이언트.
pub struct BybitClient {
    config: BybitConfig,
    client: Client,
}

impl BybitClient {
    /// 새 Bybit 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `FetchError::Transport`를 반환합니다.
    pub fn new(config: BybitConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Transport(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { config, client })
    }

    /// 설정 반환.
    pub fn config(&self) -> &BybitConfig {
        &self.config
    }

    /// HMAC-SHA256 서명 (hex).
    fn sign(secret: &str, payload: &str) -> FetchResult<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| FetchError::InvalidRequest(format!("서명 키 오류: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// V5 서명 대상 문자열: timestamp + api_key + recv_window + query.
    fn signature_payload(timestamp: i64, api_key: &str, recv_window: u64, query: &str) -> String {
        format!("{}{}{}{}", timestamp, api_key, recv_window, query)
    }

    /// 파라미터에서 쿼리 문자열 생성.
    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// GET 요청. 자격증명이 있으면 서명 헤더를 붙입니다.
    async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> FetchResult<T> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let query = Self::build_query(params);

        let full_url = if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        };

        debug!("GET {}", full_url);

        let mut request = self.client.get(&full_url);

        if let Some(credentials) = &self.config.credentials {
            let timestamp = Utc::now().timestamp_millis();
            let api_key = credentials.api_key.expose_secret();
            let payload =
                Self::signature_payload(timestamp, api_key, self.config.recv_window, &query);
            let signature = Self::sign(credentials.api_secret.expose_secret(), &payload)?;

            request = request
                .header("X-BAPI-API-KEY", api_key)
                .header("X-BAPI-TIMESTAMP", timestamp.to_string())
                .header("X-BAPI-RECV-WINDOW", self.config.recv_window.to_string())
                .header("X-BAPI-SIGN", signature);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// API 응답 처리.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> FetchResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let envelope: BybitResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse response: {} - Body: {}", e, body);
            FetchError::MalformedResponse(e.to_string())
        })?;

        if envelope.ret_code != 0 {
            return Err(FetchError::Transport(format!(
                "retCode {}: {}",
                envelope.ret_code, envelope.ret_msg
            )));
        }

        let result = envelope
            .result
            .filter(|v| !v.is_null())
            .ok_or_else(|| FetchError::MalformedResponse("응답에 result 필드가 없습니다".into()))?;

        Ok(serde_json::from_value(result)?)
    }

    /// kline 행을 봉으로 변환.
    fn parse_row(row: &[String]) -> FetchResult<PriceBar> {
        if row.len() < 6 {
            return Err(FetchError::MalformedResponse(format!(
                "kline 행의 필드 수가 부족합니다: {}",
                row.len()
            )));
        }

        let millis: i64 = row[0].parse().map_err(|_| {
            FetchError::MalformedResponse(format!("잘못된 봉 시작 시간: {}", row[0]))
        })?;
        let open_time = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            FetchError::MalformedResponse(format!("범위를 벗어난 봉 시작 시간: {}", millis))
        })?;

        Ok(PriceBar {
            open_time,
            open: Self::parse_decimal(&row[1])?,
            high: Self::parse_decimal(&row[2])?,
            low: Self::parse_decimal(&row[3])?,
            close: Self::parse_decimal(&row[4])?,
            volume: Self::parse_decimal(&row[5])?,
        })
    }

    /// 문자열에서 Decimal 파싱.
    fn parse_decimal(s: &str) -> FetchResult<Decimal> {
        s.parse()
            .map_err(|_| FetchError::MalformedResponse(format!("잘못된 숫자: {}", s)))
    }

    /// `timeSecond` 값 (문자열 또는 숫자) 파싱.
    fn parse_time_second(value: &serde_json::Value) -> Option<DateTime<Utc>> {
        let secs = match value {
            serde_json::Value::String(s) => s.parse::<i64>().ok()?,
            serde_json::Value::Number(n) => n.as_i64()?,
            _ => return None,
        };
        DateTime::from_timestamp(secs, 0)
    }
}

#[async_trait]
impl MarketDataProvider for BybitClient {
    fn name(&self) -> &str {
        "Bybit"
    }

    async fn fetch_price_series(
        &self,
        symbol: &str,
        interval_minutes: u64,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        max_bars: u32,
    ) -> FetchResult<PriceSeries> {
        let timeframe = Timeframe::from_minutes(interval_minutes).ok_or_else(|| {
            FetchError::InvalidRequest(format!("지원하지 않는 봉 간격: {}분", interval_minutes))
        })?;
        if range_start >= range_end {
            return Err(FetchError::InvalidRequest(format!(
                "조회 시작({})이 끝({})보다 늦습니다",
                range_start, range_end
            )));
        }
        if max_bars == 0 {
            return Err(FetchError::InvalidRequest("max_bars는 0보다 커야 합니다".into()));
        }

        let params = [
            ("category", self.config.category.clone()),
            ("symbol", symbol.to_string()),
            ("interval", timeframe.to_bybit_interval().to_string()),
            ("start", range_start.timestamp_millis().to_string()),
            ("end", range_end.timestamp_millis().to_string()),
            ("limit", max_bars.min(MAX_KLINE_LIMIT).to_string()),
        ];

        let result: BybitKlineResult = self.public_get("/v5/market/kline", &params).await?;
        let rows = result
            .list
            .ok_or_else(|| FetchError::MalformedResponse("result.list 필드가 없습니다".into()))?;

        if rows.is_empty() {
            return Err(FetchError::EmptyResult(format!(
                "{} {} ~ {} 구간에 봉이 없습니다",
                symbol, range_start, range_end
            )));
        }

        // 거래소는 최신 봉부터 반환
        let mut bars = rows
            .iter()
            .map(|row| Self::parse_row(row))
            .collect::<FetchResult<Vec<_>>>()?;
        bars.reverse();

        let series = PriceSeries::new(symbol, timeframe, bars)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        debug!(
            symbol = %symbol,
            bars = series.len(),
            newest = ?series.newest_time(),
            "Kline 조회 완료"
        );

        Ok(series)
    }

    async fn server_time(&self) -> FetchResult<DateTime<Utc>> {
        let result: BybitServerTime = self.public_get("/v5/market/time", &[]).await?;

        result
            .time_second
            .as_ref()
            .and_then(Self::parse_time_second)
            .ok_or_else(|| FetchError::MalformedResponse("result.timeSecond 필드가 없습니다".into()))
    }
}
