//! 시장 데이터 제공자 trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use xtr_core::PriceSeries;

use crate::FetchError;

/// 시장 데이터 조회를 위한 Result 타입.
pub type FetchResult<T> = Result<T, FetchError>;

/// 가격 시계열 제공자.
///
/// 구현체는 호출 한 번에 거래소 요청 한 번을 보내고, 결과를 시간 오름차순
/// `PriceSeries`로 정규화해야 합니다.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 제공자 이름 반환.
    fn name(&self) -> &str;

    /// `[range_start, range_end]` 구간의 봉을 최대 `max_bars`개 조회.
    ///
    /// # Errors
    /// - `FetchError::MalformedResponse`: 응답에 결과 필드가 없음
    /// - `FetchError::EmptyResult`: 구간에 봉이 없음
    /// - `FetchError::Transport`: 네트워크 또는 거래소 에러
    async fn fetch_price_series(
        &self,
        symbol: &str,
        interval_minutes: u64,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        max_bars: u32,
    ) -> FetchResult<PriceSeries>;

    /// 거래소 서버 시각 조회.
    async fn server_time(&self) -> FetchResult<DateTime<Utc>>;
}
