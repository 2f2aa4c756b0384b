//! 시장 데이터 타입 및 구조체.
//!
//! 이 모듈은 시장 데이터 관련 타입을 정의합니다:
//! - `PriceBar` - 한 개의 가격 봉 (OHLCV)
//! - `PriceSeries` - 시간 오름차순으로 정렬된 가격 봉 시계열
//! - `IndicatorPoint` / `IndicatorSeries` - 가격 시계열에 정렬된 지표 값

use crate::error::{XtrError, XtrResult};
use crate::types::{Price, Quantity, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 가격 봉 (한 번 조회되면 변경되지 않음).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBar {
    /// 봉 시작 시간
    pub open_time: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량 (기준 자산 단위)
    pub volume: Quantity,
}

impl PriceBar {
    /// 시작 시간과 종가만으로 봉을 생성합니다.
    ///
    /// 시가/고가/저가는 종가로 채우고 거래량은 0으로 둡니다.
    pub fn from_close(open_time: DateTime<Utc>, close: Price) -> Self {
        Self {
            open_time,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ZERO,
        }
    }
}

/// 시간 오름차순으로 정렬된 가격 시계열.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSeries {
    /// 거래 심볼 (예: "SOLUSDT")
    pub symbol: String,
    /// 봉 간격
    pub timeframe: Timeframe,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// 오름차순 봉 목록으로 시계열을 생성합니다.
    ///
    /// # Errors
    /// 봉의 시작 시간이 엄격하게 증가하지 않으면 `XtrError::Data`를 반환합니다.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<PriceBar>,
    ) -> XtrResult<Self> {
        if let Some(pair) = bars.windows(2).find(|w| w[0].open_time >= w[1].open_time) {
            return Err(XtrError::Data(format!(
                "봉이 오름차순이 아닙니다: {} 다음에 {}",
                pair[0].open_time, pair[1].open_time
            )));
        }

        Ok(Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        })
    }

    /// 봉 목록을 반환합니다.
    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    /// 봉 개수.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// 가장 최근 봉.
    pub fn newest(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// 가장 최근 봉의 시작 시간.
    pub fn newest_time(&self) -> Option<DateTime<Utc>> {
        self.newest().map(|bar| bar.open_time)
    }

    /// 종가 목록 (시간 오름차순).
    pub fn closes(&self) -> Vec<Price> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    /// 봉 시작 시간 목록 (시간 오름차순).
    pub fn open_times(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|bar| bar.open_time).collect()
    }
}

/// 지표 시계열의 한 점.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    /// 대응하는 봉의 시작 시간
    pub time: DateTime<Utc>,
    /// 지표 값 (이력이 부족하면 None)
    pub value: Option<Decimal>,
}

/// 가격 시계열에 정렬된 지표 시계열.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    /// 지표 이름 (예: "RSI(14)")
    pub name: String,
    points: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// 시간 목록과 값 목록을 묶어 지표 시계열을 생성합니다.
    ///
    /// # Errors
    /// 두 목록의 길이가 다르면 `XtrError::Data`를 반환합니다.
    pub fn from_parts(
        name: impl Into<String>,
        times: Vec<DateTime<Utc>>,
        values: Vec<Option<Decimal>>,
    ) -> XtrResult<Self> {
        if times.len() != values.len() {
            return Err(XtrError::Data(format!(
                "시간({})과 값({})의 길이가 다릅니다",
                times.len(),
                values.len()
            )));
        }

        let points = times
            .into_iter()
            .zip(values)
            .map(|(time, value)| IndicatorPoint { time, value })
            .collect();

        Ok(Self {
            name: name.into(),
            points,
        })
    }

    /// 모든 점을 반환합니다.
    pub fn points(&self) -> &[IndicatorPoint] {
        &self.points
    }

    /// 점 개수.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 값이 정의된 점만 반환합니다.
    pub fn defined(&self) -> impl Iterator<Item = (DateTime<Utc>, Decimal)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.value.map(|value| (p.time, value)))
    }

    /// 마지막 점의 값 (정의되지 않았으면 None).
    pub fn latest(&self) -> Option<Decimal> {
        self.points.last().and_then(|p| p.value)
    }

    /// 마지막 점의 시간.
    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.time)
    }
}
