//! 모멘텀 지표 (Momentum Indicators).
//!
//! 가격 모멘텀과 과매수/과매도 상태를 측정하는 RSI를 제공합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use xtr_core::{IndicatorSeries, PriceSeries};

use super::{IndicatorError, IndicatorResult};

/// RSI 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsiParams {
    /// RSI 기간 (기본: 14).
    pub period: usize,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self { period: 14 }
    }
}

/// 모멘텀 지표 계산기.
#[derive(Debug, Default)]
pub struct MomentumCalculator;

impl MomentumCalculator {
    /// 새로운 모멘텀 계산기 생성.
    pub fn new() -> Self {
        Self
    }

    /// RSI (Relative Strength Index) 계산.
    ///
    /// RSI = 100 - (100 / (1 + RS))
    /// RS = 평균 상승폭 / 평균 하락폭
    ///
    /// 첫 평균은 처음 `period`개 변화량의 단순 평균이고, 이후에는 Wilder 평활
    /// `avg = (avg * (period - 1) + 현재값) / period`를 사용합니다.
    ///
    /// # 인자
    /// * `prices` - 가격 데이터 (종가, 시간 오름차순)
    /// * `params` - RSI 파라미터
    ///
    /// # 반환
    /// 입력과 같은 길이의 벡터. 처음 `period`개는 None이고, 입력 길이가
    /// `period` 이하이면 전부 None입니다. 정의된 값은 0-100 사이입니다.
    pub fn rsi(&self, prices: &[Decimal], params: RsiParams) -> IndicatorResult<Vec<Option<Decimal>>> {
        let period = params.period;

        if period == 0 {
            return Err(IndicatorError::InvalidParameter(
                "기간은 0보다 커야 합니다".to_string(),
            ));
        }

        let mut result = vec![None; prices.len()];
        if prices.len() <= period {
            return Ok(result);
        }

        let window = Decimal::from(period);
        let window_minus_one = window - Decimal::ONE;

        // 초기 평균: 처음 period개 변화량의 단순 평균
        let (mut gain_sum, mut loss_sum) = (Decimal::ZERO, Decimal::ZERO);
        for i in 1..=period {
            let (gain, loss) = Self::split_delta(prices[i] - prices[i - 1]);
            gain_sum += gain;
            loss_sum += loss;
        }
        let mut avg_gain = gain_sum / window;
        let mut avg_loss = loss_sum / window;
        result[period] = Some(Self::rsi_value(avg_gain, avg_loss));

        // Wilder 평활
        for i in (period + 1)..prices.len() {
            let (gain, loss) = Self::split_delta(prices[i] - prices[i - 1]);
            avg_gain = (avg_gain * window_minus_one + gain) / window;
            avg_loss = (avg_loss * window_minus_one + loss) / window;
            result[i] = Some(Self::rsi_value(avg_gain, avg_loss));
        }

        Ok(result)
    }

    /// 변화량을 (상승폭, 하락폭)으로 분리.
    fn split_delta(delta: Decimal) -> (Decimal, Decimal) {
        if delta > Decimal::ZERO {
            (delta, Decimal::ZERO)
        } else {
            (Decimal::ZERO, delta.abs())
        }
    }

    /// 평균 상승/하락폭으로 RSI 값 계산.
    fn rsi_value(avg_gain: Decimal, avg_loss: Decimal) -> Decimal {
        if avg_loss.is_zero() {
            // 변화 없음은 중립, 상승만 있으면 100
            return if avg_gain.is_zero() { dec!(50) } else { dec!(100) };
        }

        // RS가 Decimal 범위를 넘으면 사실상 100
        avg_gain
            .checked_div(avg_loss)
            .and_then(|rs| Decimal::ONE.checked_add(rs))
            .and_then(|denominator| dec!(100).checked_div(denominator))
            .map(|ratio| dec!(100) - ratio)
            .unwrap_or(dec!(100))
    }
}

/// 종가 목록에서 RSI를 계산합니다.
///
/// `MomentumCalculator::rsi`의 함수형 진입점입니다.
pub fn compute_rsi(prices: &[Decimal], window: usize) -> IndicatorResult<Vec<Option<Decimal>>> {
    MomentumCalculator::new().rsi(prices, RsiParams { period: window })
}

/// 가격 시계열에서 시간 정렬된 RSI 시계열을 만듭니다.
pub fn rsi_series(series: &PriceSeries, params: RsiParams) -> IndicatorResult<IndicatorSeries> {
    let values = MomentumCalculator::new().rsi(&series.closes(), params)?;

    IndicatorSeries::from_parts(format!("RSI({})", params.period), series.open_times(), values)
        .map_err(|e| IndicatorError::CalculationError(e.to_string()))
}
