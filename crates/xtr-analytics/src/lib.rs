//! RSI 계산과 차트 렌더링.
//!
//! - `indicators`: Wilder 방식 RSI 계산기
//! - `chart`: RSI 시계열을 SVG 선 차트로 그려 파일로 저장

pub mod chart;
pub mod indicators;

pub use chart::{range_start, tick_times, ChartPoint, RenderError, RsiChart};
pub use indicators::{
    compute_rsi, rsi_series, IndicatorError, IndicatorResult, MomentumCalculator, RsiParams,
};
