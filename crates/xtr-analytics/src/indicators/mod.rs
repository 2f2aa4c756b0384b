//! 기술적 지표 모듈.
//!
//! # 지원 지표
//!
//! ## 모멘텀 지표 (Momentum Indicators)
//! - **RSI**: 상대강도지수 (Relative Strength Index, Wilder 평활)
//!
//! # 사용 예시
//!
//! ```
//! use rust_decimal::Decimal;
//! use xtr_analytics::indicators::{MomentumCalculator, RsiParams};
//!
//! let prices: Vec<Decimal> = (0..20).map(|i| Decimal::from(100 + i)).collect();
//! let rsi = MomentumCalculator::new().rsi(&prices, RsiParams { period: 14 }).unwrap();
//!
//! assert_eq!(rsi.len(), prices.len());
//! assert!(rsi[13].is_none());
//! assert_eq!(rsi[19], Some(Decimal::from(100)));
//! ```

pub mod momentum;

use thiserror::Error;

pub use momentum::{compute_rsi, rsi_series, MomentumCalculator, RsiParams};

/// 지표 계산 오류.
#[derive(Debug, Error)]
pub enum IndicatorError {
    /// 잘못된 파라미터
    #[error("잘못된 파라미터: {0}")]
    InvalidParameter(String),

    /// 계산 오류
    #[error("계산 오류: {0}")]
    CalculationError(String),
}

/// 지표 계산 결과 타입.
pub type IndicatorResult<T> = Result<T, IndicatorError>;
