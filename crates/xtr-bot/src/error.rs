//! 에러 타입 정의.

use thiserror::Error;
use xtr_analytics::{IndicatorError, RenderError};
use xtr_core::XtrError;
use xtr_exchange::FetchError;
use xtr_notification::DispatchError;

/// 파이프라인 에러 타입.
///
/// 조회, 계산, 렌더링, 발송 단계의 에러를 감쌉니다.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 시장 데이터 조회 실패
    #[error("조회 실패: {0}")]
    Fetch(#[from] FetchError),

    /// RSI 계산 실패
    #[error("지표 계산 실패: {0}")]
    Indicator(#[from] IndicatorError),

    /// RSI 값이 하나도 정의되지 않음 (봉 부족)
    #[error("RSI를 계산하기에 봉이 부족합니다: {bars}개")]
    InsufficientData { bars: usize },

    /// 차트 렌더링 실패
    #[error("렌더링 실패: {0}")]
    Render(#[from] RenderError),

    /// 알림 발송 실패
    #[error("발송 실패: {0}")]
    Dispatch(#[from] DispatchError),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(#[from] XtrError),
}

/// Result 타입 별칭
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
