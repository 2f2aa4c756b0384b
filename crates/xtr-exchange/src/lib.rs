//! 시장 데이터 조회.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - MarketDataProvider trait: 가격 시계열과 서버 시각 조회 인터페이스
//! - Bybit V5 REST 커넥터 (선택적 HMAC 서명)
//! - 조회 에러 분류

pub mod connector;
pub mod error;
pub mod traits;

pub use connector::{BybitClient, BybitConfig, BybitCredentials};
pub use error::*;
pub use traits::*;
