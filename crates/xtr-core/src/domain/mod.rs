//! 알림 봇 운영을 위한 도메인 모델.

mod alert;
mod market_data;
mod watermark;

pub use alert::*;
pub use market_data::*;
pub use watermark::*;
