//! # XTR Core
//!
//! RSI 알림 봇의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 봇 전반에서 사용되는 기본 타입을 제공합니다:
//! - 가격 봉 및 지표 시계열
//! - 알림 모드, 조회 기간, 알림 레이블과 알림 정책
//! - 새 봉 감지를 위한 워터마크
//! - 캔들 타임프레임
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
