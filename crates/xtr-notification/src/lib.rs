//! # XTR Notification
//!
//! RSI 알림 전송과 텔레그램 봇 명령어 처리.
//!
//! # 텔레그램 봇 명령어
//!
//! 봇 명령어 핸들러를 통해 다음 명령어를 지원합니다:
//! - `/start` - 현재 채팅을 알림 대상으로 선택
//! - `/stop` - 알림 중지
//! - `/check` - 현재 RSI 즉시 확인
//! - `/mode [off|on|alert]` - 알림 모드 설정
//! - `/timerange [1d|1w|1M]` - RSI 계산 기간 설정
//! - `/summary` - 현재 설정 요약

pub mod bot_handler;
pub mod log_sender;
pub mod telegram;
pub mod types;

pub use bot_handler::*;
pub use log_sender::LogSender;
pub use telegram::*;
pub use types::*;
