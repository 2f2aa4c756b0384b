//! RSI 알림 봇.
//!
//! 이 crate는 봇 실행 바이너리와 그 구성 요소를 제공합니다:
//! - 주기 폴링과 새 봉 감지 (스케줄 정책 + 워터마크)
//! - 조회 → RSI 계산 → 알림 판단 → 차트 렌더링 → 발송 파이프라인
//! - 텔레그램 명령어 처리 (설정 변경, 즉시 확인)

pub mod commands;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod schedule;
pub mod stats;

pub use commands::PipelineCommands;
pub use config::BotConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{AlertPipeline, ConfigSummary, Evaluation, PipelineSettings, RsiReport, TickOutcome};
pub use schedule::{policy_for, FixedIntervalPolicy, SchedulePolicy, TopOfHourPolicy};
pub use stats::PollStats;
