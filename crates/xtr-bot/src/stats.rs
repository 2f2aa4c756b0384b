//! 폴링 통계 구조체.

use serde::{Deserialize, Serialize};

/// 폴러 실행 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStats {
    /// 타이머 틱 수
    pub ticks: u64,
    /// 성공한 조회 수
    pub fetches: u64,
    /// 조회 실패 수
    pub fetch_errors: u64,
    /// 새 봉 감지 횟수
    pub changes: u64,
    /// 발송한 알림 수
    pub alerts_sent: u64,
    /// 발송 실패 수
    pub dispatch_errors: u64,
}

impl PollStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 조회 성공률 계산 (%)
    pub fn fetch_success_rate(&self) -> f64 {
        let total = self.fetches + self.fetch_errors;
        if total == 0 {
            0.0
        } else {
            (self.fetches as f64 / total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            ticks = self.ticks,
            fetches = self.fetches,
            fetch_errors = self.fetch_errors,
            changes = self.changes,
            alerts_sent = self.alerts_sent,
            dispatch_errors = self.dispatch_errors,
            fetch_success_rate = format!("{:.1}%", self.fetch_success_rate()),
            "폴링 통계"
        );
    }
}
