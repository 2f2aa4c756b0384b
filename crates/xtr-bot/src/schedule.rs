//! 폴링 스케줄 정책.
//!
//! 타이머 틱마다 "지금 조회할 차례인가"를 판단합니다.
//! - `FixedIntervalPolicy`: 매 틱 조회하고 새 봉 여부는 워터마크가 판단
//! - `TopOfHourPolicy`: 거래소 서버 시각 기준으로 정시마다 새 봉을 볼 때까지 조회

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use xtr_core::{ScheduleKind, WatermarkUpdate};
use xtr_exchange::MarketDataProvider;

const SECONDS_PER_HOUR: i64 = 3600;

/// 스케줄 정책 trait.
#[async_trait]
pub trait SchedulePolicy: Send + Sync {
    /// 정책 이름
    fn name(&self) -> &str;

    /// 이번 틱에 조회해야 하는지 판단합니다.
    async fn is_due(&mut self, provider: &dyn MarketDataProvider) -> bool;

    /// 조회가 성공했을 때 워터마크 관찰 결과를 전달받습니다.
    fn record(&mut self, _update: WatermarkUpdate) {}
}

/// 매 틱 조회하는 정책.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedIntervalPolicy;

#[async_trait]
impl SchedulePolicy for FixedIntervalPolicy {
    fn name(&self) -> &str {
        "fixed_interval"
    }

    async fn is_due(&mut self, _provider: &dyn MarketDataProvider) -> bool {
        true
    }
}

/// 서버 시각 기준 정시마다 조회하는 정책.
///
/// 시간대는 새 봉(또는 첫 관찰)을 확인해야 완료됩니다. 거래소가 아직 새 봉을
/// 내지 않았으면 같은 시간대 안에서 다음 틱에 다시 조회합니다.
/// 서버 시각 조회에 실패하면 로컬 시각을 사용합니다.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopOfHourPolicy {
    /// 완료된 마지막 시간대
    last_hour: Option<i64>,
    /// 조회 중이지만 아직 완료되지 않은 시간대
    pending_hour: Option<i64>,
}

impl TopOfHourPolicy {
    /// 새 정책 생성 (첫 틱은 항상 조회).
    pub fn new() -> Self {
        Self::default()
    }

    /// 주어진 시각이 아직 완료되지 않은 시간대에 속하면 true를 반환합니다.
    fn observe(&mut self, now: DateTime<Utc>) -> bool {
        let hour = now.timestamp().div_euclid(SECONDS_PER_HOUR);
        match self.last_hour {
            Some(last) if hour <= last => false,
            _ => {
                self.pending_hour = Some(hour);
                true
            }
        }
    }
}

#[async_trait]
impl SchedulePolicy for TopOfHourPolicy {
    fn name(&self) -> &str {
        "top_of_hour"
    }

    async fn is_due(&mut self, provider: &dyn MarketDataProvider) -> bool {
        let now = match provider.server_time().await {
            Ok(time) => time,
            Err(e) => {
                warn!(provider = provider.name(), "서버 시각 조회 실패, 로컬 시각 사용: {}", e);
                Utc::now()
            }
        };

        let due = self.observe(now);
        if due {
            debug!(server_time = %now, "정시 조회 시점");
        }
        due
    }

    fn record(&mut self, update: WatermarkUpdate) {
        if update == WatermarkUpdate::Unchanged {
            debug!(hour = ?self.pending_hour, "새 봉 미게시, 다음 틱에 재조회");
            return;
        }
        if let Some(hour) = self.pending_hour.take() {
            self.last_hour = Some(hour);
        }
    }
}

/// 설정값에 맞는 스케줄 정책 생성.
pub fn policy_for(kind: ScheduleKind) -> Box<dyn SchedulePolicy> {
    match kind {
        ScheduleKind::FixedInterval => Box::new(FixedIntervalPolicy),
        ScheduleKind::TopOfHour => Box::new(TopOfHourPolicy::new()),
    }
}
