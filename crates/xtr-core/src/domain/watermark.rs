//! 새 봉 감지를 위한 워터마크.
//!
//! 직전 조회에서 본 가장 최근 봉의 시작 시간을 기억합니다. 값은 단조 증가만
//! 하며, 조회한 최신 봉이 워터마크보다 엄격하게 늦을 때만 "변경"으로 봅니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 워터마크 관찰 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkUpdate {
    /// 첫 관찰. 워터마크를 설정했지만 변경으로 보지 않음
    Seeded,
    /// 새 봉 감지. 워터마크 전진
    Advanced {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
    /// 새 봉 없음 (같거나 이전 시간)
    Unchanged,
}

impl WatermarkUpdate {
    /// 새 데이터가 들어왔는지 여부.
    pub fn is_changed(&self) -> bool {
        matches!(self, WatermarkUpdate::Advanced { .. })
    }
}

/// 마지막으로 관찰한 최신 봉 시간.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    last_seen: Option<DateTime<Utc>>,
}

impl Watermark {
    /// 비어있는 워터마크.
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 값.
    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// 워터마크를 바꾸지 않고 `observe`의 결과만 미리 계산합니다.
    pub fn peek(&self, newest: DateTime<Utc>) -> WatermarkUpdate {
        match self.last_seen {
            None => WatermarkUpdate::Seeded,
            Some(previous) if newest > previous => WatermarkUpdate::Advanced {
                previous,
                current: newest,
            },
            Some(_) => WatermarkUpdate::Unchanged,
        }
    }

    /// 최신 봉 시간을 관찰하고 워터마크를 갱신합니다.
    ///
    /// 이전 값보다 이른 시간은 무시하므로 워터마크는 뒤로 가지 않습니다.
    pub fn observe(&mut self, newest: DateTime<Utc>) -> WatermarkUpdate {
        let update = self.peek(newest);
        if update != WatermarkUpdate::Unchanged {
            self.last_seen = Some(newest);
        }
        update
    }
}
