//! 캔들스틱 데이터를 위한 타임프레임 정의.
//!
//! Bybit V5 `interval` 파라미터와 일대일로 대응하는 타임프레임만 정의합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 캔들스틱 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// 1분봉
    M1,
    /// 3분봉
    M3,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 2시간봉
    H2,
    /// 4시간봉
    H4,
    /// 6시간봉
    H6,
    /// 12시간봉
    H12,
    /// 일봉
    D1,
    /// 주봉
    W1,
}

impl Timeframe {
    /// 이 타임프레임의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.as_minutes() * 60)
    }

    /// 이 타임프레임의 분 단위 값을 반환합니다.
    pub fn as_minutes(&self) -> u64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H2 => 120,
            Timeframe::H4 => 240,
            Timeframe::H6 => 360,
            Timeframe::H12 => 720,
            Timeframe::D1 => 24 * 60,
            Timeframe::W1 => 7 * 24 * 60,
        }
    }

    /// 분 단위 값에서 타임프레임을 찾습니다.
    pub fn from_minutes(minutes: u64) -> Option<Self> {
        [
            Timeframe::M1,
            Timeframe::M3,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H2,
            Timeframe::H4,
            Timeframe::H6,
            Timeframe::H12,
            Timeframe::D1,
            Timeframe::W1,
        ]
        .into_iter()
        .find(|tf| tf.as_minutes() == minutes)
    }

    /// Bybit 간격 문자열로 변환합니다.
    pub fn to_bybit_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1",
            Timeframe::M3 => "3",
            Timeframe::M5 => "5",
            Timeframe::M15 => "15",
            Timeframe::M30 => "30",
            Timeframe::H1 => "60",
            Timeframe::H2 => "120",
            Timeframe::H4 => "240",
            Timeframe::H6 => "360",
            Timeframe::H12 => "720",
            Timeframe::D1 => "D",
            Timeframe::W1 => "W",
        }
    }

    /// Bybit 간격 문자열에서 파싱합니다.
    pub fn from_bybit_interval(s: &str) -> Option<Self> {
        match s {
            "D" => Some(Timeframe::D1),
            "W" => Some(Timeframe::W1),
            other => other.parse().ok().and_then(Self::from_minutes),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bybit_interval())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bybit_interval(s).ok_or_else(|| format!("Invalid timeframe: {}", s))
    }
}
