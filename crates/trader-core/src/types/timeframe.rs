//! 캔들스틱 데이터를 위한 타임프레임 정의.
//!
//! 이 모듈은 다양한 시간 간격을 나타내는 타임프레임 타입과
//! 실시간 평가에 필요한 최소 타임프레임 계산을 제공합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 실시간 신호 평가에 사용하는 최소 평가 타임프레임.
///
/// 해석된 타임프레임 집합에는 이 값 이상인 거래소 지원 타임프레임 중
/// 가장 짧은 것이 항상 포함됩니다.
pub const MIN_EVAL_TIMEFRAME: Timeframe = Timeframe::M1;

/// 캔들스틱 타임프레임.
///
/// 선언 순서는 기간 오름차순이며 `Ord`도 같은 순서를 따릅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
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
    /// 8시간봉
    H8,
    /// 12시간봉
    H12,
    /// 일봉
    D1,
    /// 3일봉
    D3,
    /// 주봉
    W1,
    /// 월봉
    MN1,
}

impl Timeframe {
    /// 기간 오름차순으로 정렬된 전체 타임프레임.
    pub const ALL: [Timeframe; 15] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H8,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::D3,
        Timeframe::W1,
        Timeframe::MN1,
    ];

    /// 이 타임프레임의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M3 => Duration::from_secs(3 * 60),
            Timeframe::M5 => Duration::from_secs(5 * 60),
            Timeframe::M15 => Duration::from_secs(15 * 60),
            Timeframe::M30 => Duration::from_secs(30 * 60),
            Timeframe::H1 => Duration::from_secs(60 * 60),
            Timeframe::H2 => Duration::from_secs(2 * 60 * 60),
            Timeframe::H4 => Duration::from_secs(4 * 60 * 60),
            Timeframe::H6 => Duration::from_secs(6 * 60 * 60),
            Timeframe::H8 => Duration::from_secs(8 * 60 * 60),
            Timeframe::H12 => Duration::from_secs(12 * 60 * 60),
            Timeframe::D1 => Duration::from_secs(24 * 60 * 60),
            Timeframe::D3 => Duration::from_secs(3 * 24 * 60 * 60),
            Timeframe::W1 => Duration::from_secs(7 * 24 * 60 * 60),
            Timeframe::MN1 => Duration::from_secs(30 * 24 * 60 * 60), // 근사값
        }
    }

    /// 이 타임프레임의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        self.duration().as_secs()
    }

    /// 다음 캔들 경계(에포크 기준 정렬)까지 남은 시간을 반환합니다.
    ///
    /// `now`가 정확히 경계 위에 있으면 한 주기 전체를 반환합니다.
    pub fn until_next_boundary(&self, now: DateTime<Utc>) -> Duration {
        let period_ms = self.duration().as_millis() as i64;
        let elapsed_ms = now.timestamp_millis().rem_euclid(period_ms);
        Duration::from_millis((period_ms - elapsed_ms) as u64)
    }

    /// 간격 문자열로 변환합니다 (예: "1m", "4h", "1M").
    pub fn as_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::D3 => "3d",
            Timeframe::W1 => "1w",
            Timeframe::MN1 => "1M",
        }
    }

    /// 간격 문자열에서 파싱합니다.
    pub fn from_interval(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tf| tf.as_interval() == s)
    }
}

/// 주어진 목록에서 `min` 이상인 가장 짧은 타임프레임을 찾습니다.
///
/// 모든 항목이 `min`보다 짧으면 그중 가장 긴 것을 반환합니다.
/// 목록이 비어 있을 때만 `min`을 반환합니다.
pub fn find_min_timeframe(available: &[Timeframe], min: Timeframe) -> Timeframe {
    let at_or_above = available
        .iter()
        .copied()
        .filter(|tf| tf.duration() >= min.duration())
        .min_by_key(|tf| tf.duration());

    at_or_above
        .or_else(|| available.iter().copied().max_by_key(|tf| tf.duration()))
        .unwrap_or(min)
}

/// 타임프레임을 기간 내림차순(긴 것 먼저)으로 정렬합니다.
pub fn sort_timeframes_descending(timeframes: &mut [Timeframe]) {
    timeframes.sort_by_key(|tf| Reverse(tf.duration()));
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_interval())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_interval(s.trim()).ok_or_else(|| format!("Invalid timeframe: {}", s))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_interval().to_string()
    }
}
