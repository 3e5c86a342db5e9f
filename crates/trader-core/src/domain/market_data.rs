//! 채널로 배포되는 공개 시장 데이터.
//!
//! 모든 값은 거래소 한 곳에서 한 시점에 관측한 스냅샷이며, 발행 후에는
//! 변경되지 않습니다. 구독자는 복제본을 받습니다.

use crate::domain::order::Side;
use crate::types::{Price, Quantity, Symbol, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 마감된 OHLCV 캔들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    /// 캔들 시작 시각 (타임프레임 경계)
    pub open_time: DateTime<Utc>,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    /// 기준 자산 단위 거래량
    pub volume: Quantity,
    /// 캔들 종료 시각 (`open_time + timeframe`)
    pub close_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_trades: Option<u32>,
}

impl Kline {
    /// 종가가 시가 이상이면 `true`.
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// `now` 시점에 이미 마감된 캔들인지 확인합니다.
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.close_time <= now
    }

    /// 같은 (심볼, 타임프레임)에서 `other`보다 나중에 시작한 캔들인지 확인합니다.
    pub fn is_newer_than(&self, other: &Kline) -> bool {
        self.symbol == other.symbol
            && self.timeframe == other.timeframe
            && self.open_time > other.open_time
    }
}

/// 최우선 호가와 24시간 통계.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: Symbol,
    pub bid: Price,
    pub ask: Price,
    /// 최근 체결가
    pub last: Price,
    pub volume_24h: Quantity,
    pub high_24h: Price,
    pub low_24h: Price,
    pub change_24h: Decimal,
    /// 24시간 변동률(%)
    pub change_24h_percent: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    /// 매도 호가 - 매수 호가.
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// 호가창 한 단계.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: Price,
    pub quantity: Quantity,
}

/// 호가창 스냅샷.
///
/// `bids`는 가격 내림차순, `asks`는 가격 오름차순입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: Symbol,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }

    /// (매수 단계 수, 매도 단계 수).
    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }
}

/// 공개 체결 한 건.
///
/// `id`는 거래소 안에서 심볼별로 유일합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub symbol: Symbol,
    pub id: String,
    pub price: Price,
    pub quantity: Quantity,
    /// 테이커 방향
    pub side: Side,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn candle(open_time: DateTime<Utc>, open: Decimal, close: Decimal) -> Kline {
        Kline {
            symbol: Symbol::crypto("BTC", "USDT"),
            timeframe: Timeframe::M1,
            open_time,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: dec!(1),
            close_time: open_time + Duration::minutes(1),
            num_trades: None,
        }
    }

    #[test]
    fn test_kline_closed_and_order() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        let first = candle(t0, dec!(100), dec!(101));
        let second = candle(t0 + Duration::minutes(1), dec!(101), dec!(99));

        assert!(first.is_bullish());
        assert!(!second.is_bullish());
        assert!(first.is_closed_at(t0 + Duration::minutes(1)));
        assert!(!first.is_closed_at(t0 + Duration::seconds(59)));

        assert!(second.is_newer_than(&first));
        assert!(!first.is_newer_than(&second));

        let mut other_tf = second.clone();
        other_tf.timeframe = Timeframe::M5;
        assert!(!other_tf.is_newer_than(&first));
    }

    #[test]
    fn test_order_book_top_of_book() {
        let book = OrderBook {
            symbol: Symbol::crypto("ETH", "USDT"),
            bids: vec![
                OrderBookLevel { price: dec!(2000), quantity: dec!(10) },
                OrderBookLevel { price: dec!(1999), quantity: dec!(20) },
            ],
            asks: vec![OrderBookLevel { price: dec!(2001), quantity: dec!(15) }],
            timestamp: Utc::now(),
        };

        assert_eq!(book.best_bid(), Some(dec!(2000)));
        assert_eq!(book.best_ask(), Some(dec!(2001)));
        assert_eq!(book.depth(), (2, 1));

        let empty = OrderBook { bids: vec![], asks: vec![], ..book };
        assert_eq!(empty.best_bid(), None);
    }

    #[test]
    fn test_kline_json_omits_missing_trade_count() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        let json = serde_json::to_value(candle(t0, dec!(1), dec!(2))).unwrap();
        assert!(json.get("num_trades").is_none());
        assert_eq!(json["timeframe"], "1m");
    }
}
