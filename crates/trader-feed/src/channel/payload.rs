//! 채널별 발행 값 타입.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use trader_core::{Kline, OrderBook, OrderStatus, Symbol, Ticker, TradeTick};
use trader_exchange::Balance;

use super::registry::ExchangeChannels;
use super::{Channel, ChannelKind};

/// 채널로 발행할 수 있는 값.
///
/// 데이터 종류마다 정확히 하나의 타입이 대응합니다.
pub trait ChannelPayload: Clone + Send + Sync + 'static {
    /// 이 타입이 발행되는 채널 종류.
    const KIND: ChannelKind;

    #[doc(hidden)]
    fn slot(channels: &ExchangeChannels) -> &OnceLock<Arc<Channel<Self>>>;
}

/// 잔고 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSnapshot {
    /// 자산별 잔고 (자산 이름 순)
    pub balances: Vec<Balance>,
    /// 조회 시각
    pub timestamp: DateTime<Utc>,
}

impl BalanceSnapshot {
    /// 자산 잔고를 찾습니다.
    pub fn get(&self, asset: &str) -> Option<&Balance> {
        self.balances.iter().find(|b| b.asset.eq_ignore_ascii_case(asset))
    }
}

/// 한 심볼의 새 체결 묶음.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentTrades {
    /// 거래 심볼
    pub symbol: Symbol,
    /// 새 체결 (오래된 것부터)
    pub trades: Vec<TradeTick>,
}

/// 한 심볼의 미체결 주문 전체.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenOrders {
    /// 거래 심볼
    pub symbol: Symbol,
    /// 미체결 주문
    pub orders: Vec<OrderStatus>,
}

impl ChannelPayload for BalanceSnapshot {
    const KIND: ChannelKind = ChannelKind::Balance;

    fn slot(channels: &ExchangeChannels) -> &OnceLock<Arc<Channel<Self>>> {
        &channels.balance
    }
}

impl ChannelPayload for Kline {
    const KIND: ChannelKind = ChannelKind::Ohlcv;

    fn slot(channels: &ExchangeChannels) -> &OnceLock<Arc<Channel<Self>>> {
        &channels.ohlcv
    }
}

impl ChannelPayload for OrderBook {
    const KIND: ChannelKind = ChannelKind::OrderBook;

    fn slot(channels: &ExchangeChannels) -> &OnceLock<Arc<Channel<Self>>> {
        &channels.order_book
    }
}

impl ChannelPayload for RecentTrades {
    const KIND: ChannelKind = ChannelKind::RecentTrades;

    fn slot(channels: &ExchangeChannels) -> &OnceLock<Arc<Channel<Self>>> {
        &channels.recent_trades
    }
}

impl ChannelPayload for Ticker {
    const KIND: ChannelKind = ChannelKind::Ticker;

    fn slot(channels: &ExchangeChannels) -> &OnceLock<Arc<Channel<Self>>> {
        &channels.ticker
    }
}

impl ChannelPayload for OpenOrders {
    const KIND: ChannelKind = ChannelKind::Orders;

    fn slot(channels: &ExchangeChannels) -> &OnceLock<Arc<Channel<Self>>> {
        &channels.orders
    }
}
