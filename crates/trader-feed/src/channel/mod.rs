//! 타입이 지정된 브로드캐스트 채널.
//!
//! 채널은 (데이터 종류, 거래소 식별자)마다 하나씩 존재하며, 발행된 값을
//! 발행 순서대로 현재 구독자 모두에게 전달합니다.
//!
//! # 전달 정책
//!
//! 각 채널은 `tokio::sync::broadcast` 링 버퍼입니다. 발행은 절대 대기하지
//! 않습니다. 구독자가 버퍼 크기보다 많이 뒤처지면 가장 오래된 값부터 잃고,
//! [`Subscription::recv`]가 놓친 개수를 경고로 남긴 뒤 순서대로 이어서 받습니다.
//! 구독 이전에 발행된 값은 전달되지 않습니다.

mod payload;
mod registry;

pub use payload::{BalanceSnapshot, ChannelPayload, OpenOrders, RecentTrades};
pub use registry::{ChannelRegistry, ExchangeChannels};

use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;
use trader_core::ExchangeId;

/// 채널 기본 버퍼 크기.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// 채널 데이터 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// 잔고
    Balance,
    /// 캔들
    Ohlcv,
    /// 호가창
    OrderBook,
    /// 최근 체결
    RecentTrades,
    /// 시세
    Ticker,
    /// 미체결 주문
    Orders,
}

impl ChannelKind {
    /// 전체 채널 종류.
    pub const ALL: [ChannelKind; 6] = [
        ChannelKind::Balance,
        ChannelKind::Ohlcv,
        ChannelKind::OrderBook,
        ChannelKind::RecentTrades,
        ChannelKind::Ticker,
        ChannelKind::Orders,
    ];

    /// 채널 이름.
    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::Balance => "balance",
            ChannelKind::Ohlcv => "ohlcv",
            ChannelKind::OrderBook => "order_book",
            ChannelKind::RecentTrades => "recent_trades",
            ChannelKind::Ticker => "ticker",
            ChannelKind::Orders => "orders",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 한 거래소의 한 데이터 종류에 대한 브로드캐스트 채널.
pub struct Channel<T> {
    exchange: ExchangeId,
    sender: broadcast::Sender<T>,
}

impl<T: ChannelPayload> Channel<T> {
    /// 새 채널을 생성합니다. `capacity`는 구독자별 버퍼 크기입니다.
    pub fn new(exchange: ExchangeId, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { exchange, sender }
    }

    /// 채널 종류.
    pub fn kind(&self) -> ChannelKind {
        T::KIND
    }

    /// 채널이 속한 거래소.
    pub fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    /// 값을 발행합니다. 값을 받을 구독자 수를 반환합니다.
    ///
    /// 구독자가 없으면 값은 버려지고 0을 반환합니다.
    pub fn publish(&self, value: T) -> usize {
        self.sender.send(value).unwrap_or(0)
    }

    /// 구독합니다. 이후 발행되는 값만 받습니다.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            kind: T::KIND,
            exchange: self.exchange.clone(),
            receiver: self.sender.subscribe(),
        }
    }

    /// 현재 구독자 수.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("exchange", &self.exchange)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

/// 채널 구독 핸들.
pub struct Subscription<T> {
    kind: ChannelKind,
    exchange: ExchangeId,
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// 다음 값을 기다립니다. 채널이 닫히면 `None`.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(missed)) => self.report_lag(missed),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// 대기 없이 받을 수 있는 값을 반환합니다.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(missed)) => self.report_lag(missed),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn report_lag(&self, missed: u64) {
        warn!(
            channel = %self.kind,
            exchange = %self.exchange,
            missed,
            "구독자가 뒤처져 오래된 값을 건너뜀"
        );
    }

    /// 구독 중인 채널 종류.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }
}
