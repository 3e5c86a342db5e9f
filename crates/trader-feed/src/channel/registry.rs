//! (데이터 종류, 거래소) → 채널 디렉터리.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;
use trader_core::{ExchangeId, Kline, OrderBook, Ticker};

use super::payload::{BalanceSnapshot, ChannelPayload, OpenOrders, RecentTrades};
use super::{Channel, ChannelKind, DEFAULT_CHANNEL_CAPACITY};

/// 한 거래소의 채널 슬롯. 각 슬롯은 한 번만 채워집니다.
#[derive(Default)]
pub struct ExchangeChannels {
    pub(super) balance: OnceLock<Arc<Channel<BalanceSnapshot>>>,
    pub(super) ohlcv: OnceLock<Arc<Channel<Kline>>>,
    pub(super) order_book: OnceLock<Arc<Channel<OrderBook>>>,
    pub(super) recent_trades: OnceLock<Arc<Channel<RecentTrades>>>,
    pub(super) ticker: OnceLock<Arc<Channel<Ticker>>>,
    pub(super) orders: OnceLock<Arc<Channel<OpenOrders>>>,
}

impl ExchangeChannels {
    fn contains(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Balance => self.balance.get().is_some(),
            ChannelKind::Ohlcv => self.ohlcv.get().is_some(),
            ChannelKind::OrderBook => self.order_book.get().is_some(),
            ChannelKind::RecentTrades => self.recent_trades.get().is_some(),
            ChannelKind::Ticker => self.ticker.get().is_some(),
            ChannelKind::Orders => self.orders.get().is_some(),
        }
    }
}

/// 채널 레지스트리.
///
/// (데이터 종류, 거래소)마다 채널 인스턴스는 정확히 하나이며 레지스트리가
/// 살아 있는 동안 제거되지 않습니다. 같은 키로 반복 호출하면 같은 인스턴스를
/// 반환합니다.
pub struct ChannelRegistry {
    capacity: usize,
    exchanges: RwLock<HashMap<ExchangeId, Arc<ExchangeChannels>>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChannelRegistry {
    /// 구독자별 버퍼 크기를 지정해 레지스트리를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            exchanges: RwLock::new(HashMap::new()),
        }
    }

    fn slots(&self, exchange: &ExchangeId) -> Arc<ExchangeChannels> {
        if let Some(slots) = self
            .exchanges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(exchange)
        {
            return Arc::clone(slots);
        }

        self.exchanges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(exchange.clone())
            .or_default()
            .clone()
    }

    /// 채널을 가져오거나 없으면 생성합니다.
    pub fn get_or_create<T: ChannelPayload>(&self, exchange: &ExchangeId) -> Arc<Channel<T>> {
        let slots = self.slots(exchange);
        T::slot(&slots)
            .get_or_init(|| {
                debug!(channel = %T::KIND, exchange = %exchange, "채널 생성");
                Arc::new(Channel::new(exchange.clone(), self.capacity))
            })
            .clone()
    }

    /// 이미 생성된 채널을 가져옵니다.
    pub fn get<T: ChannelPayload>(&self, exchange: &ExchangeId) -> Option<Arc<Channel<T>>> {
        let exchanges = self.exchanges.read().unwrap_or_else(PoisonError::into_inner);
        let slots = exchanges.get(exchange)?;
        T::slot(slots).get().cloned()
    }

    /// 채널 존재 여부.
    pub fn contains(&self, kind: ChannelKind, exchange: &ExchangeId) -> bool {
        self.exchanges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(exchange)
            .is_some_and(|slots| slots.contains(kind))
    }

    /// 거래소에 생성된 채널 종류.
    pub fn kinds(&self, exchange: &ExchangeId) -> Vec<ChannelKind> {
        ChannelKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind, exchange))
            .collect()
    }

    /// 거래소의 여섯 채널을 모두 생성합니다.
    pub fn create_all(&self, exchange: &ExchangeId) {
        self.get_or_create::<BalanceSnapshot>(exchange);
        self.get_or_create::<Kline>(exchange);
        self.get_or_create::<OrderBook>(exchange);
        self.get_or_create::<RecentTrades>(exchange);
        self.get_or_create::<Ticker>(exchange);
        self.get_or_create::<OpenOrders>(exchange);
    }

    /// 전체 채널 수.
    pub fn len(&self) -> usize {
        self.exchanges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|slots| ChannelKind::ALL.iter().filter(|k| slots.contains(**k)).count())
            .sum()
    }

    /// 채널이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 구독자별 버퍼 크기.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("capacity", &self.capacity)
            .field("channels", &self.len())
            .finish()
    }
}
