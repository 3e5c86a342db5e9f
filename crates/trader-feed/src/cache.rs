//! 거래소별 파생 상태 캐시.
//!
//! 캐시 객체는 필드 단위로 수정되지 않고 통째로 교체됩니다. 읽는 쪽은
//! [`DataCache::load`]로 교체 전 또는 교체 후의 완전한 스냅샷만 봅니다.

use arc_swap::ArcSwap;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};
use trader_core::{
    exchange_span, ExchangeId, Kline, OrderBook, OrderStatus, Symbol, Ticker, Timeframe, TradeTick,
};

use crate::channel::{BalanceSnapshot, ChannelRegistry, OpenOrders, RecentTrades};

/// 심볼별로 보관하는 최근 체결 수.
pub const MAX_RECENT_TRADES: usize = 500;

/// (심볼, 타임프레임)별로 보관하는 캔들 수.
pub const MAX_CANDLES: usize = 500;

/// 원자적 포인터 교체로 갱신되는 캐시.
pub struct DataCache<T> {
    inner: ArcSwap<T>,
}

impl<T: Default> Default for DataCache<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> DataCache<T> {
    /// 초기 값으로 캐시를 생성합니다.
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// 현재 스냅샷.
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// 캐시 객체 전체를 교체합니다.
    pub fn replace(&self, value: T) {
        self.inner.store(Arc::new(value));
    }
}

impl<T: Clone> DataCache<T> {
    /// 현재 값의 사본을 수정해 교체합니다.
    ///
    /// 동시에 교체가 일어나면 최신 값에 대해 다시 적용합니다.
    pub fn update<F>(&self, mut f: F)
    where
        F: FnMut(&mut T),
    {
        self.inner.rcu(|current| {
            let mut next = T::clone(current);
            f(&mut next);
            next
        });
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for DataCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DataCache").field(&*self.inner.load_full()).finish()
    }
}

/// 계좌 관련 상태 (잔고, 미체결 주문).
#[derive(Debug, Clone, Default)]
pub struct ExchangePersonalData {
    /// 마지막 잔고 스냅샷
    pub balances: Option<BalanceSnapshot>,
    /// 심볼별 미체결 주문
    pub open_orders: HashMap<Symbol, Vec<OrderStatus>>,
}

impl ExchangePersonalData {
    /// 심볼의 미체결 주문.
    pub fn orders(&self, symbol: &Symbol) -> &[OrderStatus] {
        self.open_orders.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 아직 아무것도 받지 않았는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.balances.is_none() && self.open_orders.is_empty()
    }
}

/// 한 심볼의 시장 데이터 스냅샷.
#[derive(Debug, Clone, Default)]
pub struct SymbolData {
    /// 마지막 시세
    pub ticker: Option<Ticker>,
    /// 마지막 호가창
    pub order_book: Option<OrderBook>,
    /// 최근 체결 (오래된 것부터)
    pub recent_trades: VecDeque<TradeTick>,
    /// 타임프레임별 캔들 (오래된 것부터)
    pub candles: HashMap<Timeframe, VecDeque<Kline>>,
}

impl SymbolData {
    /// 타임프레임의 마지막 캔들.
    pub fn last_candle(&self, timeframe: Timeframe) -> Option<&Kline> {
        self.candles.get(&timeframe).and_then(VecDeque::back)
    }

    fn push_trades(&mut self, trades: Vec<TradeTick>) {
        self.recent_trades.extend(trades);
        while self.recent_trades.len() > MAX_RECENT_TRADES {
            self.recent_trades.pop_front();
        }
    }

    fn push_candle(&mut self, kline: Kline) {
        let series = self.candles.entry(kline.timeframe).or_default();
        match series.back() {
            Some(last) if last.open_time == kline.open_time => {
                series.pop_back();
            }
            Some(last) if last.is_newer_than(&kline) => return,
            _ => {}
        }
        series.push_back(kline);
        while series.len() > MAX_CANDLES {
            series.pop_front();
        }
    }
}

/// 거래소의 심볼별 시장 데이터.
#[derive(Debug, Clone, Default)]
pub struct ExchangeSymbolsData {
    symbols: HashMap<Symbol, Arc<SymbolData>>,
}

impl ExchangeSymbolsData {
    /// 심볼 스냅샷.
    pub fn get(&self, symbol: &Symbol) -> Option<Arc<SymbolData>> {
        self.symbols.get(symbol).cloned()
    }

    /// 데이터가 있는 심볼 수.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn modify(&mut self, symbol: &Symbol, f: impl FnOnce(&mut SymbolData)) {
        let entry = self.symbols.entry(symbol.clone()).or_default();
        f(Arc::make_mut(entry));
    }
}

/// 채널 값을 캐시에 반영하는 구독 태스크를 실행합니다.
///
/// 구독은 태스크 시작 전에 등록되므로 이후 발행되는 값은 빠짐없이 반영됩니다.
pub fn spawn_cache_sink(
    channels: &ChannelRegistry,
    exchange: &ExchangeId,
    symbols: Arc<DataCache<ExchangeSymbolsData>>,
    personal: Arc<DataCache<ExchangePersonalData>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut balance = channels.get_or_create::<BalanceSnapshot>(exchange).subscribe();
    let mut ohlcv = channels.get_or_create::<Kline>(exchange).subscribe();
    let mut order_book = channels.get_or_create::<OrderBook>(exchange).subscribe();
    let mut trades = channels.get_or_create::<RecentTrades>(exchange).subscribe();
    let mut ticker = channels.get_or_create::<Ticker>(exchange).subscribe();
    let mut orders = channels.get_or_create::<OpenOrders>(exchange).subscribe();

    let span = exchange_span!("cache_sink", exchange);
    tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    Some(snapshot) = balance.recv() => {
                        personal.update(|data| data.balances = Some(snapshot.clone()));
                    }
                    Some(update) = orders.recv() => {
                        personal.update(|data| {
                            data.open_orders.insert(update.symbol.clone(), update.orders.clone());
                        });
                    }
                    Some(kline) = ohlcv.recv() => {
                        let symbol = kline.symbol.clone();
                        symbols.update(|data| {
                            data.modify(&symbol, |s| s.push_candle(kline.clone()))
                        });
                    }
                    Some(book) = order_book.recv() => {
                        let symbol = book.symbol.clone();
                        symbols.update(|data| {
                            data.modify(&symbol, |s| s.order_book = Some(book.clone()))
                        });
                    }
                    Some(batch) = trades.recv() => {
                        symbols.update(|data| {
                            data.modify(&batch.symbol, |s| s.push_trades(batch.trades.clone()))
                        });
                    }
                    Some(tick) = ticker.recv() => {
                        let symbol = tick.symbol.clone();
                        symbols.update(|data| {
                            data.modify(&symbol, |s| s.ticker = Some(tick.clone()))
                        });
                    }
                    else => break,
                }
            }
            debug!("캐시 반영 태스크 종료");
        }
        .instrument(span),
    )
}
