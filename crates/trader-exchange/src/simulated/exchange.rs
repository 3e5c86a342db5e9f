//! 시뮬레이션 거래소 구현.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use trader_core::{
    ExchangeId, Kline, OrderBook, OrderBookLevel, OrderStatus, OrderStatusType, Side,
    SimulatorConfig, Symbol, Ticker, Timeframe, TradeTick,
};

use crate::capability::SymbolCapability;
use crate::traits::{Balance, ExchangeAdapter, ExchangeResult, MarketStatus};
use crate::ExchangeError;

use super::data_feed::DataFeed;

/// 내부 계정 상태.
#[derive(Debug, Clone)]
struct AccountState {
    balances: HashMap<String, Balance>,
}

impl AccountState {
    fn new(initial_balances: &HashMap<String, Decimal>) -> Self {
        let balances = initial_balances
            .iter()
            .map(|(asset, amount)| {
                let asset = asset.to_uppercase();
                (
                    asset.clone(),
                    Balance {
                        asset,
                        free: *amount,
                        locked: dec!(0),
                    },
                )
            })
            .collect();

        Self { balances }
    }

    fn get_balance(&self, asset: &str) -> Balance {
        self.balances.get(asset).cloned().unwrap_or(Balance {
            asset: asset.to_string(),
            free: dec!(0),
            locked: dec!(0),
        })
    }

    fn update_balance(&mut self, asset: &str, free_delta: Decimal, locked_delta: Decimal) {
        let balance = self.balances.entry(asset.to_string()).or_insert(Balance {
            asset: asset.to_string(),
            free: dec!(0),
            locked: dec!(0),
        });

        balance.free += free_delta;
        balance.locked += locked_delta;
    }
}

/// 주문이 묶어 두는 자산과 수량.
fn locked_funds(order: &OrderStatus) -> (String, Decimal) {
    let remaining = order.remaining_quantity();
    match order.side {
        Side::Buy => (
            order.symbol.quote.clone(),
            remaining * order.price.unwrap_or_default(),
        ),
        Side::Sell => (order.symbol.base.clone(), remaining),
    }
}

/// 모의투자 및 오프라인 실행을 위한 시뮬레이션 거래소.
///
/// 설정된 심볼/타임프레임을 스스로 지원 정보로 선언하고, 초기화 시
/// 과거 캔들을 생성합니다. [`SimulatedExchange::step`]으로 시간을 진행시키면
/// 새 캔들이 생성되고 가격이 교차한 지정가 주문이 체결됩니다.
pub struct SimulatedExchange {
    /// 거래소 식별자
    id: ExchangeId,
    /// 설정
    config: SimulatorConfig,
    /// 시뮬레이션 시작 시각 (없으면 초기화 시점의 현재 시각)
    start_time: Option<DateTime<Utc>>,
    /// 초기화 여부
    initialized: AtomicBool,
    /// 데이터 피드
    data_feed: Arc<RwLock<DataFeed>>,
    /// 계정 상태
    account: Arc<RwLock<AccountState>>,
    /// 미체결 주문 (접수 순)
    orders: Arc<RwLock<Vec<OrderStatus>>>,
    /// 다음 주문 번호
    next_order_id: AtomicU64,
}

impl SimulatedExchange {
    /// 새로운 시뮬레이션 거래소를 생성합니다.
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            id: ExchangeId::simulated(),
            config: config.clone(),
            start_time: None,
            initialized: AtomicBool::new(false),
            data_feed: Arc::new(RwLock::new(DataFeed::new(config.seed, config.volatility))),
            account: Arc::new(RwLock::new(AccountState::new(&config.initial_balances))),
            orders: Arc::new(RwLock::new(Vec::new())),
            next_order_id: AtomicU64::new(1),
        }
    }

    /// 거래소 식별자를 지정합니다.
    pub fn with_id(mut self, id: ExchangeId) -> Self {
        self.id = id;
        self
    }

    /// 시뮬레이션 시작 시각을 고정합니다.
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// 시뮬레이션 한 단계의 길이 (가장 짧은 타임프레임).
    pub fn step_timeframe(&self) -> Timeframe {
        self.config
            .time_frames
            .iter()
            .copied()
            .min()
            .unwrap_or(Timeframe::M1)
    }

    /// 현재 시뮬레이션 시각.
    pub async fn current_time(&self) -> Option<DateTime<Utc>> {
        self.data_feed.read().await.current_time()
    }

    /// 시뮬레이션을 한 단계 진행합니다.
    ///
    /// 새 캔들을 생성하고 가격이 교차한 주문을 체결합니다.
    /// 새 시뮬레이션 시각을 반환합니다.
    pub async fn step(&self) -> ExchangeResult<DateTime<Utc>> {
        self.ensure_initialized()?;

        let period = Duration::from_std(self.step_timeframe().duration())
            .unwrap_or_else(|_| Duration::minutes(1));

        let now = {
            let mut feed = self.data_feed.write().await;
            let now = feed.current_time().unwrap_or_else(Utc::now) + period;
            feed.advance_to(now);
            now
        };

        let filled = self.match_orders().await;
        debug!(time = %now, filled, "시뮬레이션 단계 진행");
        Ok(now)
    }

    /// 지정가 주문을 접수하고 필요한 잔고를 묶어 둡니다.
    pub async fn place_limit_order(
        &self,
        symbol: &Symbol,
        side: Side,
        price: Decimal,
        quantity: Decimal,
    ) -> ExchangeResult<String> {
        self.ensure_initialized()?;
        if quantity <= dec!(0) || price <= dec!(0) {
            return Err(ExchangeError::InvalidQuantity(format!(
                "price={} quantity={}",
                price, quantity
            )));
        }
        if !self.config.symbols.contains(symbol) {
            return Err(ExchangeError::SymbolNotFound(symbol.to_string()));
        }

        let order = OrderStatus {
            order_id: format!("SIM-{}", self.next_order_id.fetch_add(1, Ordering::Relaxed)),
            symbol: symbol.clone(),
            side,
            price: Some(price),
            quantity,
            status: OrderStatusType::Open,
            filled_quantity: dec!(0),
            updated_at: self.current_time().await.unwrap_or_else(Utc::now),
        };

        let (asset, amount) = locked_funds(&order);
        {
            let mut account = self.account.write().await;
            let balance = account.get_balance(&asset);
            if balance.free < amount {
                return Err(ExchangeError::InsufficientBalance(format!(
                    "{}: 필요 {}, 사용 가능 {}",
                    asset, amount, balance.free
                )));
            }
            account.update_balance(&asset, -amount, amount);
        }

        let order_id = order.order_id.clone();
        self.orders.write().await.push(order);
        Ok(order_id)
    }

    /// 미체결 주문을 취소하고 묶인 잔고를 돌려줍니다.
    pub async fn cancel_order(&self, order_id: &str) -> ExchangeResult<()> {
        let order = {
            let mut orders = self.orders.write().await;
            let index = orders
                .iter()
                .position(|o| o.order_id == order_id)
                .ok_or_else(|| ExchangeError::OrderNotFound(order_id.to_string()))?;
            orders.remove(index)
        };

        let (asset, amount) = locked_funds(&order);
        self.account
            .write()
            .await
            .update_balance(&asset, amount, -amount);
        Ok(())
    }

    /// 현재 가격이 지정가에 도달한 주문을 체결합니다. 체결 건수를 반환합니다.
    async fn match_orders(&self) -> usize {
        let feed = self.data_feed.read().await;
        let mut orders = self.orders.write().await;
        let mut account = self.account.write().await;

        let mut filled = 0;
        orders.retain(|order| {
            let (Some(last), Some(limit)) = (feed.current_price(&order.symbol), order.price) else {
                return true;
            };
            let crossed = match order.side {
                Side::Buy => last <= limit,
                Side::Sell => last >= limit,
            };
            if !crossed {
                return true;
            }

            let quantity = order.remaining_quantity();
            let notional = quantity * limit;
            match order.side {
                Side::Buy => {
                    account.update_balance(&order.symbol.quote, dec!(0), -notional);
                    account.update_balance(&order.symbol.base, quantity, dec!(0));
                }
                Side::Sell => {
                    account.update_balance(&order.symbol.base, dec!(0), -quantity);
                    account.update_balance(&order.symbol.quote, notional, dec!(0));
                }
            }
            filled += 1;
            false
        });

        filled
    }

    fn ensure_initialized(&self) -> ExchangeResult<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ExchangeError::NotInitialized(self.id.to_string()))
        }
    }

    fn ensure_symbol(&self, symbol: &Symbol) -> ExchangeResult<()> {
        if self.config.symbols.contains(symbol) {
            Ok(())
        } else {
            Err(ExchangeError::SymbolNotFound(symbol.to_string()))
        }
    }
}

#[async_trait]
impl ExchangeAdapter for SimulatedExchange {
    fn id(&self) -> &ExchangeId {
        &self.id
    }

    async fn initialize(&self) -> ExchangeResult<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let anchor = self.start_time.unwrap_or_else(Utc::now);
        {
            let mut feed = self.data_feed.write().await;
            for (index, symbol) in self.config.symbols.iter().enumerate() {
                let start_price = self.config.start_price * Decimal::from(index + 1);
                for timeframe in &self.config.time_frames {
                    feed.generate_history(
                        symbol.clone(),
                        *timeframe,
                        self.config.history_len,
                        start_price,
                        anchor,
                    );
                }
            }
            feed.advance_to(anchor);
        }

        self.initialized.store(true, Ordering::Release);
        info!(
            exchange = %self.id,
            symbols = self.config.symbols.len(),
            time_frames = self.config.time_frames.len(),
            "시뮬레이션 거래소 초기화 완료"
        );
        Ok(())
    }

    async fn capability(&self) -> Option<SymbolCapability> {
        if self.config.symbols.is_empty() {
            return None;
        }
        Some(SymbolCapability::new(
            self.config.symbols.iter().cloned(),
            self.config.time_frames.iter().copied(),
        ))
    }

    async fn market_status(&self, symbol: &Symbol) -> ExchangeResult<MarketStatus> {
        self.ensure_symbol(symbol)?;
        Ok(MarketStatus {
            native_id: format!("{}{}", symbol.base, symbol.quote),
            native_symbol: symbol.to_standard_string(),
        })
    }

    async fn get_balances(&self) -> ExchangeResult<Vec<Balance>> {
        self.ensure_initialized()?;
        let account = self.account.read().await;
        let mut balances: Vec<Balance> = account.balances.values().cloned().collect();
        balances.sort_by(|a, b| a.asset.cmp(&b.asset));
        Ok(balances)
    }

    async fn get_open_orders(&self, symbol: Option<&Symbol>) -> ExchangeResult<Vec<OrderStatus>> {
        self.ensure_initialized()?;
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|o| symbol.map_or(true, |s| &o.symbol == s))
            .cloned()
            .collect())
    }

    async fn get_klines(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: Option<u32>,
    ) -> ExchangeResult<Vec<Kline>> {
        self.ensure_initialized()?;
        self.ensure_symbol(symbol)?;
        let feed = self.data_feed.read().await;
        Ok(feed.historical_klines(symbol, timeframe, limit.unwrap_or(100) as usize))
    }

    async fn get_order_book(&self, symbol: &Symbol, limit: Option<u32>) -> ExchangeResult<OrderBook> {
        self.ensure_initialized()?;
        let feed = self.data_feed.read().await;
        let current_price = feed
            .current_price(symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;
        let timestamp = feed.current_time().unwrap_or_else(Utc::now);

        let depth = limit.unwrap_or(10).max(1);
        let mut bids = Vec::with_capacity(depth as usize);
        let mut asks = Vec::with_capacity(depth as usize);

        for i in 1..=depth {
            let spread = (current_price * dec!(0.0001) * Decimal::from(i)).round_dp(8);
            let volume = (dec!(100) / Decimal::from(i)).round_dp(4);

            bids.push(OrderBookLevel {
                price: current_price - spread,
                quantity: volume,
            });
            asks.push(OrderBookLevel {
                price: current_price + spread,
                quantity: volume,
            });
        }

        Ok(OrderBook {
            symbol: symbol.clone(),
            bids,
            asks,
            timestamp,
        })
    }

    async fn get_recent_trades(
        &self,
        symbol: &Symbol,
        limit: Option<u32>,
    ) -> ExchangeResult<Vec<TradeTick>> {
        self.ensure_initialized()?;
        self.ensure_symbol(symbol)?;
        let feed = self.data_feed.read().await;
        let klines = feed.historical_klines(
            symbol,
            self.step_timeframe(),
            limit.unwrap_or(100) as usize,
        );

        Ok(klines
            .iter()
            .map(|kline| {
                let num_trades = kline.num_trades.unwrap_or(1).max(1);
                TradeTick {
                    symbol: symbol.clone(),
                    id: kline.open_time.timestamp_millis().to_string(),
                    price: kline.close,
                    quantity: (kline.volume / Decimal::from(num_trades)).round_dp(8),
                    side: if kline.is_bullish() { Side::Buy } else { Side::Sell },
                    timestamp: kline.close_time,
                }
            })
            .collect())
    }

    async fn get_ticker(&self, symbol: &Symbol) -> ExchangeResult<Ticker> {
        self.ensure_initialized()?;
        let feed = self.data_feed.read().await;
        feed.ticker(symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))
    }

    fn rate_limit_ms(&self) -> u64 {
        self.config.rate_limit_ms
    }
}
