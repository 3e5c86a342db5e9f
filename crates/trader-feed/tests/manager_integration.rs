//! 거래소 매니저 통합 테스트.
//!
//! 시뮬레이션 거래소를 어댑터로 사용하고, 스트리밍 연결은 호출 횟수를
//! 기록하는 구현으로 대체합니다.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trader_core::{
    ExchangeId, FeedConfig, OrderBook, SimulatorConfig, Symbol, Ticker, Timeframe,
};
use trader_exchange::{
    AdapterRegistry, Balance, ExchangeAdapter, ExchangeError, ExchangeResult, MarketStatus,
    SimulatedExchange, SymbolCapability,
};
use trader_feed::{
    ChannelKind, ConnectionState, ExchangeManager, FeedError, ManagerMode, ProducerState,
    ResolutionWarning, StreamingClient, StreamingRegistry, TraderHandle,
};

fn sym(s: &str) -> Symbol {
    s.parse().unwrap()
}

fn simulated_adapter(symbols: &[&str]) -> Arc<dyn ExchangeAdapter> {
    let config = SimulatorConfig {
        enabled: true,
        symbols: symbols.iter().map(|s| sym(s)).collect(),
        time_frames: vec![Timeframe::M1, Timeframe::M5, Timeframe::H1, Timeframe::H4],
        history_len: 30,
        seed: 7,
        rate_limit_ms: 100,
        initial_balances: [("USD".to_string(), rust_decimal::Decimal::from(5000))].into(),
        ..Default::default()
    };
    Arc::new(
        SimulatedExchange::new(&config)
            .with_id(ExchangeId::new("binance"))
            .with_start_time(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
    )
}

const LIVE_CONFIG: &str = r#"
    time_frames = ["4h", "1h", "1d"]

    [exchanges.binance]
    api_key = "key"
    api_secret = "secret"

    [[crypto_currencies]]
    name = "BTC"
    pairs = "*"
    quote = "USD"

    [[crypto_currencies]]
    name = "Ripple"
    pairs = ["BTC/USD", "XRP/USD"]
"#;

fn live_config() -> Arc<FeedConfig> {
    Arc::new(FeedConfig::from_toml_str(LIVE_CONFIG).unwrap())
}

/// 호출 횟수를 기록하는 스트리밍 구현.
struct RecordingStream {
    id: ExchangeId,
    fail_start: bool,
    subscriptions: Mutex<Option<(Vec<Timeframe>, Vec<Symbol>)>>,
    restarts: AtomicUsize,
    state: Mutex<ConnectionState>,
}

impl RecordingStream {
    fn new(fail_start: bool) -> Arc<Self> {
        Arc::new(Self {
            id: ExchangeId::new("binance"),
            fail_start,
            subscriptions: Mutex::new(None),
            restarts: AtomicUsize::new(0),
            state: Mutex::new(ConnectionState::Absent),
        })
    }
}

#[async_trait]
impl StreamingClient for RecordingStream {
    fn id(&self) -> &ExchangeId {
        &self.id
    }

    async fn initialize_subscriptions(
        &self,
        timeframes: &[Timeframe],
        pairs: &[Symbol],
    ) -> ExchangeResult<()> {
        *self.subscriptions.lock().unwrap() = Some((timeframes.to_vec(), pairs.to_vec()));
        *self.state.lock().unwrap() = ConnectionState::Connecting;
        Ok(())
    }

    async fn start(&self) -> ExchangeResult<()> {
        if self.fail_start {
            return Err(ExchangeError::Disconnected("handshake rejected".to_string()));
        }
        *self.state.lock().unwrap() = ConnectionState::Open;
        Ok(())
    }

    async fn close_and_restart(&self) -> ExchangeResult<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = ConnectionState::Open;
        Ok(())
    }

    async fn stop(&self) -> ExchangeResult<()> {
        *self.state.lock().unwrap() = ConnectionState::Absent;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }
}

fn streaming_with(stream: Arc<RecordingStream>) -> StreamingRegistry {
    let mut registry = StreamingRegistry::new();
    registry.register("binance", move |_context| {
        let client: Arc<dyn StreamingClient> = stream.clone();
        Ok(client)
    });
    registry
}

/// 지원 정보를 보고하지 않는 어댑터.
struct SilentAdapter {
    id: ExchangeId,
}

#[async_trait]
impl ExchangeAdapter for SilentAdapter {
    fn id(&self) -> &ExchangeId {
        &self.id
    }

    async fn initialize(&self) -> ExchangeResult<()> {
        Ok(())
    }

    async fn capability(&self) -> Option<SymbolCapability> {
        None
    }

    async fn market_status(&self, symbol: &Symbol) -> ExchangeResult<MarketStatus> {
        Err(ExchangeError::SymbolNotFound(symbol.to_string()))
    }

    async fn get_balances(&self) -> ExchangeResult<Vec<Balance>> {
        Err(ExchangeError::NotSupported("balances".to_string()))
    }

    async fn get_open_orders(
        &self,
        _symbol: Option<&Symbol>,
    ) -> ExchangeResult<Vec<trader_core::OrderStatus>> {
        Err(ExchangeError::NotSupported("orders".to_string()))
    }

    async fn get_klines(
        &self,
        _symbol: &Symbol,
        _timeframe: Timeframe,
        _limit: Option<u32>,
    ) -> ExchangeResult<Vec<trader_core::Kline>> {
        Err(ExchangeError::NotSupported("klines".to_string()))
    }

    async fn get_order_book(&self, _symbol: &Symbol, _limit: Option<u32>) -> ExchangeResult<OrderBook> {
        Err(ExchangeError::NotSupported("order book".to_string()))
    }

    async fn get_recent_trades(
        &self,
        _symbol: &Symbol,
        _limit: Option<u32>,
    ) -> ExchangeResult<Vec<trader_core::TradeTick>> {
        Err(ExchangeError::NotSupported("trades".to_string()))
    }

    async fn get_ticker(&self, _symbol: &Symbol) -> ExchangeResult<Ticker> {
        Err(ExchangeError::NotSupported("ticker".to_string()))
    }

    fn rate_limit_ms(&self) -> u64 {
        0
    }
}

struct PaperTrader;

impl TraderHandle for PaperTrader {
    fn name(&self) -> &str {
        "paper"
    }
}

#[tokio::test(start_paused = true)]
async fn test_pair_resolution_through_manager() {
    let mut manager = ExchangeManager::new(live_config(), "binance")
        .with_adapter(simulated_adapter(&["BTC/USD", "BTC/EUR", "ETH/USD"]))
        .rest_only(true);
    manager.initialize().await.unwrap();

    // 와일드카드는 quote 통화가 같은 모든 심볼로 확장된다
    assert_eq!(
        manager.get_traded_pairs(Some("BTC")),
        vec![sym("BTC/USD"), sym("ETH/USD")]
    );
    // 지원하지 않는 페어는 경고와 함께 제외된다
    assert_eq!(manager.get_traded_pairs(Some("Ripple")), vec![sym("BTC/USD")]);
    assert_eq!(
        manager.resolution().unwrap().warnings,
        vec![
            ResolutionWarning::UnsupportedPair {
                currency: "Ripple".to_string(),
                pair: sym("XRP/USD"),
            },
            ResolutionWarning::UnsupportedTimeframe {
                timeframe: Timeframe::D1,
            },
        ]
    );
    assert_eq!(
        manager.get_traded_pairs(None),
        vec![sym("BTC/USD"), sym("ETH/USD"), sym("BTC/USD")]
    );
    assert!(manager.get_traded_pairs(Some("Dogecoin")).is_empty());

    assert_eq!(
        manager.time_frames(),
        &[Timeframe::H4, Timeframe::H1, Timeframe::M1]
    );
    assert!(manager.time_frame_exists(Timeframe::M5, None));
    assert!(!manager.time_frame_exists(Timeframe::D1, None));
    assert_eq!(manager.rate_limit(), Duration::from_millis(100));
    assert!(!manager.need_user_stream());

    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_channels_receive_published_values() {
    let mut manager = ExchangeManager::new(live_config(), "binance")
        .with_adapter(simulated_adapter(&["BTC/USD", "ETH/USD"]))
        .rest_only(true);
    manager.initialize().await.unwrap();

    let exchange = manager.exchange_id().clone();
    assert_eq!(manager.channels().kinds(&exchange), ChannelKind::ALL.to_vec());
    assert!(manager
        .producer_states()
        .iter()
        .all(|(_, state)| *state != ProducerState::Stopped));

    let mut tickers = manager.subscribe::<Ticker>().unwrap();
    let mut books = manager.subscribe::<OrderBook>().unwrap();

    // 구독 이후 다음 주기의 값을 받는다
    let ticker = tickers.recv().await.unwrap();
    assert!(ticker.symbol == sym("BTC/USD") || ticker.symbol == sym("ETH/USD"));
    let book = books.recv().await.unwrap();
    assert_eq!(book.bids.len(), 20);

    // 캐시도 같은 채널을 구독한다
    for _ in 0..100 {
        if manager.get_symbol_data(&ticker.symbol).is_some_and(|d| d.ticker.is_some()) {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(manager.get_symbol_data(&ticker.symbol).unwrap().ticker.is_some());

    manager.reset_symbols_data();
    assert!(manager.symbols_data().is_empty());

    manager.stop().await;
    while tickers.try_recv().is_some() {}
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(tickers.try_recv().is_none());
    assert!(manager
        .producer_states()
        .iter()
        .all(|(_, state)| *state == ProducerState::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_websocket_reset_is_rate_limited() {
    let stream = RecordingStream::new(false);
    let mut manager = ExchangeManager::new(live_config(), "binance")
        .with_adapter(simulated_adapter(&["BTC/USD", "ETH/USD"]))
        .with_streaming(streaming_with(stream.clone()));
    manager.initialize().await.unwrap();

    assert_eq!(manager.websocket_state().await, ConnectionState::Open);
    let (timeframes, pairs) = stream.subscriptions.lock().unwrap().clone().unwrap();
    assert_eq!(timeframes, manager.time_frames());
    assert_eq!(pairs, manager.get_traded_pairs(None));

    // 잔고가 계좌 캐시에 반영될 때까지 대기
    for _ in 0..100 {
        if manager.personal_data().balances.is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(manager.personal_data().balances.is_some());

    assert!(manager.reset_websocket().await);
    assert!(manager.personal_data().is_empty());
    assert_eq!(stream.restarts.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(!manager.reset_websocket().await);
    assert_eq!(stream.restarts.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(16)).await;
    assert!(manager.reset_websocket().await);
    assert_eq!(stream.restarts.load(Ordering::SeqCst), 2);

    // 채널과 구독자는 재시작 후에도 그대로 유지된다
    let mut tickers = manager.subscribe::<Ticker>().unwrap();
    assert!(tickers.recv().await.is_some());

    manager.stop().await;
    assert_eq!(manager.websocket_state().await, ConnectionState::Absent);
}

#[tokio::test(start_paused = true)]
async fn test_streaming_failure_is_not_fatal() {
    let stream = RecordingStream::new(true);
    let mut manager = ExchangeManager::new(live_config(), "binance")
        .with_adapter(simulated_adapter(&["BTC/USD"]))
        .with_streaming(streaming_with(stream));
    manager.initialize().await.unwrap();

    assert!(manager.is_ready());
    assert!(!manager.websocket_available().await);
    assert_eq!(manager.websocket_state().await, ConnectionState::Absent);
    // 연결이 없어도 재시작 요청은 계좌 캐시를 교체한다
    assert!(manager.reset_websocket().await);

    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_rest_only_skips_streaming() {
    let stream = RecordingStream::new(false);
    let mut manager = ExchangeManager::new(live_config(), "binance")
        .with_adapter(simulated_adapter(&["BTC/USD"]))
        .with_streaming(streaming_with(stream.clone()))
        .rest_only(true);
    manager.initialize().await.unwrap();

    assert!(stream.subscriptions.lock().unwrap().is_none());
    assert_eq!(manager.websocket_state().await, ConnectionState::Absent);
    manager.stop().await;
}

#[tokio::test]
async fn test_missing_capability_aborts_initialize() {
    let mut manager = ExchangeManager::new(live_config(), "binance").with_adapter(Arc::new(
        SilentAdapter {
            id: ExchangeId::new("binance"),
        },
    ));

    let result = manager.initialize().await;
    assert!(matches!(result, Err(FeedError::CapabilityLoad { .. })));
    assert!(!manager.is_ready());
    assert!(manager.channels().is_empty());
    assert!(manager.subscribe::<Ticker>().is_none());
    assert!(manager.producer_states().is_empty());
}

#[tokio::test]
async fn test_live_without_registered_adapter() {
    let mut manager = ExchangeManager::new(live_config(), "binance");
    assert_eq!(manager.mode(), ManagerMode::Live);

    let result = manager.initialize().await;
    assert!(matches!(result, Err(FeedError::AdapterNotFound(name)) if name == "binance"));
    assert!(manager.channels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_live_adapter_from_registry() {
    let mut adapters = AdapterRegistry::new();
    adapters.register("binance", |_id, config| {
        assert!(config.is_some_and(|c| c.has_credentials()));
        Ok(simulated_adapter(&["BTC/USD"]))
    });

    let mut manager = ExchangeManager::new(live_config(), "Binance")
        .with_adapters(adapters)
        .rest_only(true);
    manager.initialize().await.unwrap();
    assert!(manager.is_ready());
    assert_eq!(
        manager.exchange_symbol(&sym("BTC/USD")).await.unwrap(),
        "BTC/USD"
    );
    manager.stop().await;
}

#[tokio::test]
async fn test_unconfigured_exchange_is_inert() {
    let mut manager = ExchangeManager::new(live_config(), "kraken")
        .with_adapter(simulated_adapter(&["BTC/USD"]));

    assert!(!manager.enabled());
    manager.initialize().await.unwrap();
    assert!(!manager.is_ready());
    assert!(manager.channels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_register_trader_replaces_personal_data() {
    let mut manager = ExchangeManager::new(live_config(), "binance")
        .with_adapter(simulated_adapter(&["BTC/USD"]))
        .rest_only(true);
    manager.initialize().await.unwrap();

    for _ in 0..100 {
        if manager.personal_data().balances.is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }
    let before = manager.personal_data();
    assert!(before.balances.is_some());

    manager.register_trader(Arc::new(PaperTrader));
    assert_eq!(manager.trader().unwrap().name(), "paper");
    assert!(manager.personal_data().is_empty());
    // 이전 스냅샷은 그대로 남아 있다
    assert!(before.balances.is_some());

    manager.stop().await;
}

#[tokio::test]
async fn test_simulated_mode_from_config() {
    let config = FeedConfig::from_toml_str(
        r#"
        time_frames = ["1h"]

        [simulator]
        enabled = true
        symbols = ["BTC/USDT", "ETH/USDT"]
        time_frames = ["1m", "1h"]
        history_len = 10

        [[crypto_currencies]]
        name = "Bitcoin"
        pairs = ["BTC/USDT"]
        "#,
    )
    .unwrap();

    let mut manager = ExchangeManager::new(Arc::new(config), "simulated");
    assert_eq!(manager.mode(), ManagerMode::Simulated);
    assert!(manager.enabled());

    manager.initialize().await.unwrap();
    assert_eq!(manager.get_traded_pairs(None), vec![sym("BTC/USDT")]);
    assert_eq!(manager.time_frames(), &[Timeframe::H1, Timeframe::M1]);
    assert_eq!(
        manager.exchange_symbol_id(&sym("BTC/USDT")).await.unwrap(),
        "BTCUSDT"
    );
    manager.stop().await;
}
