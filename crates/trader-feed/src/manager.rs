//! 거래소 매니저.
//!
//! 어댑터 초기화, 페어/타임프레임 해석, 채널 생성, 프로듀서 실행,
//! 스트리밍 연결 시작을 순서대로 수행하고 매니저 수준의 조회를 제공합니다.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use trader_core::{ExchangeId, FeedConfig, Kline, OrderBook, Symbol, Ticker, Timeframe};
use trader_exchange::{
    AdapterRegistry, ExchangeAdapter, MarketStatus, SimulatedExchange, SymbolCapability,
};

use crate::cache::{
    spawn_cache_sink, DataCache, ExchangePersonalData, ExchangeSymbolsData, SymbolData,
};
use crate::channel::{
    BalanceSnapshot, ChannelKind, ChannelPayload, ChannelRegistry, OpenOrders, RecentTrades,
    Subscription,
};
use crate::error::{FeedError, FeedResult};
use crate::producer::{
    BalanceProducer, OhlcvProducer, OrderBookProducer, OrdersProducer, ProducerSet,
    ProducerState, RecentTradesProducer, TickerProducer,
};
use crate::resolver::{self, Resolution};
use crate::websocket::{
    ConnectionState, StreamingContext, StreamingRegistry, WebSocketSupervisor,
};

/// 데이터 소스 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerMode {
    /// 실거래소 연결
    Live,
    /// 시뮬레이션 거래소
    Simulated,
}

impl std::fmt::Display for ManagerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagerMode::Live => write!(f, "live"),
            ManagerMode::Simulated => write!(f, "simulated"),
        }
    }
}

/// 매니저에 등록되는 트레이딩 엔진.
pub trait TraderHandle: Send + Sync {
    /// 트레이더 이름.
    fn name(&self) -> &str;
}

/// 거래소 하나에 대한 데이터 배포 오케스트레이터.
pub struct ExchangeManager {
    config: Arc<FeedConfig>,
    exchange: ExchangeId,
    mode: ManagerMode,
    rest_only: bool,

    adapters: AdapterRegistry,
    streaming: StreamingRegistry,
    adapter: Option<Arc<dyn ExchangeAdapter>>,

    // 초기화 중 한 번 기록되고 이후 읽기 전용
    capability: Option<Arc<SymbolCapability>>,
    resolution: Option<Resolution>,

    channels: Arc<ChannelRegistry>,
    symbols_data: Arc<DataCache<ExchangeSymbolsData>>,
    personal_data: Arc<DataCache<ExchangePersonalData>>,

    producers: Option<ProducerSet>,
    supervisor: Mutex<Option<WebSocketSupervisor>>,
    cache_sink: Option<JoinHandle<()>>,
    trader: Option<Arc<dyn TraderHandle>>,

    cancel: CancellationToken,
    ready: bool,
}

impl ExchangeManager {
    /// 새 매니저를 생성합니다. 모드는 `simulator.enabled` 설정을 따릅니다.
    pub fn new(config: Arc<FeedConfig>, exchange: impl Into<ExchangeId>) -> Self {
        let mode = if config.simulator.enabled {
            ManagerMode::Simulated
        } else {
            ManagerMode::Live
        };
        let channels = Arc::new(ChannelRegistry::new(config.producers.channel_capacity));

        Self {
            config,
            exchange: exchange.into(),
            mode,
            rest_only: false,
            adapters: AdapterRegistry::new(),
            streaming: StreamingRegistry::new(),
            adapter: None,
            capability: None,
            resolution: None,
            channels,
            symbols_data: Arc::new(DataCache::default()),
            personal_data: Arc::new(DataCache::default()),
            producers: None,
            supervisor: Mutex::new(None),
            cache_sink: None,
            trader: None,
            cancel: CancellationToken::new(),
            ready: false,
        }
    }

    /// 데이터 소스 모드를 지정합니다.
    pub fn with_mode(mut self, mode: ManagerMode) -> Self {
        self.mode = mode;
        self
    }

    /// REST 전용으로 설정합니다. 스트리밍 연결을 시작하지 않습니다.
    pub fn rest_only(mut self, rest_only: bool) -> Self {
        self.rest_only = rest_only;
        self
    }

    /// 라이브 어댑터 레지스트리를 지정합니다.
    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    /// 스트리밍 구현 레지스트리를 지정합니다.
    pub fn with_streaming(mut self, streaming: StreamingRegistry) -> Self {
        self.streaming = streaming;
        self
    }

    /// 이미 생성된 어댑터를 사용합니다. 레지스트리 조회를 건너뜁니다.
    pub fn with_adapter(mut self, adapter: Arc<dyn ExchangeAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// 여러 매니저가 공유할 채널 레지스트리를 지정합니다.
    pub fn with_channel_registry(mut self, channels: Arc<ChannelRegistry>) -> Self {
        self.channels = channels;
        self
    }

    // =========================================================================
    // 초기화
    // =========================================================================

    /// 매니저를 초기화합니다.
    ///
    /// 어댑터 초기화 → 지원 정보 로드 → 페어/타임프레임 해석 → 채널 생성 →
    /// 프로듀서 시작 → (허용되면) 스트리밍 연결 시작 순으로 진행하며, 모두
    /// 성공해야 준비 상태가 됩니다. 지원 정보를 로드할 수 없으면
    /// [`FeedError::CapabilityLoad`]로 중단되고 채널은 생성되지 않습니다.
    /// 비활성 거래소는 아무것도 시작하지 않습니다.
    #[instrument(skip(self), fields(exchange = %self.exchange, mode = %self.mode))]
    pub async fn initialize(&mut self) -> FeedResult<()> {
        if self.ready {
            debug!("이미 초기화됨");
            return Ok(());
        }
        if !self.enabled() {
            return Ok(());
        }

        let adapter = self.create_adapter()?;
        adapter.initialize().await?;

        let capability = adapter.capability().await;
        let resolution =
            resolver::resolve(self.exchange.as_str(), &self.config, capability.as_ref())?;
        let capability = Arc::new(capability.unwrap_or_default());

        self.channels.create_all(&self.exchange);
        self.cache_sink = Some(spawn_cache_sink(
            &self.channels,
            &self.exchange,
            self.symbols_data.clone(),
            self.personal_data.clone(),
            self.cancel.child_token(),
        ));

        let producers = self.start_producers(&adapter, &resolution);
        info!(
            producers = producers.len(),
            traded_pairs = resolution.traded_pairs.len(),
            time_frames = ?resolution.timeframes,
            "프로듀서 시작 완료"
        );

        let mut supervisor = WebSocketSupervisor::new(
            self.streaming.clone(),
            StreamingContext {
                exchange: self.exchange.clone(),
                channels: self.channels.clone(),
                capability: capability.clone(),
            },
            self.personal_data.clone(),
        );
        if self.websocket_allowed() {
            if let Err(e) = supervisor
                .start(&resolution.traded_pairs, &resolution.timeframes)
                .await
            {
                warn!(error = %e, "스트리밍 없이 REST 폴링으로 계속 진행");
            }
        } else {
            debug!("스트리밍 연결 사용 안 함");
        }

        self.adapter = Some(adapter);
        self.capability = Some(capability);
        self.resolution = Some(resolution);
        self.producers = Some(producers);
        *self.supervisor.get_mut() = Some(supervisor);
        self.ready = true;

        info!("거래소 매니저 준비 완료");
        Ok(())
    }

    fn create_adapter(&self) -> FeedResult<Arc<dyn ExchangeAdapter>> {
        if let Some(adapter) = &self.adapter {
            return Ok(Arc::clone(adapter));
        }

        match self.mode {
            ManagerMode::Simulated => {
                let adapter: Arc<dyn ExchangeAdapter> = Arc::new(
                    SimulatedExchange::new(&self.config.simulator).with_id(self.exchange.clone()),
                );
                Ok(adapter)
            }
            ManagerMode::Live => {
                if !self.adapters.contains(&self.exchange) {
                    return Err(FeedError::AdapterNotFound(self.exchange.to_string()));
                }
                let config = self.config.exchange(self.exchange.as_str());
                Ok(self.adapters.create(&self.exchange, config)?)
            }
        }
    }

    fn start_producers(
        &self,
        adapter: &Arc<dyn ExchangeAdapter>,
        resolution: &Resolution,
    ) -> ProducerSet {
        let cadence = &self.config.producers;
        let pairs = unique_pairs(&resolution.traded_pairs);
        let mut producers = ProducerSet::new(&self.cancel);

        producers.spawn(
            BalanceProducer::new(
                self.channels.get_or_create::<BalanceSnapshot>(&self.exchange),
                adapter.clone(),
                cadence.balance_interval(),
            ),
            &self.exchange,
        );
        producers.spawn(
            OhlcvProducer::new(
                self.channels.get_or_create::<Kline>(&self.exchange),
                adapter.clone(),
                pairs.clone(),
                resolution.timeframes.clone(),
                cadence.ohlcv_grace(),
            ),
            &self.exchange,
        );
        producers.spawn(
            OrderBookProducer::new(
                self.channels.get_or_create::<OrderBook>(&self.exchange),
                adapter.clone(),
                pairs.clone(),
                cadence.order_book_depth,
                cadence.order_book_interval(),
            ),
            &self.exchange,
        );
        producers.spawn(
            RecentTradesProducer::new(
                self.channels.get_or_create::<RecentTrades>(&self.exchange),
                adapter.clone(),
                pairs.clone(),
                cadence.recent_trades_limit,
                cadence.recent_trades_interval(),
            ),
            &self.exchange,
        );
        producers.spawn(
            TickerProducer::new(
                self.channels.get_or_create::<Ticker>(&self.exchange),
                adapter.clone(),
                pairs.clone(),
                cadence.ticker_interval(),
            ),
            &self.exchange,
        );
        producers.spawn(
            OrdersProducer::new(
                self.channels.get_or_create::<OpenOrders>(&self.exchange),
                adapter.clone(),
                pairs,
                cadence.orders_interval(),
            ),
            &self.exchange,
        );

        producers
    }

    fn websocket_allowed(&self) -> bool {
        self.mode == ManagerMode::Live
            && !self.rest_only
            && self.credentials_configured()
            && !self.websocket_force_disabled()
    }

    /// 트레이딩 엔진을 등록하고 계좌 캐시를 새로 만듭니다.
    ///
    /// 정상적으로는 매니저 수명 동안 한 번만 호출됩니다.
    pub fn register_trader(&mut self, trader: Arc<dyn TraderHandle>) {
        if let Some(previous) = &self.trader {
            warn!(
                exchange = %self.exchange,
                previous = previous.name(),
                trader = trader.name(),
                "트레이더가 이미 등록되어 있어 교체함"
            );
        }
        info!(exchange = %self.exchange, trader = trader.name(), "트레이더 등록");
        self.trader = Some(trader);
        self.reset_personal_data();
    }

    /// 등록된 트레이더.
    pub fn trader(&self) -> Option<&Arc<dyn TraderHandle>> {
        self.trader.as_ref()
    }

    // =========================================================================
    // 상태 조회
    // =========================================================================

    /// 거래소 사용 가능 여부.
    ///
    /// 시뮬레이션 모드이거나 설정의 거래소 목록에 있으면 `true`.
    pub fn enabled(&self) -> bool {
        if self.mode == ManagerMode::Simulated {
            return true;
        }
        if self.config.exchange(self.exchange.as_str()).is_some() {
            return true;
        }
        warn!(exchange = %self.exchange, "설정에 없는 거래소이므로 비활성화됨");
        false
    }

    /// API 키와 시크릿이 설정되어 있는지 확인합니다.
    pub fn credentials_configured(&self) -> bool {
        self.config
            .exchange(self.exchange.as_str())
            .is_some_and(|config| config.has_credentials())
    }

    /// 설정에서 스트리밍이 명시적으로 꺼져 있는지 확인합니다.
    pub fn websocket_force_disabled(&self) -> bool {
        self.config
            .exchange(self.exchange.as_str())
            .is_some_and(|config| config.websocket_force_disabled())
    }

    /// 사용자 데이터 스트림이 필요한지 확인합니다 (트레이더 활성화 시).
    pub fn need_user_stream(&self) -> bool {
        self.config.trader.enabled
    }

    /// 준비 상태.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// 데이터 소스 모드.
    pub fn mode(&self) -> ManagerMode {
        self.mode
    }

    /// 거래소 식별자.
    pub fn exchange_id(&self) -> &ExchangeId {
        &self.exchange
    }

    /// 어댑터가 보고한 요청 간 최소 간격.
    pub fn rate_limit(&self) -> Duration {
        self.adapter
            .as_ref()
            .map_or(Duration::ZERO, |adapter| Duration::from_millis(adapter.rate_limit_ms()))
    }

    /// 거래소 지원 정보.
    pub fn capability(&self) -> Option<&SymbolCapability> {
        self.capability.as_deref()
    }

    /// 해석 결과.
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    /// 거래 페어. 암호화폐 이름을 주면 그 암호화폐의 페어만 반환합니다.
    pub fn get_traded_pairs(&self, crypto_currency: Option<&str>) -> Vec<Symbol> {
        let Some(resolution) = &self.resolution else {
            return Vec::new();
        };
        match crypto_currency {
            None => resolution.traded_pairs.clone(),
            Some(name) => resolution
                .pairs_for(name)
                .map(<[Symbol]>::to_vec)
                .unwrap_or_default(),
        }
    }

    /// 해석된 타임프레임 (긴 것부터).
    pub fn time_frames(&self) -> &[Timeframe] {
        self.resolution
            .as_ref()
            .map(|resolution| resolution.timeframes.as_slice())
            .unwrap_or(&[])
    }

    /// 실시간 평가용 최소 타임프레임.
    pub fn min_time_frame(&self) -> Option<Timeframe> {
        self.resolution.as_ref().map(|resolution| resolution.min_timeframe)
    }

    /// 거래소가 타임프레임을 지원하는지 확인합니다.
    pub fn time_frame_exists(&self, timeframe: Timeframe, symbol: Option<&Symbol>) -> bool {
        self.capability
            .as_ref()
            .is_some_and(|capability| capability.timeframe_exists(timeframe, symbol))
    }

    // =========================================================================
    // 심볼 변환
    // =========================================================================

    /// 심볼의 거래소 고유 표기를 조회합니다.
    ///
    /// 거래소가 모르는 심볼이면 [`FeedError::SymbolLookup`]을 반환합니다.
    /// 연결 에러 등은 [`FeedError::Exchange`]로 그대로 전달됩니다.
    pub async fn translate_symbol(&self, symbol: &Symbol) -> FeedResult<MarketStatus> {
        let lookup_error = |reason: String| FeedError::SymbolLookup {
            symbol: symbol.to_string(),
            reason,
        };

        let (Some(adapter), Some(capability)) = (&self.adapter, &self.capability) else {
            return Err(FeedError::NotInitialized(self.exchange.to_string()));
        };
        if !capability.symbol_exists(symbol) {
            return Err(lookup_error("거래소가 지원하지 않는 심볼".to_string()));
        }

        adapter.market_status(symbol).await.map_err(|e| {
            if e.is_symbol_error() {
                lookup_error(e.to_string())
            } else {
                FeedError::Exchange(e)
            }
        })
    }

    /// 거래소 내부 심볼 ID (예: "BTCUSDT").
    pub async fn exchange_symbol_id(&self, symbol: &Symbol) -> FeedResult<String> {
        Ok(self.translate_symbol(symbol).await?.native_id)
    }

    /// 거래소 심볼 표기 (예: "BTC/USDT").
    pub async fn exchange_symbol(&self, symbol: &Symbol) -> FeedResult<String> {
        Ok(self.translate_symbol(symbol).await?.native_symbol)
    }

    // =========================================================================
    // 채널과 캐시
    // =========================================================================

    /// 채널 레지스트리.
    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    /// 이 거래소의 채널을 구독합니다. 채널이 아직 없으면 `None`.
    pub fn subscribe<T: ChannelPayload>(&self) -> Option<Subscription<T>> {
        self.channels
            .get::<T>(&self.exchange)
            .map(|channel| channel.subscribe())
    }

    /// 프로듀서별 상태.
    pub fn producer_states(&self) -> Vec<(ChannelKind, ProducerState)> {
        self.producers
            .as_ref()
            .map(ProducerSet::states)
            .unwrap_or_default()
    }

    /// 심볼 시장 데이터 스냅샷.
    pub fn get_symbol_data(&self, symbol: &Symbol) -> Option<Arc<SymbolData>> {
        self.symbols_data.load().get(symbol)
    }

    /// 심볼 데이터 캐시.
    pub fn symbols_data(&self) -> Arc<ExchangeSymbolsData> {
        self.symbols_data.load()
    }

    /// 계좌 데이터 캐시.
    pub fn personal_data(&self) -> Arc<ExchangePersonalData> {
        self.personal_data.load()
    }

    /// 심볼 데이터 캐시를 새 빈 객체로 교체합니다.
    pub fn reset_symbols_data(&self) {
        debug!(exchange = %self.exchange, "심볼 데이터 캐시 초기화");
        self.symbols_data.replace(ExchangeSymbolsData::default());
    }

    /// 계좌 데이터 캐시를 새 빈 객체로 교체합니다.
    pub fn reset_personal_data(&self) {
        debug!(exchange = %self.exchange, "계좌 데이터 캐시 초기화");
        self.personal_data.replace(ExchangePersonalData::default());
    }

    // =========================================================================
    // 스트리밍 연결
    // =========================================================================

    /// 스트리밍 연결을 재시작합니다. 재시작이 적용되었으면 `true`.
    ///
    /// 초기화 전이거나 최소 간격 안의 호출이면 아무것도 하지 않습니다.
    pub async fn reset_websocket(&self) -> bool {
        match self.supervisor.lock().await.as_mut() {
            Some(supervisor) => supervisor.reset().await,
            None => false,
        }
    }

    /// 스트리밍 연결 상태.
    pub async fn websocket_state(&self) -> ConnectionState {
        self.supervisor
            .lock()
            .await
            .as_ref()
            .map_or(ConnectionState::Absent, WebSocketSupervisor::connection_state)
    }

    /// 스트리밍 연결이 있는지 확인합니다.
    pub async fn websocket_available(&self) -> bool {
        self.supervisor
            .lock()
            .await
            .as_ref()
            .is_some_and(|supervisor| supervisor.client().is_some())
    }

    /// 모든 프로듀서와 스트리밍 연결을 중지합니다.
    ///
    /// 반환 이후에는 어떤 채널에도 더 이상 발행되지 않습니다.
    pub async fn stop(&mut self) {
        if let Some(producers) = self.producers.as_mut() {
            producers.stop_all().await;
        }
        if let Some(supervisor) = self.supervisor.get_mut().as_mut() {
            supervisor.stop().await;
        }
        self.cancel.cancel();
        if let Some(task) = self.cache_sink.take() {
            if let Err(e) = task.await {
                warn!(exchange = %self.exchange, error = %e, "캐시 반영 태스크 비정상 종료");
            }
        }
        self.ready = false;
        info!(exchange = %self.exchange, "거래소 매니저 중지");
    }
}

impl Drop for ExchangeManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 순서를 유지하며 중복 페어를 제거합니다.
fn unique_pairs(pairs: &[Symbol]) -> Vec<Symbol> {
    let mut unique: Vec<Symbol> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        if !unique.contains(pair) {
            unique.push(pair.clone());
        }
    }
    unique
}
