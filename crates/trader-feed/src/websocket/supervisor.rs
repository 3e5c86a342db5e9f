//! 스트리밍 연결 감독자.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use trader_core::{ExchangeId, Symbol, Timeframe};
use trader_exchange::ExchangeError;

use super::{ConnectionState, StreamingClient, StreamingContext, StreamingRegistry};
use crate::cache::{DataCache, ExchangePersonalData};
use crate::error::{FeedError, FeedResult};

/// 재시작 사이의 최소 간격.
pub const RESET_MIN_INTERVAL: Duration = Duration::from_secs(15);

/// 재시작 빈도 제한.
///
/// 마지막으로 받아들인 재시작 이후 최소 간격을 *초과*해야 다음 재시작을
/// 받아들입니다. 정확히 최소 간격만큼 지난 호출은 거부됩니다.
#[derive(Debug, Clone)]
pub struct ResetGate {
    min_interval: Duration,
    last_reset: Option<Instant>,
}

impl Default for ResetGate {
    fn default() -> Self {
        Self::new(RESET_MIN_INTERVAL)
    }
}

impl ResetGate {
    /// 최소 간격을 지정해 생성합니다.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_reset: None,
        }
    }

    /// `now` 시각의 재시작을 받아들일지 결정하고, 받아들이면 시각을 기록합니다.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_reset {
            if now.saturating_duration_since(last) <= self.min_interval {
                return false;
            }
        }
        self.last_reset = Some(now);
        true
    }

    /// 마지막으로 받아들인 재시작 시각.
    pub fn last_reset(&self) -> Option<Instant> {
        self.last_reset
    }
}

/// 거래소 하나의 스트리밍 연결을 시작하고 재시작 빈도를 관리합니다.
///
/// 매니저 전체가 아닌 채널과 지원 정보(`StreamingContext`), 계좌 캐시만 가집니다.
pub struct WebSocketSupervisor {
    registry: StreamingRegistry,
    context: StreamingContext,
    personal: Arc<DataCache<ExchangePersonalData>>,
    gate: ResetGate,
    client: Option<Arc<dyn StreamingClient>>,
}

impl WebSocketSupervisor {
    /// 새 감독자를 생성합니다. 연결은 [`start`](Self::start) 전까지 만들지 않습니다.
    pub fn new(
        registry: StreamingRegistry,
        context: StreamingContext,
        personal: Arc<DataCache<ExchangePersonalData>>,
    ) -> Self {
        Self {
            registry,
            context,
            personal,
            gate: ResetGate::default(),
            client: None,
        }
    }

    /// 재시작 최소 간격을 변경합니다.
    pub fn with_reset_interval(mut self, min_interval: Duration) -> Self {
        self.gate = ResetGate::new(min_interval);
        self
    }

    fn exchange(&self) -> &ExchangeId {
        &self.context.exchange
    }

    /// 거래소에 맞는 스트리밍 구현을 찾아 구독을 설정하고 시작합니다.
    ///
    /// 등록된 구현이 없으면 `Ok(None)`이며 REST 프로듀서만으로 계속 동작합니다.
    /// 초기화나 시작에 실패하면 기록 후 `StreamingInit`을 반환하고 연결 객체는
    /// 보관하지 않습니다.
    pub async fn start(
        &mut self,
        pairs: &[Symbol],
        timeframes: &[Timeframe],
    ) -> FeedResult<Option<Arc<dyn StreamingClient>>> {
        if let Some(client) = &self.client {
            debug!(exchange = %self.exchange(), "스트리밍 연결이 이미 존재함");
            return Ok(Some(Arc::clone(client)));
        }

        let Some(factory) = self.registry.find(self.exchange()) else {
            info!(exchange = %self.exchange(), "스트리밍 구현 없음, REST 폴링만 사용");
            return Ok(None);
        };

        let exchange = self.exchange().clone();
        let streaming_error = |source: ExchangeError| FeedError::StreamingInit {
            exchange: exchange.to_string(),
            source,
        };

        let started = match factory(self.context.clone()) {
            Ok(client) => match client.initialize_subscriptions(timeframes, pairs).await {
                Ok(()) => client.start().await.map(|()| client),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        let client = match started {
            Ok(client) => client,
            Err(e) => {
                error!(exchange = %exchange, error = %e, "스트리밍 연결 시작 실패");
                return Err(streaming_error(e));
            }
        };

        info!(
            exchange = %exchange,
            pairs = pairs.len(),
            time_frames = timeframes.len(),
            "스트리밍 연결 시작"
        );
        self.client = Some(Arc::clone(&client));
        Ok(Some(client))
    }

    /// 스트리밍 연결을 재시작합니다. 재시작이 적용되었으면 `true`.
    ///
    /// 최소 간격 안의 호출은 아무것도 하지 않습니다. 적용되면 계좌 캐시를 새
    /// 빈 객체로 교체하고, 연결이 있으면 같은 객체 안에서 소켓을 다시 엽니다.
    /// 채널과 구독자는 그대로 유지됩니다.
    pub async fn reset(&mut self) -> bool {
        if !self.gate.try_acquire(Instant::now()) {
            debug!(exchange = %self.exchange(), "최근에 재시작함, 요청 무시");
            return false;
        }

        self.personal.replace(ExchangePersonalData::default());

        if let Some(client) = &self.client {
            info!(exchange = %self.context.exchange, "스트리밍 연결 재시작");
            if let Err(e) = client.close_and_restart().await {
                warn!(exchange = %self.context.exchange, error = %e, "스트리밍 재시작 실패");
            }
        }
        true
    }

    /// 연결을 종료하고 놓아줍니다.
    pub async fn stop(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.stop().await {
                warn!(exchange = %self.context.exchange, error = %e, "스트리밍 종료 실패");
            }
        }
    }

    /// 현재 연결.
    pub fn client(&self) -> Option<&Arc<dyn StreamingClient>> {
        self.client.as_ref()
    }

    /// 현재 연결 상태.
    pub fn connection_state(&self) -> ConnectionState {
        self.client
            .as_ref()
            .map_or(ConnectionState::Absent, |client| client.state())
    }

    /// 재시작 빈도 제한 상태.
    pub fn reset_gate(&self) -> &ResetGate {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelRegistry;
    use crate::websocket::testing::RecordingClient;
    use std::sync::atomic::Ordering;
    use trader_exchange::SymbolCapability;

    fn context() -> StreamingContext {
        let btc = Symbol::crypto("BTC", "USDT");
        StreamingContext {
            exchange: ExchangeId::new("binance"),
            channels: Arc::new(ChannelRegistry::default()),
            capability: Arc::new(SymbolCapability::new([btc], [Timeframe::M1, Timeframe::H1])),
        }
    }

    fn registry_with(client: Arc<RecordingClient>) -> StreamingRegistry {
        let mut registry = StreamingRegistry::new();
        registry.register("binance", move |_context| {
            let client: Arc<dyn StreamingClient> = client.clone();
            Ok(client)
        });
        registry
    }

    #[test]
    fn test_gate_strictly_greater_than_interval() {
        let mut gate = ResetGate::new(Duration::from_secs(15));
        let t0 = Instant::now();

        assert!(gate.try_acquire(t0));
        assert!(!gate.try_acquire(t0 + Duration::from_secs(2)));
        assert!(!gate.try_acquire(t0 + Duration::from_secs(15)));
        assert!(gate.try_acquire(t0 + Duration::from_secs(16)));
        assert_eq!(gate.last_reset(), Some(t0 + Duration::from_secs(16)));
    }

    #[tokio::test]
    async fn test_no_implementation_is_not_an_error() {
        let personal = Arc::new(DataCache::default());
        let mut supervisor = WebSocketSupervisor::new(StreamingRegistry::new(), context(), personal);

        let client = supervisor.start(&[], &[]).await.unwrap();
        assert!(client.is_none());
        assert_eq!(supervisor.connection_state(), ConnectionState::Absent);
        // 연결이 없어도 재시작은 캐시를 교체한다
        assert!(supervisor.reset().await);
    }

    #[tokio::test]
    async fn test_start_initializes_subscriptions() {
        let recording = Arc::new(RecordingClient::new(ExchangeId::new("binance")));
        let personal = Arc::new(DataCache::default());
        let mut supervisor =
            WebSocketSupervisor::new(registry_with(recording.clone()), context(), personal);

        let pairs = vec![Symbol::crypto("BTC", "USDT")];
        let timeframes = vec![Timeframe::H1, Timeframe::M1];
        let client = supervisor.start(&pairs, &timeframes).await.unwrap().unwrap();

        assert_eq!(client.id(), &ExchangeId::new("binance"));
        assert_eq!(
            *recording.subscriptions.lock().unwrap(),
            Some((timeframes, pairs))
        );
        assert_eq!(supervisor.connection_state(), ConnectionState::Open);

        supervisor.stop().await;
        assert_eq!(recording.stops.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.connection_state(), ConnectionState::Absent);
    }

    #[tokio::test]
    async fn test_start_failure_keeps_nothing() {
        let mut failing = RecordingClient::new(ExchangeId::new("binance"));
        failing.fail_start = true;
        let personal = Arc::new(DataCache::default());
        let mut supervisor =
            WebSocketSupervisor::new(registry_with(Arc::new(failing)), context(), personal);

        let result = supervisor.start(&[], &[]).await;
        assert!(matches!(result, Err(FeedError::StreamingInit { .. })));
        assert!(supervisor.client().is_none());
    }

    #[tokio::test]
    async fn test_factory_failure_is_reported() {
        let mut registry = StreamingRegistry::new();
        registry.register("binance", |_context| {
            Err(ExchangeError::NotSupported("streaming".into()))
        });
        let personal = Arc::new(DataCache::default());
        let mut supervisor = WebSocketSupervisor::new(registry, context(), personal);

        let result = supervisor.start(&[], &[]).await;
        assert!(matches!(
            result,
            Err(FeedError::StreamingInit {
                source: ExchangeError::NotSupported(_),
                ..
            })
        ));
        assert!(supervisor.client().is_none());
        assert_eq!(supervisor.connection_state(), ConnectionState::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_rate_limited() {
        let recording = Arc::new(RecordingClient::new(ExchangeId::new("binance")));
        let personal: Arc<DataCache<ExchangePersonalData>> = Arc::new(DataCache::default());
        let mut supervisor =
            WebSocketSupervisor::new(registry_with(recording.clone()), context(), personal.clone());
        supervisor.start(&[], &[]).await.unwrap();

        let before = personal.load();
        assert!(supervisor.reset().await);
        let after_first = personal.load();
        assert!(!Arc::ptr_eq(&before, &after_first));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!supervisor.reset().await);
        assert!(Arc::ptr_eq(&after_first, &personal.load()));
        assert_eq!(recording.restarts(), 1);

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(supervisor.reset().await);
        assert_eq!(recording.restarts(), 2);
    }
}
