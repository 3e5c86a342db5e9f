//! 스트리밍(WebSocket) 연결 추상화와 구현 레지스트리.
//!
//! 거래소별 스트리밍 구현은 실행 시점에 [`StreamingRegistry`]에 거래소
//! 식별자로 등록됩니다. 구현은 REST 프로듀서와 같은 채널에 발행하므로
//! 구독자는 값이 어디서 왔는지 구분하지 않습니다.

mod supervisor;

pub use supervisor::{ResetGate, WebSocketSupervisor, RESET_MIN_INTERVAL};

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use trader_core::{ExchangeId, Symbol, Timeframe};
use trader_exchange::{ExchangeResult, SymbolCapability};

use crate::channel::ChannelRegistry;

/// 스트리밍 연결 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// 연결 없음
    #[default]
    Absent,
    /// 연결 중
    Connecting,
    /// 연결됨
    Open,
    /// 일부 스트림 끊김
    Degraded,
    /// 재시작 중
    Resetting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Absent => "absent",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Degraded => "degraded",
            ConnectionState::Resetting => "resetting",
        };
        f.write_str(name)
    }
}

/// 거래소 스트리밍 구현.
///
/// 재시작은 같은 객체 안에서 내부 소켓 세션만 새로 만듭니다.
#[async_trait]
pub trait StreamingClient: Send + Sync {
    /// 구현이 담당하는 거래소.
    fn id(&self) -> &ExchangeId;

    /// 구독할 타임프레임과 거래 페어를 설정합니다. `start` 전에 호출됩니다.
    async fn initialize_subscriptions(
        &self,
        timeframes: &[Timeframe],
        pairs: &[Symbol],
    ) -> ExchangeResult<()>;

    /// 연결을 시작합니다.
    async fn start(&self) -> ExchangeResult<()>;

    /// 소켓을 닫고 같은 구독으로 다시 연결합니다.
    async fn close_and_restart(&self) -> ExchangeResult<()>;

    /// 연결을 종료합니다.
    async fn stop(&self) -> ExchangeResult<()>;

    /// 현재 연결 상태.
    fn state(&self) -> ConnectionState;
}

/// 스트리밍 구현 생성 시 전달되는 의존성.
#[derive(Clone)]
pub struct StreamingContext {
    /// 거래소 식별자
    pub exchange: ExchangeId,
    /// 발행 대상 채널
    pub channels: Arc<ChannelRegistry>,
    /// 거래소 지원 정보
    pub capability: Arc<SymbolCapability>,
}

/// 스트리밍 구현 생성 함수.
pub type StreamingFactory =
    Arc<dyn Fn(StreamingContext) -> ExchangeResult<Arc<dyn StreamingClient>> + Send + Sync>;

/// 거래소 식별자 → 스트리밍 구현 생성 함수.
#[derive(Clone, Default)]
pub struct StreamingRegistry {
    factories: HashMap<ExchangeId, StreamingFactory>,
}

impl StreamingRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 생성 함수를 등록합니다. 같은 식별자는 덮어씁니다.
    pub fn register<F>(&mut self, id: impl Into<ExchangeId>, factory: F) -> &mut Self
    where
        F: Fn(StreamingContext) -> ExchangeResult<Arc<dyn StreamingClient>> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
        self
    }

    /// 거래소에 맞는 생성 함수를 찾습니다.
    pub fn find(&self, id: &ExchangeId) -> Option<StreamingFactory> {
        self.factories.get(id).cloned()
    }

    /// 등록 여부를 확인합니다.
    pub fn contains(&self, id: &ExchangeId) -> bool {
        self.factories.contains_key(id)
    }
}

impl fmt::Debug for StreamingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingRegistry")
            .field("identities", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
