//! # Trader Feed
//!
//! 거래소 한 곳의 시장 데이터를 여러 내부 소비자에게 배포합니다.
//!
//! - [`resolver`]: 설정과 거래소 지원 정보로 거래 페어/타임프레임 해석
//! - [`channel`]: (데이터 종류, 거래소)별 브로드캐스트 채널 레지스트리
//! - [`producer`]: 데이터 종류별 주기 조회 및 발행
//! - [`websocket`]: 스트리밍 구현 레지스트리와 재시작 빈도 제한
//! - [`cache`]: 통째로 교체되는 계좌/심볼 데이터 캐시
//! - [`manager`]: 위 구성 요소를 순서대로 초기화하는 거래소 매니저

pub mod cache;
pub mod channel;
pub mod error;
pub mod manager;
pub mod producer;
pub mod resolver;
pub mod websocket;

pub use cache::{DataCache, ExchangePersonalData, ExchangeSymbolsData, SymbolData};
pub use channel::{
    BalanceSnapshot, Channel, ChannelKind, ChannelPayload, ChannelRegistry, OpenOrders,
    RecentTrades, Subscription,
};
pub use error::{FeedError, FeedResult};
pub use manager::{ExchangeManager, ManagerMode, TraderHandle};
pub use producer::{Producer, ProducerSet, ProducerState};
pub use resolver::{resolve, Resolution, ResolutionWarning};
pub use websocket::{
    ConnectionState, ResetGate, StreamingClient, StreamingContext, StreamingRegistry,
    WebSocketSupervisor, RESET_MIN_INTERVAL,
};
