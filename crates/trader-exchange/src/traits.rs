//! 거래소 어댑터 trait 정의.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{ExchangeId, Kline, OrderBook, OrderStatus, Symbol, Ticker, Timeframe, TradeTick};

use crate::capability::SymbolCapability;
use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 자산의 잔고 정보.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// 자산 이름 (예: "BTC", "USDT")
    pub asset: String,
    /// 사용 가능한 잔고
    pub free: Decimal,
    /// 주문에 묶인 잔고
    pub locked: Decimal,
}

impl Balance {
    /// 총 잔고 반환 (사용 가능 + 묶인 잔고).
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

/// 거래소 고유 심볼 표기.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    /// 거래소 내부 ID (예: "BTCUSDT")
    pub native_id: String,
    /// 거래소 심볼 표기 (예: "BTC/USDT")
    pub native_symbol: String,
}

/// 라이브/시뮬레이션 거래소 공통 어댑터 인터페이스.
///
/// 배포 계층은 이 trait을 통해서만 거래소에 접근합니다.
/// 모든 조회는 `&self`로 동시에 호출될 수 있어야 합니다.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// 거래소 식별자.
    fn id(&self) -> &ExchangeId;

    /// 어댑터를 초기화합니다 (마켓 정보 로드 등).
    async fn initialize(&self) -> ExchangeResult<()>;

    /// 거래소가 보고한 심볼/타임프레임 지원 정보.
    ///
    /// 아직 로드되지 않았거나 거래소가 아무것도 보고하지 않으면 `None`.
    async fn capability(&self) -> Option<SymbolCapability>;

    /// 심볼의 거래소 고유 표기를 조회합니다.
    async fn market_status(&self, symbol: &Symbol) -> ExchangeResult<MarketStatus>;

    // === 계좌 ===

    /// 전체 잔고 조회.
    async fn get_balances(&self) -> ExchangeResult<Vec<Balance>>;

    /// 미체결 주문 조회 (`None`이면 전체 심볼).
    async fn get_open_orders(&self, symbol: Option<&Symbol>) -> ExchangeResult<Vec<OrderStatus>>;

    // === 시장 데이터 ===

    /// 마감된 과거 캔들 조회 (오래된 것부터 정렬).
    async fn get_klines(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: Option<u32>,
    ) -> ExchangeResult<Vec<Kline>>;

    /// 호가창 조회.
    async fn get_order_book(&self, symbol: &Symbol, limit: Option<u32>) -> ExchangeResult<OrderBook>;

    /// 최근 체결 조회 (오래된 것부터 정렬).
    async fn get_recent_trades(
        &self,
        symbol: &Symbol,
        limit: Option<u32>,
    ) -> ExchangeResult<Vec<TradeTick>>;

    /// 현재 시세 조회.
    async fn get_ticker(&self, symbol: &Symbol) -> ExchangeResult<Ticker>;

    /// 요청 간 최소 간격 (밀리초).
    fn rate_limit_ms(&self) -> u64;
}
