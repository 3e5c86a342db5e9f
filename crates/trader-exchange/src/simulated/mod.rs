//! 모의투자 및 오프라인 실행을 위한 시뮬레이션 거래소.
//!
//! - 설정된 심볼/타임프레임을 지원 정보로 스스로 선언
//! - 초기화 시 랜덤 워크 캔들 이력 생성
//! - `step()`으로 시간 진행 및 지정가 주문 체결
//!
//! # 예제
//!
//! ```ignore
//! use trader_exchange::{ExchangeAdapter, SimulatedExchange};
//!
//! let exchange = SimulatedExchange::new(&config.simulator);
//! exchange.initialize().await?;
//! let ticker = exchange.get_ticker(&symbol).await?;
//! exchange.step().await?;
//! ```

mod data_feed;
mod exchange;

pub use data_feed::{generate_sample_klines, kline_to_ticker, DataFeed};
pub use exchange::SimulatedExchange;
