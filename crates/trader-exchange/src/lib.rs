//! 거래소 어댑터 경계.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `ExchangeAdapter` trait: 라이브/시뮬레이션 공통 인터페이스
//! - `SymbolCapability`: 거래소가 보고한 심볼/타임프레임 지원 정보
//! - `AdapterRegistry`: 거래소 식별자별 라이브 어댑터 등록
//! - 시뮬레이션 거래소

pub mod capability;
pub mod error;
pub mod registry;
pub mod simulated;
pub mod traits;

pub use capability::SymbolCapability;
pub use error::*;
pub use registry::{AdapterFactory, AdapterRegistry};
pub use simulated::{DataFeed, SimulatedExchange};
pub use traits::*;
