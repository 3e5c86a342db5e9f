//! 시스템 전반에서 사용되는 공통 타입.

mod exchange;
mod symbol;
mod timeframe;

pub use exchange::*;
pub use symbol::*;
pub use timeframe::*;

/// 가격 (정밀 소수).
pub type Price = rust_decimal::Decimal;

/// 수량 (정밀 소수).
pub type Quantity = rust_decimal::Decimal;
