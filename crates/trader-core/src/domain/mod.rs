//! 도메인 모델.
//!
//! - `market_data` - 캔들, 시세, 호가창, 체결 틱
//! - `order` - 주문 방향 및 미체결 주문 상태

pub mod market_data;
pub mod order;

pub use market_data::*;
pub use order::*;
