//! 주문 관련 타입.
//!
//! 배포 계층은 주문을 제출하지 않으므로 거래소가 보고하는
//! 미체결 주문의 상태만 다룹니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderStatusType` - 주문 상태
//! - `OrderStatus` - 거래소가 보고하는 주문 상태

use crate::types::{Price, Quantity, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// 주문 상태 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// 거래소에 제출됨 (대기 중)
    Open,
    /// 부분 체결됨
    PartiallyFilled,
    /// 전량 체결됨
    Filled,
    /// 사용자 또는 시스템에 의해 취소됨
    Cancelled,
    /// 거래소에서 거부됨
    Rejected,
    /// 유효 기간 만료
    Expired,
}

/// 거래소에서 반환하는 주문 상태.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatus {
    /// 거래소 주문 ID
    pub order_id: String,
    /// 거래 심볼
    pub symbol: Symbol,
    /// 주문 방향
    pub side: Side,
    /// 지정가 (시장가 주문이면 없음)
    pub price: Option<Price>,
    /// 주문 수량
    pub quantity: Quantity,
    /// 현재 상태
    pub status: OrderStatusType,
    /// 체결된 수량
    pub filled_quantity: Quantity,
    /// 마지막 업데이트 시각
    pub updated_at: DateTime<Utc>,
}

impl OrderStatus {
    /// 남은 수량을 반환합니다.
    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }
}
