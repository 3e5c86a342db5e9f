//! 거래소 에러 타입.

use thiserror::Error;

/// 거래소 어댑터 호출 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 스트리밍 연결 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 유효하지 않은 수량
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// 잔고 부족
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// 주문을 찾을 수 없음
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// 거래소가 지원하지 않는 심볼
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// `initialize()` 전에 호출됨
    #[error("Adapter not initialized: {0}")]
    NotInitialized(String),

    /// 레지스트리에 없는 거래소
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    /// 어댑터가 제공하지 않는 기능
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl ExchangeError {
    /// 다음 주기에 다시 시도하면 성공할 수 있는 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Disconnected(_)
                | ExchangeError::Timeout(_)
        )
    }

    /// 심볼 단위 에러인지 확인 (다른 심볼 조회에는 영향 없음).
    pub fn is_symbol_error(&self) -> bool {
        matches!(
            self,
            ExchangeError::SymbolNotFound(_) | ExchangeError::NotSupported(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ExchangeError::Disconnected("socket closed".into()).is_retryable());
        assert!(ExchangeError::Timeout("ticker".into()).is_retryable());
        assert!(!ExchangeError::InsufficientBalance("USDT".into()).is_retryable());

        let missing = ExchangeError::SymbolNotFound("XRP/USD".into());
        assert!(!missing.is_retryable());
        assert!(missing.is_symbol_error());
        assert!(!ExchangeError::NotInitialized("binance".into()).is_symbol_error());
    }
}
