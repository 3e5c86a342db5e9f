//! 거래소 식별자.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 거래소 고유 식별자.
///
/// 항상 소문자로 정규화되므로 설정 키, 채널 키, 스트리밍 구현 등록 키로
/// 그대로 사용할 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ExchangeId(String);

impl ExchangeId {
    /// 새 거래소 식별자를 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        ExchangeId(id.into().trim().to_lowercase())
    }

    /// 문자열 참조를 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 시뮬레이션 거래소 식별자.
    pub fn simulated() -> Self {
        ExchangeId::new("simulated")
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        ExchangeId::new(s)
    }
}

impl From<String> for ExchangeId {
    fn from(s: String) -> Self {
        ExchangeId::new(s)
    }
}

impl From<ExchangeId> for String {
    fn from(id: ExchangeId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_id_normalized() {
        let id = ExchangeId::new(" Binance ");
        assert_eq!(id.as_str(), "binance");
        assert_eq!(id, ExchangeId::from("BINANCE"));
        assert_eq!(id.to_string(), "binance");
    }
}
