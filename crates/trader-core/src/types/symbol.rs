//! 심볼 및 시장 유형 정의.
//!
//! 이 모듈은 트레이딩 심볼 관련 타입을 정의합니다:
//! - `MarketType` - 시장 유형 (암호화폐, 선물 등)
//! - `Symbol` - 거래 가능한 페어를 나타내는 심볼 ("BASE/QUOTE")

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TraderError;

/// 시장 유형 분류.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    /// 암호화폐 현물 시장
    #[default]
    Crypto,
    /// 선물/파생상품 시장
    Futures,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Crypto => write!(f, "crypto"),
            MarketType::Futures => write!(f, "futures"),
        }
    }
}

/// 거래 가능한 페어를 나타내는 트레이딩 심볼.
///
/// 심볼은 기준 자산, 호가 자산, 시장 유형으로 구성됩니다.
/// 예: BTC/USDT 의 기준 자산은 BTC, 호가 자산은 USDT.
///
/// 거래소 고유 표기(예: "BTCUSDT")는 심볼에 포함하지 않습니다.
/// 고유 표기가 필요하면 어댑터의 마켓 상태 조회를 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    /// 기준 자산 (예: BTC, ETH)
    pub base: String,
    /// 호가 자산 (예: USDT, USD)
    pub quote: String,
    /// 시장 유형
    pub market_type: MarketType,
}

impl Symbol {
    /// 새 심볼을 생성합니다.
    pub fn new(base: impl Into<String>, quote: impl Into<String>, market_type: MarketType) -> Self {
        Self {
            base: base.into().trim().to_uppercase(),
            quote: quote.into().trim().to_uppercase(),
            market_type,
        }
    }

    /// 암호화폐 현물 심볼을 생성합니다.
    pub fn crypto(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self::new(base, quote, MarketType::Crypto)
    }

    /// "BASE/QUOTE" 형식 문자열에서 심볼을 파싱합니다.
    pub fn from_string(s: &str, market_type: MarketType) -> Option<Self> {
        let (base, quote) = split_symbol(s)?;
        Some(Self::new(base, quote, market_type))
    }

    /// 호가 자산이 주어진 통화와 같은지 확인합니다 (대소문자 무시).
    pub fn is_quoted_in(&self, currency: &str) -> bool {
        self.quote.eq_ignore_ascii_case(currency.trim())
    }

    /// 표준 심볼 문자열 형식을 반환합니다.
    pub fn to_standard_string(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

/// "BASE/QUOTE" 문자열을 기준/호가 자산으로 분리합니다.
///
/// 두 부분 중 하나라도 비어 있으면 `None`을 반환합니다.
pub fn split_symbol(s: &str) -> Option<(&str, &str)> {
    let (base, quote) = s.split_once('/')?;
    let (base, quote) = (base.trim(), quote.trim());
    if base.is_empty() || quote.is_empty() || quote.contains('/') {
        return None;
    }
    Some((base, quote))
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Symbol {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s, MarketType::Crypto)
            .ok_or_else(|| TraderError::InvalidInput(format!("Invalid symbol: {}", s)))
    }
}

impl TryFrom<String> for Symbol {
    type Error = TraderError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_standard_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_creation() {
        let symbol = Symbol::crypto("btc", "usdt");
        assert_eq!(symbol.base, "BTC");
        assert_eq!(symbol.quote, "USDT");
        assert_eq!(symbol.market_type, MarketType::Crypto);
    }

    #[test]
    fn test_symbol_display() {
        let symbol = Symbol::crypto("BTC", "USDT");
        assert_eq!(symbol.to_string(), "BTC/USDT");
    }

    #[test]
    fn test_symbol_from_str() {
        let symbol: Symbol = "eth/usd".parse().unwrap();
        assert_eq!(symbol, Symbol::crypto("ETH", "USD"));
        assert!("ETHUSD".parse::<Symbol>().is_err());
        assert!("ETH/".parse::<Symbol>().is_err());
        assert!("A/B/C".parse::<Symbol>().is_err());
    }

    #[test]
    fn test_is_quoted_in() {
        let symbol = Symbol::crypto("BTC", "USD");
        assert!(symbol.is_quoted_in("usd"));
        assert!(!symbol.is_quoted_in("EUR"));
    }

    #[test]
    fn test_symbol_ordering() {
        let mut symbols = vec![
            Symbol::new("ETH", "USD", MarketType::Crypto),
            Symbol::new("BTC", "USD", MarketType::Futures),
            Symbol::new("BTC", "USD", MarketType::Crypto),
        ];
        symbols.sort();
        assert_eq!(
            symbols,
            vec![
                Symbol::new("BTC", "USD", MarketType::Crypto),
                Symbol::new("BTC", "USD", MarketType::Futures),
                Symbol::new("ETH", "USD", MarketType::Crypto),
            ]
        );
        assert!(MarketType::Crypto < MarketType::Futures);
    }

    #[test]
    fn test_symbol_serde_as_string() {
        let symbol = Symbol::crypto("BTC", "USDT");
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"BTC/USDT\"");
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, symbol);
    }
}
