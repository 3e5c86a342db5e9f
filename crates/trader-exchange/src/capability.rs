//! 거래소가 보고하는 심볼/타임프레임 지원 정보.

use std::collections::{BTreeSet, HashMap};
use trader_core::{Symbol, Timeframe};

/// 거래소 심볼 유니버스와 타임프레임 지원 정보.
///
/// 타임프레임은 거래소 전역 목록과 심볼별 목록을 함께 가질 수 있습니다.
/// 전역 목록이 비어 있으면 심볼별 목록을 사용합니다 (백테스팅 데이터 등).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolCapability {
    /// 거래소가 보고한 순서를 유지하는 심볼 목록 (중복 없음)
    symbols: Vec<Symbol>,
    /// 전역 지원 타임프레임
    timeframes: Vec<Timeframe>,
    /// 심볼별 지원 타임프레임
    symbol_timeframes: HashMap<Symbol, Vec<Timeframe>>,
}

impl SymbolCapability {
    /// 심볼 목록과 전역 타임프레임으로 생성합니다.
    pub fn new(symbols: impl IntoIterator<Item = Symbol>, timeframes: impl IntoIterator<Item = Timeframe>) -> Self {
        let mut capability = Self::default();
        for symbol in symbols {
            capability.push_symbol(symbol);
        }
        for timeframe in timeframes {
            if !capability.timeframes.contains(&timeframe) {
                capability.timeframes.push(timeframe);
            }
        }
        capability
    }

    /// 심볼별 타임프레임을 추가합니다. 심볼이 유니버스에 없으면 함께 추가됩니다.
    pub fn with_symbol_timeframes(
        mut self,
        symbol: Symbol,
        timeframes: impl IntoIterator<Item = Timeframe>,
    ) -> Self {
        self.push_symbol(symbol.clone());
        let entry = self.symbol_timeframes.entry(symbol).or_default();
        for timeframe in timeframes {
            if !entry.contains(&timeframe) {
                entry.push(timeframe);
            }
        }
        self
    }

    fn push_symbol(&mut self, symbol: Symbol) {
        if !self.symbols.contains(&symbol) {
            self.symbols.push(symbol);
        }
    }

    /// 심볼 유니버스.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// 심볼이 유니버스에 있는지 확인합니다.
    pub fn symbol_exists(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }

    /// 주어진 호가 통화로 거래되는 심볼을 보고 순서대로 반환합니다.
    pub fn symbols_quoted_in<'a>(&'a self, quote: &'a str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.symbols.iter().filter(move |s| s.is_quoted_in(quote))
    }

    /// 타임프레임 지원 여부.
    ///
    /// 전역 목록이 있으면 전역 목록을 따르고, 없으면 심볼별 목록을 확인합니다.
    /// 심볼이 주어지지 않으면 어느 심볼이라도 지원하는지 확인합니다.
    pub fn timeframe_exists(&self, timeframe: Timeframe, symbol: Option<&Symbol>) -> bool {
        if !self.timeframes.is_empty() {
            return self.timeframes.contains(&timeframe);
        }
        match symbol {
            Some(symbol) => self
                .symbol_timeframes
                .get(symbol)
                .is_some_and(|tfs| tfs.contains(&timeframe)),
            None => self
                .symbol_timeframes
                .values()
                .any(|tfs| tfs.contains(&timeframe)),
        }
    }

    /// 지원하는 타임프레임 전체 (기간 오름차순).
    pub fn supported_timeframes(&self) -> Vec<Timeframe> {
        let set: BTreeSet<Timeframe> = if self.timeframes.is_empty() {
            self.symbol_timeframes.values().flatten().copied().collect()
        } else {
            self.timeframes.iter().copied().collect()
        };
        set.into_iter().collect()
    }

    /// 보고된 정보가 전혀 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.timeframes.is_empty() && self.symbol_timeframes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe() -> SymbolCapability {
        SymbolCapability::new(
            vec![
                Symbol::crypto("BTC", "USD"),
                Symbol::crypto("BTC", "EUR"),
                Symbol::crypto("ETH", "USD"),
                Symbol::crypto("BTC", "USD"),
            ],
            vec![Timeframe::H1, Timeframe::M1],
        )
    }

    #[test]
    fn test_symbols_are_unique_and_ordered() {
        let capability = universe();
        assert_eq!(capability.symbols().len(), 3);
        assert_eq!(capability.symbols()[1], Symbol::crypto("BTC", "EUR"));
    }

    #[test]
    fn test_symbols_quoted_in() {
        let capability = universe();
        let usd: Vec<_> = capability.symbols_quoted_in("USD").cloned().collect();
        assert_eq!(usd, vec![Symbol::crypto("BTC", "USD"), Symbol::crypto("ETH", "USD")]);
    }

    #[test]
    fn test_global_timeframes_take_precedence() {
        let btc = Symbol::crypto("BTC", "USD");
        let capability = universe().with_symbol_timeframes(btc.clone(), vec![Timeframe::D1]);
        assert!(capability.timeframe_exists(Timeframe::H1, Some(&btc)));
        assert!(!capability.timeframe_exists(Timeframe::D1, Some(&btc)));
    }

    #[test]
    fn test_per_symbol_fallback() {
        let btc = Symbol::crypto("BTC", "USD");
        let eth = Symbol::crypto("ETH", "USD");
        let capability = SymbolCapability::default()
            .with_symbol_timeframes(btc.clone(), vec![Timeframe::M5, Timeframe::H1])
            .with_symbol_timeframes(eth.clone(), vec![Timeframe::D1]);

        assert!(capability.timeframe_exists(Timeframe::M5, Some(&btc)));
        assert!(!capability.timeframe_exists(Timeframe::M5, Some(&eth)));
        assert!(capability.timeframe_exists(Timeframe::D1, None));
        assert_eq!(
            capability.supported_timeframes(),
            vec![Timeframe::M5, Timeframe::H1, Timeframe::D1]
        );
        assert!(capability.symbol_exists(&eth));
    }

    #[test]
    fn test_empty() {
        assert!(SymbolCapability::default().is_empty());
        assert!(!universe().is_empty());
    }
}
