//! 거래 페어 및 타임프레임 해석.
//!
//! 설정과 거래소 지원 정보로부터 실제로 사용할 수 있는 페어와 타임프레임을
//! 계산합니다. 입력에 대해 순수 함수이므로 몇 번을 호출해도 같은 결과를
//! 반환합니다.

use std::fmt;
use tracing::warn;
use trader_core::{
    find_min_timeframe, sort_timeframes_descending, CryptoCurrencyConfig, FeedConfig,
    PairSelection, Symbol, Timeframe,
};
use trader_exchange::SymbolCapability;

use crate::error::{FeedError, FeedResult};

/// 해석 중 발생한 비치명적 경고.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionWarning {
    /// 설정된 페어가 없어 자산을 사용할 수 없음
    NoPairsConfigured { currency: String },
    /// 거래소가 지원하지 않는 페어 (제외됨)
    UnsupportedPair { currency: String, pair: Symbol },
    /// 설정된 페어를 거래소가 하나도 지원하지 않음
    NoSupportedPairs { currency: String },
    /// 거래소가 지원하지 않는 타임프레임 (제외됨)
    UnsupportedTimeframe { timeframe: Timeframe },
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionWarning::NoPairsConfigured { currency } => {
                write!(f, "{}: 설정된 페어가 없어 사용할 수 없습니다", currency)
            }
            ResolutionWarning::UnsupportedPair { currency, pair } => {
                write!(f, "{}: 거래소가 {} 페어를 지원하지 않습니다", currency, pair)
            }
            ResolutionWarning::NoSupportedPairs { currency } => {
                write!(f, "{}: 거래소가 설정된 페어를 하나도 지원하지 않습니다", currency)
            }
            ResolutionWarning::UnsupportedTimeframe { timeframe } => {
                write!(f, "거래소가 {} 타임프레임을 지원하지 않습니다", timeframe)
            }
        }
    }
}

/// 해석 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// 설정 순서대로 이어 붙인 전체 거래 페어
    pub traded_pairs: Vec<Symbol>,
    /// 암호화폐별 해석된 페어 (설정 순서)
    pub per_currency: Vec<(String, Vec<Symbol>)>,
    /// 기간 내림차순 타임프레임
    pub timeframes: Vec<Timeframe>,
    /// 실시간 평가용 최소 타임프레임
    pub min_timeframe: Timeframe,
    /// 비치명적 경고
    pub warnings: Vec<ResolutionWarning>,
}

impl Resolution {
    /// 암호화폐 이름으로 해석된 페어를 찾습니다.
    pub fn pairs_for(&self, currency: &str) -> Option<&[Symbol]> {
        self.per_currency
            .iter()
            .find(|(name, _)| name == currency)
            .map(|(_, pairs)| pairs.as_slice())
    }
}

/// 설정과 지원 정보로 페어와 타임프레임을 해석합니다.
///
/// 지원 정보가 없거나 비어 있으면 [`FeedError::CapabilityLoad`]를 반환합니다.
/// 경고는 `warn!`으로 기록되고 결과에도 담깁니다.
pub fn resolve(
    exchange: &str,
    config: &FeedConfig,
    capability: Option<&SymbolCapability>,
) -> FeedResult<Resolution> {
    let capability = match capability {
        Some(capability) if !capability.is_empty() => capability,
        Some(_) => {
            return Err(FeedError::CapabilityLoad {
                exchange: exchange.to_string(),
                reason: "거래소가 심볼/타임프레임 정보를 보고하지 않았습니다".to_string(),
            })
        }
        None => {
            return Err(FeedError::CapabilityLoad {
                exchange: exchange.to_string(),
                reason: "거래소 지원 정보를 사용할 수 없습니다".to_string(),
            })
        }
    };

    let mut warnings = Vec::new();
    let mut traded_pairs = Vec::new();
    let mut per_currency = Vec::new();

    for currency in config.enabled_crypto_currencies() {
        let pairs = resolve_currency_pairs(currency, capability, &mut warnings);
        traded_pairs.extend(pairs.iter().cloned());
        per_currency.push((currency.name.clone(), pairs));
    }

    let (timeframes, min_timeframe) = resolve_timeframes(
        &config.time_frames,
        config.min_eval_time_frame,
        capability,
        &mut warnings,
    );

    for warning in &warnings {
        warn!(exchange, "{}", warning);
    }

    Ok(Resolution {
        traded_pairs,
        per_currency,
        timeframes,
        min_timeframe,
        warnings,
    })
}

/// 한 암호화폐의 페어 선택을 해석합니다.
pub fn resolve_currency_pairs(
    currency: &CryptoCurrencyConfig,
    capability: &SymbolCapability,
    warnings: &mut Vec<ResolutionWarning>,
) -> Vec<Symbol> {
    let resolved: Vec<Symbol> = match &currency.pairs {
        PairSelection::Explicit(pairs) if pairs.is_empty() => {
            warnings.push(ResolutionWarning::NoPairsConfigured {
                currency: currency.name.clone(),
            });
            return Vec::new();
        }
        PairSelection::Explicit(pairs) => pairs
            .iter()
            .filter(|pair| {
                let supported = capability.symbol_exists(pair);
                if !supported {
                    warnings.push(ResolutionWarning::UnsupportedPair {
                        currency: currency.name.clone(),
                        pair: (*pair).clone(),
                    });
                }
                supported
            })
            .cloned()
            .collect(),
        PairSelection::Wildcard { quote, additional } => {
            let mut pairs: Vec<Symbol> = capability.symbols_quoted_in(quote).cloned().collect();
            for pair in additional {
                if !capability.symbol_exists(pair) {
                    warnings.push(ResolutionWarning::UnsupportedPair {
                        currency: currency.name.clone(),
                        pair: pair.clone(),
                    });
                } else if !pairs.contains(pair) {
                    pairs.push(pair.clone());
                }
            }
            pairs
        }
    };

    if resolved.is_empty() {
        warnings.push(ResolutionWarning::NoSupportedPairs {
            currency: currency.name.clone(),
        });
    }
    resolved
}

/// 타임프레임을 해석합니다.
///
/// 지원되는 설정 타임프레임에 최소 평가 타임프레임을 항상 포함시키고
/// 기간 내림차순으로 정렬합니다. 최소 평가 타임프레임도 함께 반환합니다.
pub fn resolve_timeframes(
    configured: &[Timeframe],
    min_eval: Timeframe,
    capability: &SymbolCapability,
    warnings: &mut Vec<ResolutionWarning>,
) -> (Vec<Timeframe>, Timeframe) {
    let mut timeframes = Vec::with_capacity(configured.len() + 1);
    for timeframe in configured {
        if !capability.timeframe_exists(*timeframe, None) {
            warnings.push(ResolutionWarning::UnsupportedTimeframe {
                timeframe: *timeframe,
            });
        } else if !timeframes.contains(timeframe) {
            timeframes.push(*timeframe);
        }
    }

    let min_timeframe = find_min_timeframe(&capability.supported_timeframes(), min_eval);
    if !timeframes.contains(&min_timeframe) {
        timeframes.push(min_timeframe);
    }

    sort_timeframes_descending(&mut timeframes);
    (timeframes, min_timeframe)
}
