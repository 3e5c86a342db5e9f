//! 설정 관리.
//!
//! 시장 데이터 배포 계층이 읽는 설정을 정의합니다. 설정은 TOML 파일에서
//! 로드되며 `TRADER__` 접두사 환경 변수로 덮어쓸 수 있습니다.
//!
//! ```toml
//! time_frames = ["1h", "4h"]
//!
//! [trader]
//! enabled = true
//!
//! [exchanges.binance]
//! api_key = "..."
//! api_secret = "..."
//! web_socket = true
//!
//! [[crypto_currencies]]
//! name = "Bitcoin"
//! pairs = ["BTC/USDT"]
//!
//! [[crypto_currencies]]
//! name = "Ethereum"
//! pairs = "*"
//! quote = "USDT"
//! add = ["ETH/BTC"]
//! ```

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{TraderError, TraderResult};
use crate::types::{Symbol, Timeframe, MIN_EVAL_TIMEFRAME};

/// 모든 페어를 의미하는 와일드카드 표기.
pub const WILDCARD: &str = "*";

/// 시뮬레이션 거래소가 심볼/타임프레임별로 생성할 수 있는 최대 과거 캔들 수.
pub const MAX_SIMULATED_HISTORY: usize = 10_000;

/// 설정 파일에 남아 있는 기본 자리표시자 값들.
const PLACEHOLDER_CREDENTIALS: [&str; 4] = ["", "your-api-key-here", "your-api-secret-here", "NO KEY"];

/// 배포 계층 전체 설정.
#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 트레이더 설정
    #[serde(default)]
    pub trader: TraderConfig,
    /// 시뮬레이터 설정
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// 거래소별 설정 (키: 거래소 이름)
    #[serde(default)]
    pub exchanges: HashMap<String, ExchangeConfig>,
    /// 암호화폐별 페어 설정 (설정 순서 유지)
    #[serde(default)]
    pub crypto_currencies: Vec<CryptoCurrencyConfig>,
    /// 사용할 타임프레임 목록
    #[serde(default = "default_time_frames")]
    pub time_frames: Vec<Timeframe>,
    /// 실시간 평가용 최소 타임프레임
    #[serde(default = "default_min_eval_time_frame")]
    pub min_eval_time_frame: Timeframe,
    /// 프로듀서 주기 및 채널 설정
    #[serde(default)]
    pub producers: ProducerConfig,
}

fn default_time_frames() -> Vec<Timeframe> {
    vec![Timeframe::H1, Timeframe::H4, Timeframe::D1]
}

fn default_min_eval_time_frame() -> Timeframe {
    MIN_EVAL_TIMEFRAME
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            trader: TraderConfig::default(),
            simulator: SimulatorConfig::default(),
            exchanges: HashMap::new(),
            crypto_currencies: Vec::new(),
            time_frames: default_time_frames(),
            min_eval_time_frame: default_min_eval_time_frame(),
            producers: ProducerConfig::default(),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// 트레이더 설정.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraderConfig {
    /// 실거래 트레이더 활성화 여부 (사용자 데이터 스트림 필요)
    #[serde(default)]
    pub enabled: bool,
}

/// 시뮬레이터(모의투자/백테스팅) 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    /// 시뮬레이션 모드로 실행할지 여부
    #[serde(default)]
    pub enabled: bool,
    /// 시뮬레이션 거래소가 제공하는 심볼
    #[serde(default = "default_simulated_symbols")]
    pub symbols: Vec<Symbol>,
    /// 시뮬레이션 거래소가 제공하는 타임프레임
    #[serde(default = "default_simulated_time_frames")]
    pub time_frames: Vec<Timeframe>,
    /// 자산별 초기 잔고
    #[serde(default = "default_initial_balances")]
    pub initial_balances: HashMap<String, Decimal>,
    /// 생성 캔들의 시작 가격
    #[serde(default = "default_start_price")]
    pub start_price: Decimal,
    /// 생성 캔들의 변동성 (0.02 = 2%)
    #[serde(default = "default_volatility")]
    pub volatility: Decimal,
    /// 심볼/타임프레임별 생성할 과거 캔들 수
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    /// 캔들 생성 난수 시드
    #[serde(default)]
    pub seed: u64,
    /// 요청 간 최소 간격 (밀리초)
    #[serde(default = "default_simulated_rate_limit")]
    pub rate_limit_ms: u64,
}

fn default_simulated_symbols() -> Vec<Symbol> {
    vec![Symbol::crypto("BTC", "USDT"), Symbol::crypto("ETH", "USDT")]
}

fn default_simulated_time_frames() -> Vec<Timeframe> {
    vec![Timeframe::M1, Timeframe::M5, Timeframe::H1, Timeframe::H4, Timeframe::D1]
}

fn default_initial_balances() -> HashMap<String, Decimal> {
    HashMap::from([("USDT".to_string(), dec!(10000))])
}

fn default_start_price() -> Decimal {
    dec!(100)
}

fn default_volatility() -> Decimal {
    dec!(0.02)
}

fn default_history_len() -> usize {
    200
}

fn default_simulated_rate_limit() -> u64 {
    0
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            symbols: default_simulated_symbols(),
            time_frames: default_simulated_time_frames(),
            initial_balances: default_initial_balances(),
            start_price: default_start_price(),
            volatility: default_volatility(),
            history_len: default_history_len(),
            seed: 0,
            rate_limit_ms: default_simulated_rate_limit(),
        }
    }
}

/// 거래소 설정.
#[derive(Debug, Default, Deserialize)]
pub struct ExchangeConfig {
    /// API 키
    #[serde(default)]
    pub api_key: Option<String>,
    /// API 시크릿
    #[serde(default)]
    pub api_secret: Option<SecretString>,
    /// WebSocket 사용 여부 (명시적으로 false면 비활성화)
    #[serde(default)]
    pub web_socket: Option<bool>,
}

impl ExchangeConfig {
    /// 키와 시크릿이 모두 설정되어 있고 자리표시자가 아닌지 확인합니다.
    pub fn has_credentials(&self) -> bool {
        let key_ok = self
            .api_key
            .as_deref()
            .is_some_and(|key| !PLACEHOLDER_CREDENTIALS.contains(&key.trim()));
        let secret_ok = self
            .api_secret
            .as_ref()
            .is_some_and(|secret| !PLACEHOLDER_CREDENTIALS.contains(&secret.expose_secret().trim()));
        key_ok && secret_ok
    }

    /// WebSocket이 설정에서 명시적으로 비활성화되었는지 확인합니다.
    pub fn websocket_force_disabled(&self) -> bool {
        self.web_socket == Some(false)
    }
}

/// 암호화폐 한 종의 페어 선택 방식.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairSelection {
    /// 명시적으로 나열된 페어
    Explicit(Vec<Symbol>),
    /// 주어진 호가 통화로 거래되는 모든 페어 + 추가 페어
    Wildcard {
        /// 호가 통화
        quote: String,
        /// 추가로 포함할 페어
        additional: Vec<Symbol>,
    },
}

/// 암호화폐별 설정.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCryptoCurrency")]
pub struct CryptoCurrencyConfig {
    /// 암호화폐 이름 (예: "Bitcoin")
    pub name: String,
    /// 활성화 여부
    pub enabled: bool,
    /// 페어 선택
    pub pairs: PairSelection,
}

impl CryptoCurrencyConfig {
    /// 명시적 페어 목록으로 설정을 생성합니다.
    pub fn explicit(name: impl Into<String>, pairs: Vec<Symbol>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            pairs: PairSelection::Explicit(pairs),
        }
    }

    /// 와일드카드 페어 선택으로 설정을 생성합니다.
    pub fn wildcard(name: impl Into<String>, quote: impl Into<String>, additional: Vec<Symbol>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            pairs: PairSelection::Wildcard {
                quote: quote.into().trim().to_uppercase(),
                additional,
            },
        }
    }
}

/// 설정 파일의 원시 형태. `pairs`는 "*" 또는 목록입니다.
#[derive(Debug, Deserialize)]
struct RawCryptoCurrency {
    name: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    pairs: RawPairs,
    #[serde(default)]
    quote: Option<String>,
    #[serde(default)]
    add: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPairs {
    Marker(String),
    List(Vec<String>),
}

impl Default for RawPairs {
    fn default() -> Self {
        RawPairs::List(Vec::new())
    }
}

fn parse_pairs(name: &str, pairs: &[String]) -> TraderResult<Vec<Symbol>> {
    pairs
        .iter()
        .map(|pair| {
            pair.parse::<Symbol>().map_err(|_| {
                TraderError::Config(format!("{}: 잘못된 페어 형식 '{}'", name, pair))
            })
        })
        .collect()
}

impl TryFrom<RawCryptoCurrency> for CryptoCurrencyConfig {
    type Error = TraderError;

    fn try_from(raw: RawCryptoCurrency) -> Result<Self, Self::Error> {
        let pairs = match raw.pairs {
            RawPairs::Marker(marker) if marker.trim() == WILDCARD => {
                let quote = raw
                    .quote
                    .map(|q| q.trim().to_uppercase())
                    .filter(|q| !q.is_empty())
                    .ok_or_else(|| {
                        TraderError::Config(format!(
                            "{}: 와일드카드 페어에는 quote 통화가 필요합니다",
                            raw.name
                        ))
                    })?;
                PairSelection::Wildcard {
                    quote,
                    additional: parse_pairs(&raw.name, &raw.add)?,
                }
            }
            RawPairs::Marker(other) => {
                return Err(TraderError::Config(format!(
                    "{}: pairs는 \"*\" 또는 목록이어야 합니다 (입력: '{}')",
                    raw.name, other
                )))
            }
            RawPairs::List(list) => PairSelection::Explicit(parse_pairs(&raw.name, &list)?),
        };

        Ok(Self {
            name: raw.name,
            enabled: raw.enabled,
            pairs,
        })
    }
}

/// 프로듀서 주기 및 채널 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerConfig {
    /// 시세 조회 주기 (밀리초)
    #[serde(default = "default_ticker_interval")]
    pub ticker_interval_ms: u64,
    /// 호가창 조회 주기 (밀리초)
    #[serde(default = "default_order_book_interval")]
    pub order_book_interval_ms: u64,
    /// 최근 체결 조회 주기 (밀리초)
    #[serde(default = "default_recent_trades_interval")]
    pub recent_trades_interval_ms: u64,
    /// 잔고 조회 주기 (밀리초)
    #[serde(default = "default_balance_interval")]
    pub balance_interval_ms: u64,
    /// 미체결 주문 조회 주기 (밀리초)
    #[serde(default = "default_orders_interval")]
    pub orders_interval_ms: u64,
    /// 캔들 경계 이후 조회까지의 여유 시간 (밀리초)
    #[serde(default = "default_ohlcv_grace")]
    pub ohlcv_grace_ms: u64,
    /// 호가창 조회 깊이
    #[serde(default = "default_order_book_depth")]
    pub order_book_depth: u32,
    /// 최근 체결 조회 개수
    #[serde(default = "default_recent_trades_limit")]
    pub recent_trades_limit: u32,
    /// 채널별 구독자 버퍼 크기
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_ticker_interval() -> u64 {
    5_000
}

fn default_order_book_interval() -> u64 {
    5_000
}

fn default_recent_trades_interval() -> u64 {
    10_000
}

fn default_balance_interval() -> u64 {
    30_000
}

fn default_orders_interval() -> u64 {
    10_000
}

fn default_ohlcv_grace() -> u64 {
    500
}

fn default_order_book_depth() -> u32 {
    20
}

fn default_recent_trades_limit() -> u32 {
    50
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            ticker_interval_ms: default_ticker_interval(),
            order_book_interval_ms: default_order_book_interval(),
            recent_trades_interval_ms: default_recent_trades_interval(),
            balance_interval_ms: default_balance_interval(),
            orders_interval_ms: default_orders_interval(),
            ohlcv_grace_ms: default_ohlcv_grace(),
            order_book_depth: default_order_book_depth(),
            recent_trades_limit: default_recent_trades_limit(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl ProducerConfig {
    /// 시세 조회 주기.
    pub fn ticker_interval(&self) -> Duration {
        Duration::from_millis(self.ticker_interval_ms)
    }

    /// 호가창 조회 주기.
    pub fn order_book_interval(&self) -> Duration {
        Duration::from_millis(self.order_book_interval_ms)
    }

    /// 최근 체결 조회 주기.
    pub fn recent_trades_interval(&self) -> Duration {
        Duration::from_millis(self.recent_trades_interval_ms)
    }

    /// 잔고 조회 주기.
    pub fn balance_interval(&self) -> Duration {
        Duration::from_millis(self.balance_interval_ms)
    }

    /// 미체결 주문 조회 주기.
    pub fn orders_interval(&self) -> Duration {
        Duration::from_millis(self.orders_interval_ms)
    }

    /// 캔들 경계 이후 여유 시간.
    pub fn ohlcv_grace(&self) -> Duration {
        Duration::from_millis(self.ohlcv_grace_ms)
    }
}

impl FeedConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> TraderResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("TRADER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 로드합니다.
    pub fn from_toml_str(s: &str) -> TraderResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 값의 일관성을 검증합니다.
    pub fn validate(&self) -> TraderResult<()> {
        if self.producers.channel_capacity == 0 {
            return Err(TraderError::Config(
                "producers.channel_capacity는 0보다 커야 합니다".to_string(),
            ));
        }

        if self.simulator.history_len > MAX_SIMULATED_HISTORY {
            return Err(TraderError::Config(format!(
                "simulator.history_len은 {} 이하여야 합니다 (현재 {})",
                MAX_SIMULATED_HISTORY, self.simulator.history_len
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for currency in &self.crypto_currencies {
            if !seen.insert(currency.name.as_str()) {
                return Err(TraderError::Config(format!(
                    "암호화폐 '{}' 설정이 중복되었습니다",
                    currency.name
                )));
            }
        }

        Ok(())
    }

    /// 거래소 설정을 조회합니다 (대소문자 무시).
    pub fn exchange(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, config)| config)
    }

    /// 활성화된 암호화폐 설정을 설정 순서대로 반환합니다.
    pub fn enabled_crypto_currencies(&self) -> impl Iterator<Item = &CryptoCurrencyConfig> {
        self.crypto_currencies.iter().filter(|c| c.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        time_frames = ["1h", "4h"]

        [trader]
        enabled = true

        [exchanges.binance]
        api_key = "key"
        api_secret = "secret"

        [exchanges.kraken]
        web_socket = false

        [[crypto_currencies]]
        name = "Bitcoin"
        pairs = ["BTC/USDT", "BTC/EUR"]

        [[crypto_currencies]]
        name = "Ethereum"
        pairs = "*"
        quote = "usdt"
        add = ["ETH/BTC"]

        [[crypto_currencies]]
        name = "Ripple"
        enabled = false
    "#;

    #[test]
    fn test_load_from_toml() {
        let config = FeedConfig::from_toml_str(SAMPLE).unwrap();

        assert!(config.trader.enabled);
        assert_eq!(config.time_frames, vec![Timeframe::H1, Timeframe::H4]);
        assert_eq!(config.min_eval_time_frame, Timeframe::M1);
        assert_eq!(config.crypto_currencies.len(), 3);

        let btc = &config.crypto_currencies[0];
        assert_eq!(btc.name, "Bitcoin");
        assert_eq!(
            btc.pairs,
            PairSelection::Explicit(vec![Symbol::crypto("BTC", "USDT"), Symbol::crypto("BTC", "EUR")])
        );

        let eth = &config.crypto_currencies[1];
        assert_eq!(
            eth.pairs,
            PairSelection::Wildcard {
                quote: "USDT".to_string(),
                additional: vec![Symbol::crypto("ETH", "BTC")],
            }
        );

        let xrp = &config.crypto_currencies[2];
        assert!(!xrp.enabled);
        assert_eq!(xrp.pairs, PairSelection::Explicit(vec![]));
        assert_eq!(config.enabled_crypto_currencies().count(), 2);
    }

    #[test]
    fn test_exchange_credentials() {
        let config = FeedConfig::from_toml_str(SAMPLE).unwrap();

        let binance = config.exchange("Binance").unwrap();
        assert!(binance.has_credentials());
        assert!(!binance.websocket_force_disabled());

        let kraken = config.exchange("kraken").unwrap();
        assert!(!kraken.has_credentials());
        assert!(kraken.websocket_force_disabled());

        assert!(config.exchange("bitfinex").is_none());
    }

    #[test]
    fn test_placeholder_credentials_rejected() {
        let config = ExchangeConfig {
            api_key: Some("your-api-key-here".to_string()),
            api_secret: Some(SecretString::from("secret")),
            web_socket: None,
        };
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_wildcard_without_quote_is_error() {
        let toml = r#"
            [[crypto_currencies]]
            name = "Bitcoin"
            pairs = "*"
        "#;
        assert!(FeedConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_malformed_pair_is_error() {
        let toml = r#"
            [[crypto_currencies]]
            name = "Bitcoin"
            pairs = ["BTCUSDT"]
        "#;
        assert!(FeedConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_history_len_is_bounded() {
        let toml = r#"
            [simulator]
            history_len = 10000000000
        "#;
        assert!(FeedConfig::from_toml_str(toml).is_err());

        let toml = r#"
            [simulator]
            history_len = 10000
        "#;
        assert!(FeedConfig::from_toml_str(toml).is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = FeedConfig::from_toml_str("").unwrap();
        assert!(!config.simulator.enabled);
        assert_eq!(config.producers.channel_capacity, 1024);
        assert_eq!(config.producers.ticker_interval(), Duration::from_secs(5));
        assert!(config.crypto_currencies.is_empty());
    }
}
