//! 시장 데이터 피드 실행 명령어.
//!
//! 거래소 매니저를 초기화하고 모든 채널을 구독하여 수신한 값을
//! 표준 출력으로 내보냅니다. Ctrl+C 또는 지정한 시간이 지나면 종료합니다.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use trader_core::{init_logging, Kline, LogConfig, OrderBook, Ticker};
use trader_exchange::{ExchangeAdapter, SimulatedExchange};
use trader_feed::{
    BalanceSnapshot, ChannelKind, ChannelPayload, ExchangeManager, OpenOrders, RecentTrades,
    Subscription,
};

use super::{load_config, select_exchange, OutputFormat};

/// 피드 실행 옵션.
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// 설정 파일 경로
    pub config_path: String,
    /// 거래소 이름
    pub exchange: Option<String>,
    /// 시뮬레이션 모드 강제
    pub simulated: bool,
    /// 스트리밍 연결 없이 REST 폴링만 사용
    pub rest_only: bool,
    /// 실행 시간 (None이면 Ctrl+C까지)
    pub duration: Option<Duration>,
    /// 시뮬레이션 한 단계 간격
    pub step_interval: Duration,
    /// 로그 레벨 (설정 파일보다 우선)
    pub log_level: Option<String>,
    /// 출력 형식
    pub format: OutputFormat,
}

/// 채널별 구독 묶음.
struct Subscriptions {
    tickers: Subscription<Ticker>,
    order_books: Subscription<OrderBook>,
    candles: Subscription<Kline>,
    trades: Subscription<RecentTrades>,
    balances: Subscription<BalanceSnapshot>,
    orders: Subscription<OpenOrders>,
}

impl Subscriptions {
    fn open(manager: &ExchangeManager) -> Result<Self> {
        Ok(Self {
            tickers: subscribe(manager)?,
            order_books: subscribe(manager)?,
            candles: subscribe(manager)?,
            trades: subscribe(manager)?,
            balances: subscribe(manager)?,
            orders: subscribe(manager)?,
        })
    }
}

fn subscribe<T: ChannelPayload>(manager: &ExchangeManager) -> Result<Subscription<T>> {
    manager
        .subscribe::<T>()
        .with_context(|| format!("{} 채널이 생성되지 않았습니다", T::KIND))
}

/// 피드를 실행합니다.
pub async fn run(options: FeedOptions) -> Result<()> {
    let mut config = load_config(&options.config_path, options.simulated)?;
    if let Some(level) = &options.log_level {
        config.logging.level = level.clone();
    }
    init_logging(LogConfig::from(&config.logging)).map_err(|e| anyhow!(e))?;

    let exchange = select_exchange(&config, options.exchange.clone())?;
    let config = Arc::new(config);

    let simulator = config.simulator.enabled.then(|| {
        Arc::new(SimulatedExchange::new(&config.simulator).with_id(exchange.as_str().into()))
    });

    let mut manager =
        ExchangeManager::new(config.clone(), exchange.as_str()).rest_only(options.rest_only);
    if let Some(simulator) = &simulator {
        let adapter: Arc<dyn ExchangeAdapter> = simulator.clone();
        manager = manager.with_adapter(adapter);
    }

    manager
        .initialize()
        .await
        .with_context(|| format!("거래소 매니저 초기화 실패: {}", exchange))?;

    if !manager.is_ready() {
        warn!(exchange = %exchange, "설정에서 활성화되지 않은 거래소입니다");
        return Ok(());
    }

    if let Some(resolution) = manager.resolution() {
        for warning in &resolution.warnings {
            warn!(%warning, "페어 해석 경고");
        }
        info!(
            pairs = resolution.traded_pairs.len(),
            time_frames = ?resolution.timeframes,
            "피드 시작"
        );
    }

    let result = stream_until_shutdown(
        &manager,
        simulator.as_deref(),
        &options,
        tokio::signal::ctrl_c(),
    )
    .await;

    manager.stop().await;
    info!("피드 종료");
    result
}

/// `shutdown`이 끝나거나 실행 시간이 지날 때까지 모든 채널 값을 출력합니다.
async fn stream_until_shutdown<F>(
    manager: &ExchangeManager,
    simulator: Option<&SimulatedExchange>,
    options: &FeedOptions,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let mut subs = Subscriptions::open(manager)?;
    let format = options.format;

    let deadline = async {
        match options.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline, shutdown);

    let mut step = tokio::time::interval(options.step_interval);
    step.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("종료 신호 수신");
                break;
            }
            _ = &mut deadline => break,
            _ = step.tick(), if simulator.is_some() => {
                if let Some(simulator) = simulator {
                    if let Err(e) = simulator.step().await {
                        warn!(error = %e, "시뮬레이션 단계 진행 실패");
                    }
                }
            }
            Some(ticker) = subs.tickers.recv() => emit(format, ChannelKind::Ticker, &ticker, || {
                format!(
                    "{} bid={} ask={} last={} spread={}",
                    ticker.symbol, ticker.bid, ticker.ask, ticker.last, ticker.spread()
                )
            })?,
            Some(book) = subs.order_books.recv() => emit(format, ChannelKind::OrderBook, &book, || {
                let (bids, asks) = book.depth();
                format!(
                    "{} best_bid={} best_ask={} depth={}/{}",
                    book.symbol, or_dash(book.best_bid()), or_dash(book.best_ask()), bids, asks
                )
            })?,
            Some(candle) = subs.candles.recv() => emit(format, ChannelKind::Ohlcv, &candle, || {
                format!(
                    "{} {} {} o={} h={} l={} c={} v={}",
                    candle.symbol, candle.timeframe, candle.open_time.format("%Y-%m-%d %H:%M"),
                    candle.open, candle.high, candle.low, candle.close, candle.volume
                )
            })?,
            Some(trades) = subs.trades.recv() => emit(format, ChannelKind::RecentTrades, &trades, || {
                format!("{} 신규 체결 {}건", trades.symbol, trades.trades.len())
            })?,
            Some(snapshot) = subs.balances.recv() => emit(format, ChannelKind::Balance, &snapshot, || {
                snapshot
                    .balances
                    .iter()
                    .map(|b| format!("{}={}/{}", b.asset, b.free, b.locked))
                    .collect::<Vec<_>>()
                    .join(" ")
            })?,
            Some(orders) = subs.orders.recv() => emit(format, ChannelKind::Orders, &orders, || {
                format!("{} 미체결 주문 {}건", orders.symbol, orders.orders.len())
            })?,
            else => break,
        }
    }

    Ok(())
}

/// 한 채널 값을 출력합니다.
fn emit<T: Serialize>(
    format: OutputFormat,
    kind: ChannelKind,
    value: &T,
    summary: impl FnOnce() -> String,
) -> Result<()> {
    match format {
        OutputFormat::Text => println!("[{:<13}] {}", kind.name(), summary()),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Line<'a, T> {
                channel: ChannelKind,
                data: &'a T,
            }
            println!("{}", serde_json::to_string(&Line { channel: kind, data: value })?);
        }
    }
    Ok(())
}

fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trader_core::FeedConfig;

    const SIMULATED: &str = r#"
        time_frames = ["1h"]

        [simulator]
        enabled = true
        symbols = ["BTC/USDT"]
        time_frames = ["1m", "1h"]
        history_len = 10

        [[crypto_currencies]]
        name = "Bitcoin"
        pairs = ["BTC/USDT"]
    "#;

    fn options(duration: Option<Duration>) -> FeedOptions {
        FeedOptions {
            config_path: String::new(),
            exchange: None,
            simulated: true,
            rest_only: true,
            duration,
            step_interval: Duration::from_secs(1),
            log_level: None,
            format: OutputFormat::Json,
        }
    }

    async fn simulated_manager() -> (ExchangeManager, Arc<SimulatedExchange>) {
        let config = Arc::new(FeedConfig::from_toml_str(SIMULATED).unwrap());
        let simulator = Arc::new(SimulatedExchange::new(&config.simulator));
        let adapter: Arc<dyn ExchangeAdapter> = simulator.clone();
        let mut manager = ExchangeManager::new(config, "simulated")
            .with_adapter(adapter)
            .rest_only(true);
        manager.initialize().await.unwrap();
        (manager, simulator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_signal_ends_stream() {
        let (mut manager, simulator) = simulated_manager().await;

        let shutdown = async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok::<(), std::io::Error>(())
        };
        stream_until_shutdown(&manager, Some(simulator.as_ref()), &options(None), shutdown)
            .await
            .unwrap();

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ends_stream_without_signal() {
        let (mut manager, simulator) = simulated_manager().await;
        let before = simulator.current_time().await.unwrap();

        stream_until_shutdown(
            &manager,
            Some(simulator.as_ref()),
            &options(Some(Duration::from_millis(2_500))),
            std::future::pending(),
        )
        .await
        .unwrap();

        // 실행 중에는 단계 간격마다 시뮬레이션이 진행된다
        assert!(simulator.current_time().await.unwrap() > before);
        manager.stop().await;
    }
}
