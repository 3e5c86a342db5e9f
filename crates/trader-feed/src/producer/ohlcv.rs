//! 캔들 프로듀서.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use trader_core::{Kline, Symbol, Timeframe};
use trader_exchange::{ExchangeAdapter, ExchangeResult};

use super::Producer;
use crate::channel::{Channel, ChannelKind};

/// 한 번에 조회할 최대 캔들 수.
const FETCH_LIMIT: u32 = 50;

/// (심볼, 타임프레임)마다 새로 마감된 캔들을 발행합니다.
///
/// 첫 주기에는 가장 최근에 마감된 캔들 하나만 발행하고, 이후에는 마지막으로
/// 발행한 캔들보다 새로운 캔들만 오래된 것부터 발행합니다. 주기는 가장 짧은
/// 타임프레임의 다음 캔들 경계에 맞춰집니다.
pub struct OhlcvProducer {
    channel: Arc<Channel<Kline>>,
    adapter: Arc<dyn ExchangeAdapter>,
    pairs: Vec<Symbol>,
    timeframes: Vec<Timeframe>,
    grace: Duration,
    last_open: HashMap<(Symbol, Timeframe), DateTime<Utc>>,
}

impl OhlcvProducer {
    /// 새 캔들 프로듀서를 생성합니다.
    ///
    /// `grace`는 캔들 경계 이후 거래소가 마감 캔들을 반영할 때까지 기다리는 여유 시간입니다.
    pub fn new(
        channel: Arc<Channel<Kline>>,
        adapter: Arc<dyn ExchangeAdapter>,
        pairs: Vec<Symbol>,
        timeframes: Vec<Timeframe>,
        grace: Duration,
    ) -> Self {
        Self {
            channel,
            adapter,
            pairs,
            timeframes,
            grace,
            last_open: HashMap::new(),
        }
    }

    fn shortest_timeframe(&self) -> Timeframe {
        self.timeframes
            .iter()
            .copied()
            .min()
            .unwrap_or(trader_core::MIN_EVAL_TIMEFRAME)
    }

    /// 마지막 발행 이후의 새 캔들만 남깁니다.
    fn select_new(&self, symbol: &Symbol, timeframe: Timeframe, klines: Vec<Kline>) -> Vec<Kline> {
        match self.last_open.get(&(symbol.clone(), timeframe)) {
            Some(last) => klines.into_iter().filter(|k| k.open_time > *last).collect(),
            None => klines.into_iter().last().into_iter().collect(),
        }
    }
}

#[async_trait]
impl Producer for OhlcvProducer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Ohlcv
    }

    async fn produce(&mut self) -> ExchangeResult<usize> {
        let mut published = 0;

        for symbol in self.pairs.clone() {
            for timeframe in self.timeframes.clone() {
                let klines = match self
                    .adapter
                    .get_klines(&symbol, timeframe, Some(FETCH_LIMIT))
                    .await
                {
                    Ok(klines) => klines,
                    Err(e) => {
                        warn!(symbol = %symbol, timeframe = %timeframe, error = %e, "캔들 조회 실패");
                        continue;
                    }
                };

                let fresh = self.select_new(&symbol, timeframe, klines);
                if let Some(latest) = fresh.last() {
                    self.last_open
                        .insert((symbol.clone(), timeframe), latest.open_time);
                }
                for kline in fresh {
                    debug!(symbol = %symbol, timeframe = %timeframe, open_time = %kline.open_time, "새 캔들");
                    self.channel.publish(kline);
                    published += 1;
                }
            }
        }

        Ok(published)
    }

    fn next_delay(&self) -> Duration {
        self.shortest_timeframe().until_next_boundary(Utc::now()) + self.grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use trader_core::{ExchangeId, SimulatorConfig};
    use trader_exchange::SimulatedExchange;

    fn btc() -> Symbol {
        Symbol::crypto("BTC", "USDT")
    }

    async fn exchange() -> Arc<SimulatedExchange> {
        let config = SimulatorConfig {
            enabled: true,
            symbols: vec![btc()],
            time_frames: vec![Timeframe::M1, Timeframe::M5],
            history_len: 20,
            seed: 11,
            ..Default::default()
        };
        let exchange = SimulatedExchange::new(&config)
            .with_start_time(Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap());
        exchange.initialize().await.unwrap();
        Arc::new(exchange)
    }

    #[tokio::test]
    async fn test_first_cycle_publishes_latest_only() {
        let exchange = exchange().await;
        let channel = Arc::new(Channel::new(ExchangeId::simulated(), 64));
        let mut sub = channel.subscribe();
        let mut producer = OhlcvProducer::new(
            channel.clone(),
            exchange.clone(),
            vec![btc()],
            vec![Timeframe::M1, Timeframe::M5],
            Duration::ZERO,
        );

        assert_eq!(producer.produce().await.unwrap(), 2);
        let first = sub.try_recv().unwrap();
        assert_eq!(first.timeframe, Timeframe::M1);
        assert_eq!(first.close_time, Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap());
        assert_eq!(sub.try_recv().unwrap().timeframe, Timeframe::M5);

        // 새 캔들이 없으면 아무것도 발행하지 않는다
        assert_eq!(producer.produce().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_publishes_each_new_candle_once() {
        let exchange = exchange().await;
        let channel = Arc::new(Channel::new(ExchangeId::simulated(), 64));
        let mut producer = OhlcvProducer::new(
            channel.clone(),
            exchange.clone(),
            vec![btc()],
            vec![Timeframe::M1],
            Duration::ZERO,
        );
        producer.produce().await.unwrap();
        let mut sub = channel.subscribe();

        exchange.step().await.unwrap();
        exchange.step().await.unwrap();
        exchange.step().await.unwrap();

        assert_eq!(producer.produce().await.unwrap(), 3);
        let times: Vec<_> = std::iter::from_fn(|| sub.try_recv())
            .map(|k| k.open_time)
            .collect();
        assert_eq!(
            times,
            vec![
                Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 4, 12, 1, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 4, 12, 2, 0).unwrap(),
            ]
        );
        assert_eq!(producer.produce().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_next_delay_within_shortest_period() {
        let exchange = exchange().await;
        let producer = OhlcvProducer::new(
            Arc::new(Channel::new(ExchangeId::simulated(), 4)),
            exchange,
            vec![btc()],
            vec![Timeframe::H1, Timeframe::M5],
            Duration::from_millis(500),
        );
        let delay = producer.next_delay();
        assert!(delay > Duration::from_millis(500));
        assert!(delay <= Duration::from_secs(300) + Duration::from_millis(500));
    }
}
