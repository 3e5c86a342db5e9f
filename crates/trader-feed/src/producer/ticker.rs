//! 시세 프로듀서.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use trader_core::{Symbol, Ticker};
use trader_exchange::{ExchangeAdapter, ExchangeResult};

use super::Producer;
use crate::channel::{Channel, ChannelKind};

/// 거래 페어별 시세를 짧은 고정 주기로 발행합니다.
pub struct TickerProducer {
    channel: Arc<Channel<Ticker>>,
    adapter: Arc<dyn ExchangeAdapter>,
    pairs: Vec<Symbol>,
    interval: Duration,
}

impl TickerProducer {
    /// 새 시세 프로듀서를 생성합니다.
    pub fn new(
        channel: Arc<Channel<Ticker>>,
        adapter: Arc<dyn ExchangeAdapter>,
        pairs: Vec<Symbol>,
        interval: Duration,
    ) -> Self {
        Self {
            channel,
            adapter,
            pairs,
            interval,
        }
    }
}

#[async_trait]
impl Producer for TickerProducer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Ticker
    }

    async fn produce(&mut self) -> ExchangeResult<usize> {
        let mut published = 0;
        for symbol in &self.pairs {
            match self.adapter.get_ticker(symbol).await {
                Ok(ticker) => {
                    self.channel.publish(ticker);
                    published += 1;
                }
                Err(e) => warn!(
                    symbol = %symbol,
                    error = %e,
                    unsupported = e.is_symbol_error(),
                    "시세 조회 실패"
                ),
            }
        }
        Ok(published)
    }

    fn next_delay(&self) -> Duration {
        self.interval
    }
}
