//! 호가창 프로듀서.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use trader_core::{OrderBook, Symbol};
use trader_exchange::{ExchangeAdapter, ExchangeResult};

use super::Producer;
use crate::channel::{Channel, ChannelKind};

/// 거래 페어별 호가창을 짧은 고정 주기로 발행합니다.
pub struct OrderBookProducer {
    channel: Arc<Channel<OrderBook>>,
    adapter: Arc<dyn ExchangeAdapter>,
    pairs: Vec<Symbol>,
    depth: u32,
    interval: Duration,
}

impl OrderBookProducer {
    /// 새 호가창 프로듀서를 생성합니다.
    pub fn new(
        channel: Arc<Channel<OrderBook>>,
        adapter: Arc<dyn ExchangeAdapter>,
        pairs: Vec<Symbol>,
        depth: u32,
        interval: Duration,
    ) -> Self {
        Self {
            channel,
            adapter,
            pairs,
            depth,
            interval,
        }
    }
}

#[async_trait]
impl Producer for OrderBookProducer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::OrderBook
    }

    async fn produce(&mut self) -> ExchangeResult<usize> {
        let mut published = 0;
        for symbol in &self.pairs {
            match self.adapter.get_order_book(symbol, Some(self.depth)).await {
                Ok(book) => {
                    self.channel.publish(book);
                    published += 1;
                }
                Err(e) => warn!(symbol = %symbol, error = %e, "호가창 조회 실패"),
            }
        }
        Ok(published)
    }

    fn next_delay(&self) -> Duration {
        self.interval
    }
}
