//! 최근 체결 프로듀서.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use trader_core::{Symbol, TradeTick};
use trader_exchange::{ExchangeAdapter, ExchangeResult};

use super::Producer;
use crate::channel::{Channel, ChannelKind, RecentTrades};

/// 심볼별로 마지막으로 발행한 체결 위치.
#[derive(Debug, Default)]
struct TradeMarker {
    timestamp: Option<DateTime<Utc>>,
    ids: HashSet<String>,
}

impl TradeMarker {
    fn is_new(&self, trade: &TradeTick) -> bool {
        match self.timestamp {
            None => true,
            Some(ts) if trade.timestamp > ts => true,
            Some(ts) => trade.timestamp == ts && !self.ids.contains(&trade.id),
        }
    }

    fn advance(&mut self, trades: &[TradeTick]) {
        for trade in trades {
            if self.timestamp.map_or(true, |ts| trade.timestamp > ts) {
                self.timestamp = Some(trade.timestamp);
                self.ids.clear();
            }
            if Some(trade.timestamp) == self.timestamp {
                self.ids.insert(trade.id.clone());
            }
        }
    }
}

/// 심볼별로 아직 발행하지 않은 체결만 묶어서 발행합니다.
pub struct RecentTradesProducer {
    channel: Arc<Channel<RecentTrades>>,
    adapter: Arc<dyn ExchangeAdapter>,
    pairs: Vec<Symbol>,
    limit: u32,
    interval: Duration,
    markers: HashMap<Symbol, TradeMarker>,
}

impl RecentTradesProducer {
    /// 새 최근 체결 프로듀서를 생성합니다.
    pub fn new(
        channel: Arc<Channel<RecentTrades>>,
        adapter: Arc<dyn ExchangeAdapter>,
        pairs: Vec<Symbol>,
        limit: u32,
        interval: Duration,
    ) -> Self {
        Self {
            channel,
            adapter,
            pairs,
            limit,
            interval,
            markers: HashMap::new(),
        }
    }
}

#[async_trait]
impl Producer for RecentTradesProducer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::RecentTrades
    }

    async fn produce(&mut self) -> ExchangeResult<usize> {
        let mut published = 0;

        for symbol in &self.pairs {
            let trades = match self.adapter.get_recent_trades(symbol, Some(self.limit)).await {
                Ok(trades) => trades,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "최근 체결 조회 실패");
                    continue;
                }
            };

            let marker = self.markers.entry(symbol.clone()).or_default();
            let fresh: Vec<TradeTick> = trades.into_iter().filter(|t| marker.is_new(t)).collect();
            if fresh.is_empty() {
                continue;
            }
            marker.advance(&fresh);

            self.channel.publish(RecentTrades {
                symbol: symbol.clone(),
                trades: fresh,
            });
            published += 1;
        }

        Ok(published)
    }

    fn next_delay(&self) -> Duration {
        self.interval
    }
}
