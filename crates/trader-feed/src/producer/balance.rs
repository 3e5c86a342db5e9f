//! 잔고 프로듀서.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use trader_exchange::{Balance, ExchangeAdapter, ExchangeResult};

use super::Producer;
use crate::channel::{BalanceSnapshot, Channel, ChannelKind};

/// 계좌 잔고를 조회해 바뀌었을 때만 스냅샷을 발행합니다.
///
/// 첫 조회 결과는 항상 발행합니다.
pub struct BalanceProducer {
    channel: Arc<Channel<BalanceSnapshot>>,
    adapter: Arc<dyn ExchangeAdapter>,
    interval: Duration,
    last: Option<Vec<Balance>>,
}

impl BalanceProducer {
    /// 새 잔고 프로듀서를 생성합니다.
    pub fn new(
        channel: Arc<Channel<BalanceSnapshot>>,
        adapter: Arc<dyn ExchangeAdapter>,
        interval: Duration,
    ) -> Self {
        Self {
            channel,
            adapter,
            interval,
            last: None,
        }
    }
}

#[async_trait]
impl Producer for BalanceProducer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Balance
    }

    async fn produce(&mut self) -> ExchangeResult<usize> {
        let mut balances = self.adapter.get_balances().await?;
        balances.sort_by(|a, b| a.asset.cmp(&b.asset));

        if self.last.as_ref() == Some(&balances) {
            return Ok(0);
        }

        self.last = Some(balances.clone());
        self.channel.publish(BalanceSnapshot {
            balances,
            timestamp: Utc::now(),
        });
        Ok(1)
    }

    fn next_delay(&self) -> Duration {
        self.interval
    }
}
