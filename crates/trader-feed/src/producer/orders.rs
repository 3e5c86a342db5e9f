//! 미체결 주문 프로듀서.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use trader_core::{OrderStatus, Symbol};
use trader_exchange::{ExchangeAdapter, ExchangeResult};

use super::Producer;
use crate::channel::{Channel, ChannelKind, OpenOrders};

/// 거래 페어별 미체결 주문 목록을 바뀌었을 때만 발행합니다.
///
/// 첫 조회 결과는 비어 있어도 발행합니다.
pub struct OrdersProducer {
    channel: Arc<Channel<OpenOrders>>,
    adapter: Arc<dyn ExchangeAdapter>,
    pairs: Vec<Symbol>,
    interval: Duration,
    last: HashMap<Symbol, Vec<OrderStatus>>,
}

impl OrdersProducer {
    /// 새 미체결 주문 프로듀서를 생성합니다.
    pub fn new(
        channel: Arc<Channel<OpenOrders>>,
        adapter: Arc<dyn ExchangeAdapter>,
        pairs: Vec<Symbol>,
        interval: Duration,
    ) -> Self {
        Self {
            channel,
            adapter,
            pairs,
            interval,
            last: HashMap::new(),
        }
    }
}

#[async_trait]
impl Producer for OrdersProducer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Orders
    }

    async fn produce(&mut self) -> ExchangeResult<usize> {
        let mut published = 0;

        for symbol in &self.pairs {
            let orders = match self.adapter.get_open_orders(Some(symbol)).await {
                Ok(orders) => orders,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "미체결 주문 조회 실패");
                    continue;
                }
            };

            if self.last.get(symbol) == Some(&orders) {
                continue;
            }
            self.last.insert(symbol.clone(), orders.clone());

            self.channel.publish(OpenOrders {
                symbol: symbol.clone(),
                orders,
            });
            published += 1;
        }

        Ok(published)
    }

    fn next_delay(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trader_core::{ExchangeId, Side, SimulatorConfig};
    use trader_exchange::SimulatedExchange;

    #[tokio::test]
    async fn test_order_changes_are_published() {
        let btc = Symbol::crypto("BTC", "USDT");
        let eth = Symbol::crypto("ETH", "USDT");
        let config = SimulatorConfig {
            enabled: true,
            symbols: vec![btc.clone(), eth.clone()],
            history_len: 10,
            ..Default::default()
        };
        let exchange = Arc::new(SimulatedExchange::new(&config));
        exchange.initialize().await.unwrap();

        let channel = Arc::new(Channel::new(ExchangeId::simulated(), 16));
        let mut sub = channel.subscribe();
        let mut producer = OrdersProducer::new(
            channel.clone(),
            exchange.clone(),
            vec![btc.clone(), eth.clone()],
            Duration::from_secs(10),
        );

        // 첫 주기는 빈 목록도 발행한다
        assert_eq!(producer.produce().await.unwrap(), 2);
        assert!(sub.try_recv().unwrap().orders.is_empty());
        assert!(sub.try_recv().unwrap().orders.is_empty());
        assert_eq!(producer.produce().await.unwrap(), 0);

        let order_id = exchange
            .place_limit_order(&eth, Side::Buy, dec!(1), dec!(2))
            .await
            .unwrap();
        assert_eq!(producer.produce().await.unwrap(), 1);
        let update = sub.try_recv().unwrap();
        assert_eq!(update.symbol, eth);
        assert_eq!(update.orders[0].order_id, order_id);

        exchange.cancel_order(&order_id).await.unwrap();
        assert_eq!(producer.produce().await.unwrap(), 1);
        assert!(sub.try_recv().unwrap().orders.is_empty());
    }
}
