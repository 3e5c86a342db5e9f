//! 데이터 종류별 프로듀서와 실행기.
//!
//! 프로듀서는 하나의 채널과 어댑터 핸들만 가지고, 주기마다 거래소에서
//! 최신 상태를 가져와 채널에 발행합니다. 조회 실패는 기록만 하고 다음
//! 주기로 넘어가므로 프로듀서를 멈추지 않습니다.
//!
//! 각 프로듀서는 별도 태스크에서 실행되어 서로의 주기나 지연에 영향을
//! 주지 않습니다. 중지는 `CancellationToken`으로 협조적으로 이루어지며,
//! 태스크가 끝난 뒤에는 더 이상 발행하지 않습니다.

mod balance;
mod ohlcv;
mod order_book;
mod orders;
mod recent_trades;
mod ticker;

pub use balance::BalanceProducer;
pub use ohlcv::OhlcvProducer;
pub use order_book::OrderBookProducer;
pub use orders::OrdersProducer;
pub use recent_trades::RecentTradesProducer;
pub use ticker::TickerProducer;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use trader_core::{exchange_span, ExchangeId};
use trader_exchange::ExchangeResult;

use crate::channel::ChannelKind;

/// 프로듀서 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    /// 생성됨 (아직 실행 전)
    Created,
    /// 실행 중
    Running,
    /// 중지됨
    Stopped,
}

impl fmt::Display for ProducerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerState::Created => write!(f, "created"),
            ProducerState::Running => write!(f, "running"),
            ProducerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// 한 데이터 종류의 프로듀서.
#[async_trait]
pub trait Producer: Send + 'static {
    /// 발행 대상 채널 종류.
    fn kind(&self) -> ChannelKind;

    /// 한 주기를 수행합니다. 발행한 값의 개수를 반환합니다.
    ///
    /// 심볼 단위 실패는 내부에서 기록하고 건너뜁니다. 주기 전체가
    /// 실패하면 에러를 반환하며, 실행기가 기록한 뒤 다음 주기로 넘어갑니다.
    async fn produce(&mut self) -> ExchangeResult<usize>;

    /// 다음 주기까지 대기할 시간.
    fn next_delay(&self) -> Duration;
}

/// 실행 중인 프로듀서 핸들.
pub struct ProducerHandle {
    kind: ChannelKind,
    state: watch::Receiver<ProducerState>,
    task: JoinHandle<()>,
    joined: bool,
}

impl ProducerHandle {
    /// 채널 종류.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// 현재 상태.
    pub fn state(&self) -> ProducerState {
        *self.state.borrow()
    }

    /// 상태 변경을 구독합니다.
    pub fn watch_state(&self) -> watch::Receiver<ProducerState> {
        self.state.clone()
    }
}

/// 프로듀서를 태스크로 실행합니다.
pub fn spawn_producer<P: Producer>(
    producer: P,
    exchange: ExchangeId,
    cancel: CancellationToken,
) -> ProducerHandle {
    let kind = producer.kind();
    let (state_tx, state_rx) = watch::channel(ProducerState::Created);
    let span = exchange_span!("producer", exchange, kind);
    let task = tokio::spawn(run_producer(producer, cancel, state_tx).instrument(span));

    ProducerHandle {
        kind,
        state: state_rx,
        task,
        joined: false,
    }
}

async fn run_producer<P: Producer>(
    mut producer: P,
    cancel: CancellationToken,
    state: watch::Sender<ProducerState>,
) {
    state.send_replace(ProducerState::Running);
    info!("프로듀서 시작");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = producer.produce() => match result {
                Ok(published) => debug!(published, "프로듀서 주기 완료"),
                Err(e) => warn!(error = %e, retryable = e.is_retryable(), "프로듀서 조회 실패, 다음 주기에 재시도"),
            },
        }

        let delay = producer.next_delay();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    state.send_replace(ProducerState::Stopped);
    info!("프로듀서 중지");
}

/// 한 거래소의 프로듀서 묶음.
///
/// 드롭되면 모든 프로듀서에 중지 신호를 보냅니다.
pub struct ProducerSet {
    cancel: CancellationToken,
    handles: Vec<ProducerHandle>,
}

impl ProducerSet {
    /// 상위 토큰의 자식 토큰으로 빈 묶음을 생성합니다.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            cancel: parent.child_token(),
            handles: Vec::new(),
        }
    }

    /// 프로듀서를 실행하고 묶음에 추가합니다.
    pub fn spawn<P: Producer>(&mut self, producer: P, exchange: &ExchangeId) {
        let handle = spawn_producer(producer, exchange.clone(), self.cancel.clone());
        self.handles.push(handle);
    }

    /// 프로듀서 수.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 프로듀서별 상태.
    pub fn states(&self) -> Vec<(ChannelKind, ProducerState)> {
        self.handles.iter().map(|h| (h.kind(), h.state())).collect()
    }

    /// 프로듀서 핸들.
    pub fn handles(&self) -> &[ProducerHandle] {
        &self.handles
    }

    /// 모든 프로듀서를 중지하고 종료를 기다립니다.
    pub async fn stop_all(&mut self) {
        self.cancel.cancel();
        for handle in self.handles.iter_mut().filter(|h| !h.joined) {
            handle.joined = true;
            if let Err(e) = (&mut handle.task).await {
                warn!(channel = %handle.kind, error = %e, "프로듀서 태스크 비정상 종료");
            }
        }
    }
}

impl Drop for ProducerSet {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
