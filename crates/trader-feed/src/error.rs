//! 배포 계층 에러 타입.

use thiserror::Error;
use trader_core::TraderError;
use trader_exchange::ExchangeError;

/// 배포 계층 에러.
#[derive(Debug, Error)]
pub enum FeedError {
    /// 거래소 지원 정보를 로드할 수 없음 (초기화 중단)
    #[error("거래소 지원 정보 로드 실패 ({exchange}): {reason}")]
    CapabilityLoad { exchange: String, reason: String },

    /// 스트리밍 연결 초기화/시작 실패
    #[error("스트리밍 초기화 실패 ({exchange}): {source}")]
    StreamingInit {
        exchange: String,
        #[source]
        source: ExchangeError,
    },

    /// 심볼 변환 실패
    #[error("심볼 조회 실패: {symbol} ({reason})")]
    SymbolLookup { symbol: String, reason: String },

    /// 등록된 어댑터 없음
    #[error("등록된 거래소 어댑터 없음: {0}")]
    AdapterNotFound(String),

    /// 초기화 전 호출
    #[error("초기화되지 않음: {0}")]
    NotInitialized(String),

    /// 거래소 어댑터 에러
    #[error("거래소 에러: {0}")]
    Exchange(#[from] ExchangeError),

    /// 설정 에러
    #[error(transparent)]
    Config(#[from] TraderError),
}

/// 배포 계층 작업을 위한 Result 타입.
pub type FeedResult<T> = Result<T, FeedError>;

impl FeedError {
    /// 초기화 전체를 중단해야 하는 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FeedError::CapabilityLoad { .. }
                | FeedError::AdapterNotFound(_)
                | FeedError::Config(_)
        )
    }
}
