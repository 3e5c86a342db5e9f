//! 핵심 에러 타입.
//!
//! 설정 로드/검증 및 입력 파싱에서 사용하는 에러를 정의합니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum TraderError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type TraderResult<T> = Result<T, TraderError>;

impl From<config::ConfigError> for TraderError {
    fn from(err: config::ConfigError) -> Self {
        TraderError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TraderError::Config("missing quote".to_string());
        assert_eq!(err.to_string(), "설정 에러: missing quote");
    }
}
