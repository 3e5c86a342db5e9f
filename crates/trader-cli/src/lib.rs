//! CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 시장 데이터 피드 실행 및 채널 출력
//! - 거래 페어/타임프레임 해석 결과 확인

pub mod commands;

pub use commands::*;
