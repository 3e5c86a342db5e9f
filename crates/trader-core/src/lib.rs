//! # Trader Core
//!
//! 시장 데이터 배포 시스템의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 거래소 연결, 채널, 프로듀서 전반에서 사용되는 기본 타입을 제공합니다:
//! - 심볼, 타임프레임, 거래소 식별자
//! - 시장 데이터 구조체 (캔들, 시세, 호가창, 체결)
//! - 미체결 주문 상태
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
