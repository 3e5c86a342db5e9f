//! CLI 명령어 구현 모듈.

pub mod feed;
pub mod pairs;

use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;
use trader_core::FeedConfig;

/// 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// 사람이 읽기 쉬운 한 줄 요약
    #[default]
    Text,
    /// 한 줄에 JSON 객체 하나
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("지원하지 않는 출력 형식: {} (text, json)", other),
        }
    }
}

/// 설정 파일을 로드합니다.
///
/// 파일이 없으면 기본값과 `TRADER__*` 환경 변수만 사용합니다.
/// `simulated`가 참이면 시뮬레이션 모드를 강제합니다.
pub fn load_config(path: &str, simulated: bool) -> Result<FeedConfig> {
    let mut config = if Path::new(path).exists() {
        FeedConfig::load(path).with_context(|| format!("설정 파일 로드 실패: {}", path))?
    } else {
        warn!(path, "설정 파일이 없어 기본 설정을 사용합니다");
        FeedConfig::default()
    };

    if simulated {
        config.simulator.enabled = true;
    }
    Ok(config)
}

/// 실행할 거래소 이름을 결정합니다.
///
/// 지정하지 않으면 시뮬레이션 모드는 "simulated", 라이브 모드는 설정의
/// 첫 번째 거래소(이름순)를 사용합니다.
pub fn select_exchange(config: &FeedConfig, requested: Option<String>) -> Result<String> {
    if let Some(name) = requested {
        return Ok(name);
    }
    if config.simulator.enabled {
        return Ok("simulated".to_string());
    }

    let mut names: Vec<&String> = config.exchanges.keys().collect();
    names.sort();
    names
        .first()
        .map(|name| name.to_string())
        .context("설정에 거래소가 없습니다. --exchange 또는 --simulated를 지정하세요")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_select_exchange() {
        let mut config = FeedConfig::default();
        assert!(select_exchange(&config, None).is_err());
        assert_eq!(
            select_exchange(&config, Some("kraken".to_string())).unwrap(),
            "kraken"
        );

        config.simulator.enabled = true;
        assert_eq!(select_exchange(&config, None).unwrap(), "simulated");
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = load_config("does/not/exist.toml", true).unwrap();
        assert!(config.simulator.enabled);
        assert!(config.crypto_currencies.is_empty());
    }
}
