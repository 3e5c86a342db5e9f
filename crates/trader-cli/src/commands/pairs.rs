//! 거래 페어 해석 결과 출력 명령어.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use trader_core::{Symbol, Timeframe};
use trader_feed::{ExchangeManager, Resolution};

use super::{load_config, select_exchange, OutputFormat};

#[derive(Serialize)]
struct PairsReport<'a> {
    exchange: &'a str,
    mode: String,
    currencies: Vec<CurrencyPairs<'a>>,
    time_frames: &'a [Timeframe],
    min_time_frame: Timeframe,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct CurrencyPairs<'a> {
    name: &'a str,
    pairs: &'a [Symbol],
}

impl<'a> PairsReport<'a> {
    fn new(exchange: &'a str, mode: String, resolution: &'a Resolution) -> Self {
        Self {
            exchange,
            mode,
            currencies: resolution
                .per_currency
                .iter()
                .map(|(name, pairs)| CurrencyPairs {
                    name: name.as_str(),
                    pairs: pairs.as_slice(),
                })
                .collect(),
            time_frames: &resolution.timeframes,
            min_time_frame: resolution.min_timeframe,
            warnings: resolution.warnings.iter().map(|w| w.to_string()).collect(),
        }
    }

    fn print_text(&self) {
        println!("=== {} ({}) ===", self.exchange, self.mode);
        for currency in &self.currencies {
            let pairs = currency
                .pairs
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let pairs = if pairs.is_empty() { "-" } else { pairs.as_str() };
            println!("{:<12} {}", currency.name, pairs);
        }

        let time_frames = self
            .time_frames
            .iter()
            .map(|tf| tf.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("타임프레임: {} (최소 {})", time_frames, self.min_time_frame);

        if !self.warnings.is_empty() {
            println!();
            println!("경고:");
            for warning in &self.warnings {
                println!("  - {}", warning);
            }
        }
    }
}

/// 설정된 자산별 거래 페어와 타임프레임 해석 결과를 출력합니다.
///
/// 스트리밍 연결은 열지 않으며 출력 후 즉시 매니저를 중지합니다.
pub async fn run(
    config_path: &str,
    exchange: Option<String>,
    simulated: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = load_config(config_path, simulated)?;
    let exchange = select_exchange(&config, exchange)?;

    let mut manager = ExchangeManager::new(Arc::new(config), exchange.as_str()).rest_only(true);
    manager
        .initialize()
        .await
        .with_context(|| format!("거래소 매니저 초기화 실패: {}", exchange))?;

    let printed = match manager.resolution() {
        Some(resolution) => {
            let report = PairsReport::new(&exchange, manager.mode().to_string(), resolution);
            match format {
                OutputFormat::Text => report.print_text(),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            true
        }
        None => false,
    };

    manager.stop().await;

    if !printed {
        println!("{}: 설정에서 활성화되지 않은 거래소입니다", exchange);
    }
    Ok(())
}
