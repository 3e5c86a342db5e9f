//! 시장 데이터 피드 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 시뮬레이션 거래소로 30초간 피드 실행
//! trader feed --simulated --duration 30
//!
//! # 설정 파일의 바이낸스 피드를 JSON으로 출력
//! trader feed -c config/feed.toml -e binance --format json
//!
//! # 자산별 거래 페어 해석 결과 확인
//! trader pairs -c config/feed.toml --simulated
//! ```

use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::error;

use trader_cli::commands::{feed, pairs, OutputFormat};

#[derive(Parser)]
#[command(name = "trader")]
#[command(about = "Market data feed CLI - 거래소 시장 데이터 배포", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 거래소 피드 실행 (모든 채널 구독 후 출력)
    Feed {
        /// 설정 파일
        #[arg(short, long, default_value = "config/feed.toml")]
        config: String,

        /// 거래소 이름 (기본: 설정의 첫 번째 거래소)
        #[arg(short, long)]
        exchange: Option<String>,

        /// 시뮬레이션 거래소 사용
        #[arg(long, default_value = "false")]
        simulated: bool,

        /// 스트리밍 없이 REST 폴링만 사용
        #[arg(long, default_value = "false")]
        rest_only: bool,

        /// 실행 시간 (초, 생략 시 Ctrl+C까지)
        #[arg(short, long)]
        duration: Option<u64>,

        /// 시뮬레이션 한 단계 간격 (밀리초)
        #[arg(long, default_value = "1000")]
        step_ms: u64,

        /// 로그 레벨 (설정 파일보다 우선)
        #[arg(long)]
        log_level: Option<String>,

        /// 출력 형식 (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// 자산별 거래 페어와 타임프레임 해석 결과 출력
    Pairs {
        /// 설정 파일
        #[arg(short, long, default_value = "config/feed.toml")]
        config: String,

        /// 거래소 이름 (기본: 설정의 첫 번째 거래소)
        #[arg(short, long)]
        exchange: Option<String>,

        /// 시뮬레이션 거래소 사용
        #[arg(long, default_value = "false")]
        simulated: bool,

        /// 출력 형식 (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Feed {
            config,
            exchange,
            simulated,
            rest_only,
            duration,
            step_ms,
            log_level,
            format,
        } => {
            let options = feed::FeedOptions {
                config_path: config,
                exchange,
                simulated,
                rest_only,
                duration: duration.map(Duration::from_secs),
                step_interval: Duration::from_millis(step_ms.max(1)),
                log_level,
                format: format.parse::<OutputFormat>()?,
            };
            feed::run(options).await
        }
        Commands::Pairs {
            config,
            exchange,
            simulated,
            format,
        } => pairs::run(&config, exchange, simulated, format.parse::<OutputFormat>()?).await,
    };

    if let Err(e) = &result {
        error!(error = %e, "명령 실행 실패");
    }
    result
}
