//! 시그널 트레이딩 봇 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 봇 실행 (표준 입력으로 시그널 수신, 빈 줄로 구분)
//! trader run
//!
//! # 실제 주문 없이 Mock 거래소로 실행
//! trader run --dry-run
//!
//! # 조정 루프를 정지 상태로 시작 (/start 로 재개)
//! trader run --paused
//!
//! # 시그널 해석 결과만 확인
//! trader parse signal.txt
//!
//! # 관리 중인 주문과 포지션 현황
//! trader report --json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use config::BotConfig;

#[derive(Parser)]
#[command(name = "trader")]
#[command(about = "Signal trading bot - BingX 무기한 선물 시그널 자동 매매", long_about = None)]
#[command(version)]
struct Cli {
    /// 로그 레벨 (RUST_LOG가 설정되면 무시)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 봇 실행: 시그널 수신 + 포지션 조정 루프
    Run {
        /// Mock 거래소 사용 (실제 주문 없음)
        #[arg(long)]
        dry_run: bool,

        /// 조정 루프를 정지 상태로 시작
        #[arg(long)]
        paused: bool,
    },

    /// 시그널 텍스트 해석 (파일 경로가 없으면 표준 입력)
    Parse {
        path: Option<PathBuf>,
    },

    /// 관리 중인 주문과 거래소 포지션 현황
    Report {
        /// JSON 형식으로 출력
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (없어도 에러 안남)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // stdout은 사용자 출력용, 로그는 stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "trader={0},trader_execution={0},trader_exchange={0}",
                cli.log_level
            )
            .into()
        }))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run { dry_run, paused } => {
            let config = BotConfig::from_env()?;
            commands::run::run_bot(config, dry_run, paused).await
        }
        Commands::Parse { path } => commands::parse::parse_signal(path).await,
        Commands::Report { json } => {
            let config = BotConfig::from_env()?;
            commands::report::print_report(config, json).await
        }
    }
}
