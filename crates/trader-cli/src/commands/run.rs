//! 봇 실행 커맨드.
//!
//! # 아키텍처
//!
//! ```text
//! stdin ──(빈 줄 단위)──> SignalExecutor ──> ExchangeGateway
//!                              │
//!                              ▼
//!                       PositionLedger <── ReconciliationEngine (주기 실행)
//! ```
//!
//! 시그널은 빈 줄로 구분된 텍스트 블록입니다. `/`로 시작하는 줄은 제어 명령입니다.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use trader_execution::{
    ExecutorConfig, PositionLedger, ReconcilerConfig, ReconciliationEngine, SignalExecutor,
    StatusReport, TrailingStopController,
};

use super::build_gateway;
use crate::config::BotConfig;

const HELP: &str = "명령어:
  /start    조정 루프 시작
  /stop     조정 루프 정지
  /report   관리 주문 및 포지션 현황
  /balance  계정 잔고
  /status   미체결 주문
  /help     도움말
시그널 텍스트는 빈 줄로 끝내면 처리됩니다.";

/// 실행 중 공유 컴포넌트
struct Bot {
    executor: SignalExecutor,
    engine: Arc<ReconciliationEngine>,
}

pub async fn run_bot(config: BotConfig, dry_run: bool, paused: bool) -> anyhow::Result<()> {
    info!(config = ?config, dry_run, paused, "봇 시작");

    let ledger = Arc::new(
        PositionLedger::load(&config.ledger_path)
            .await
            .with_context(|| format!("원장 로드 실패: {}", config.ledger_path.display()))?,
    );
    info!(
        path = ?ledger.snapshot_path(),
        orders = ledger.len().await,
        "원장 로드 완료"
    );

    let gateway = build_gateway(&config, dry_run).await?;

    let executor = SignalExecutor::new(
        gateway.clone(),
        ledger.clone(),
        ExecutorConfig {
            risk_percentage: config.risk_percentage,
        },
    );
    let engine = Arc::new(ReconciliationEngine::new(
        gateway,
        ledger,
        TrailingStopController::new(config.trailing_offset()),
        ReconcilerConfig {
            poll_interval: config.poll_interval(),
            history_lookback: config.history_lookback,
        },
    ));
    if !paused {
        engine.start();
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let loop_handle = {
        let engine = engine.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { engine.run(shutdown_rx).await })
    };

    let bot = Bot { executor, engine };
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut buffer: Vec<String> = Vec::new();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("종료 신호 수신");
                break;
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            bot.flush_signal(&mut buffer).await;
                        } else if trimmed.starts_with('/') && buffer.is_empty() {
                            bot.handle_command(trimmed).await;
                        } else {
                            buffer.push(line);
                        }
                    }
                    Ok(None) => {
                        bot.flush_signal(&mut buffer).await;
                        info!("표준 입력 종료, Ctrl+C 로 봇 종료");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "표준 입력 읽기 실패");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    shutdown_tx.send(()).ok();
    loop_handle.await.ok();
    info!("봇 종료");
    Ok(())
}

impl Bot {
    /// 누적된 시그널 블록 처리.
    async fn flush_signal(&self, buffer: &mut Vec<String>) {
        if buffer.is_empty() {
            return;
        }
        let text = buffer.join("\n");
        buffer.clear();

        match self.executor.process_text(&text).await {
            Ok(order) => println!(
                "✅ 주문 접수: {} {} {} (주문 ID {})",
                order.symbol(),
                order.side(),
                order.quantity,
                order.order_id
            ),
            Err(e) => println!("❌ 시그널 처리 실패: {}", e),
        }
    }

    async fn handle_command(&self, command: &str) {
        let gateway = self.executor.gateway();
        match command {
            "/start" => {
                if self.engine.start() {
                    println!("▶️ 조정 루프 시작");
                } else {
                    println!("이미 실행 중입니다");
                }
            }
            "/stop" => {
                if self.engine.stop() {
                    println!("⏸️ 조정 루프 정지");
                } else {
                    println!("이미 정지 상태입니다");
                }
            }
            "/report" => {
                let report = StatusReport::collect(self.engine.ledger(), gateway.as_ref()).await;
                println!("{}", report);
            }
            "/balance" => match gateway.account_balance().await {
                Ok(balances) => {
                    for b in balances {
                        println!(
                            "{}: 가용 {} / 평가 {} (미실현 {})",
                            b.asset, b.available_balance, b.equity, b.unrealized_pnl
                        );
                    }
                }
                Err(e) => println!("❌ 잔고 조회 실패: {}", e),
            },
            "/status" => match gateway.open_orders(None).await {
                Ok(orders) if orders.is_empty() => println!("미체결 주문 없음"),
                Ok(orders) => {
                    for o in orders {
                        println!(
                            "{} {} {} {} @ {} [{}] (주문 ID {})",
                            o.symbol,
                            o.side,
                            o.order_type,
                            o.quantity,
                            o.price.map(|p| p.to_string()).unwrap_or_else(|| "시장가".to_string()),
                            o.status,
                            o.order_id
                        );
                    }
                }
                Err(e) => println!("❌ 미체결 주문 조회 실패: {}", e),
            },
            "/help" => println!("{}", HELP),
            other => println!("알 수 없는 명령어: {} (/help 참고)", other),
        }
    }
}
