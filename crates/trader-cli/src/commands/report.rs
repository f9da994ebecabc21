//! 현황 리포트 커맨드.

use anyhow::Context;
use trader_execution::{PositionLedger, StatusReport};

use super::build_gateway;
use crate::config::BotConfig;

pub async fn print_report(config: BotConfig, json: bool) -> anyhow::Result<()> {
    let ledger = PositionLedger::load(&config.ledger_path)
        .await
        .with_context(|| format!("원장 로드 실패: {}", config.ledger_path.display()))?;
    let gateway = build_gateway(&config, false).await?;

    let report = StatusReport::collect(&ledger, gateway.as_ref()).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}
