//! CLI 서브커맨드.

pub mod parse;
pub mod report;
pub mod run;

use std::sync::Arc;

use rust_decimal::Decimal;
use trader_core::ExchangeGateway;
use trader_exchange::{BingxClient, BingxGateway, MockGateway};

use crate::config::BotConfig;

/// `--dry-run` 시 Mock 거래소에 넣어 둘 모의 잔고 (VST)
const DRY_RUN_BALANCE: i64 = 10_000;

/// 설정에 맞는 게이트웨이 생성.
pub(crate) async fn build_gateway(
    config: &BotConfig,
    dry_run: bool,
) -> anyhow::Result<Arc<dyn ExchangeGateway>> {
    if dry_run {
        let mock = MockGateway::new();
        mock.set_balance("VST", Decimal::from(DRY_RUN_BALANCE)).await;
        return Ok(Arc::new(mock));
    }

    let client = BingxClient::new(config.bingx_config()?);
    Ok(Arc::new(BingxGateway::from_client(client)))
}
