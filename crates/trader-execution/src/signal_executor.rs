//! 시그널 실행기.
//!
//! 해석된 매매 의도를 거래소 진입 주문으로 바꾸고 원장에 등록합니다.
//!
//! # 실행 순서
//!
//! ```text
//! validate_signal → set_leverage → 잔고 기반 수량 계산
//!     → place_entry_order (시장가 + 손절 + TP1) → 원장 insert
//! ```
//!
//! 주문 제출이 실패하면 원장은 변경되지 않습니다.
//! 원장 저장 실패는 경고만 남기고 주문은 그대로 반환합니다.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tracing::{info, warn};
use trader_core::{
    parse, validate_signal, AssetBalance, EntryOrderRequest, ExchangeGateway, ManagedOrder,
    ProviderError, SignalError, TradingIntent,
};
use uuid::Uuid;

use crate::ledger::PositionLedger;

/// 증거금 자산 (실거래 USDT, 모의거래 VST).
const MARGIN_ASSETS: [&str; 2] = ["USDT", "VST"];

/// 주문 수량 소수 자릿수.
pub const QUANTITY_SCALE: u32 = 3;

/// 시그널 실행 에러.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error("레버리지 설정 실패: {0}")]
    Leverage(#[source] ProviderError),

    #[error("잔고 조회 실패: {0}")]
    Balance(#[source] ProviderError),

    #[error("USDT/VST 잔고를 찾을 수 없음")]
    MarginAssetNotFound,

    #[error("계산된 주문 수량이 0 (가용 잔고 {available}, 진입가 {entry})")]
    ZeroQuantity { available: Decimal, entry: Decimal },

    #[error("주문 제출 실패: {0}")]
    Placement(#[source] ProviderError),
}

/// 실행기 설정.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// 주문당 위험 비율 (%, 기본 1)
    pub risk_percentage: Decimal,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            risk_percentage: Decimal::ONE,
        }
    }
}

/// 위험 비율 기반 주문 수량.
///
/// `가용 잔고 × 위험% ÷ 진입가`를 소수 셋째 자리에서 반올림합니다.
pub fn calculate_quantity(available: Decimal, risk_percentage: Decimal, entry: Decimal) -> Decimal {
    if entry <= Decimal::ZERO || available <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let risk_amount = available * risk_percentage / Decimal::ONE_HUNDRED;
    (risk_amount / entry).round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// 증거금 자산 잔고 선택.
fn margin_balance(balances: &[AssetBalance]) -> Option<&AssetBalance> {
    balances
        .iter()
        .find(|b| MARGIN_ASSETS.contains(&b.asset.as_str()))
}

/// 시그널 실행기.
pub struct SignalExecutor {
    gateway: Arc<dyn ExchangeGateway>,
    ledger: Arc<PositionLedger>,
    config: ExecutorConfig,
}

impl SignalExecutor {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        ledger: Arc<PositionLedger>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            gateway,
            ledger,
            config,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn ExchangeGateway> {
        &self.gateway
    }

    /// 시그널 텍스트를 해석하고 실행합니다.
    pub async fn process_text(&self, text: &str) -> Result<ManagedOrder, ExecutionError> {
        let intent = parse(text).map_err(SignalError::from)?;
        self.execute(intent).await
    }

    /// 매매 의도를 실행합니다.
    pub async fn execute(&self, intent: TradingIntent) -> Result<ManagedOrder, ExecutionError> {
        validate_signal(&intent).map_err(SignalError::from)?;

        self.apply_leverage(&intent).await?;

        // 검증을 통과한 의도는 진입가를 하나 이상 가진다
        let entry = intent.effective_entry().unwrap_or_default();
        let quantity = self.size_position(entry).await?;

        let client_order_id = Uuid::new_v4().simple().to_string();
        let mut request = EntryOrderRequest::market(&intent.symbol, intent.direction, quantity)
            .with_stop(intent.stop_loss)
            .with_client_order_id(client_order_id.clone());
        if let Some(take_profit) = intent.take_profit() {
            request = request.with_take_profit(take_profit);
        }

        let result = self
            .gateway
            .place_entry_order(&request)
            .await
            .map_err(ExecutionError::Placement)?;

        let order_id = if result.has_order_id() {
            result.order_id
        } else {
            warn!(
                symbol = %intent.symbol,
                client_order_id = %client_order_id,
                "주문 ID 없는 응답, 클라이언트 주문 ID로 관리"
            );
            client_order_id.clone()
        };

        let order = ManagedOrder::new(order_id, Some(client_order_id), intent, quantity);
        if let Err(e) = self.ledger.insert(order.clone()).await {
            warn!(order_id = %order.order_id, error = %e, "원장 저장 실패, 내구성 저하");
        }

        info!(
            order_id = %order.order_id,
            symbol = order.symbol(),
            side = %order.side(),
            quantity = %order.quantity,
            leverage = order.intent.leverage,
            "진입 주문 실행 완료"
        );
        Ok(order)
    }

    async fn apply_leverage(&self, intent: &TradingIntent) -> Result<(), ExecutionError> {
        match self.gateway.set_leverage(&intent.symbol, intent.leverage).await {
            Ok(()) => Ok(()),
            Err(ProviderError::Unsupported(msg)) => {
                warn!(symbol = %intent.symbol, reason = %msg, "레버리지 설정 미지원, 계정 기본값 사용");
                Ok(())
            }
            Err(e) => Err(ExecutionError::Leverage(e)),
        }
    }

    async fn size_position(&self, entry: Decimal) -> Result<Decimal, ExecutionError> {
        let balances = self
            .gateway
            .account_balance()
            .await
            .map_err(ExecutionError::Balance)?;
        let available = margin_balance(&balances)
            .ok_or(ExecutionError::MarginAssetNotFound)?
            .available_balance;

        let quantity = calculate_quantity(available, self.config.risk_percentage, entry);
        if quantity.is_zero() {
            return Err(ExecutionError::ZeroQuantity { available, entry });
        }
        Ok(quantity)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn quantity_is_risk_share_of_balance_over_entry() {
        // 1000 × 1% ÷ 0.11477 = 87.13...
        assert_eq!(calculate_quantity(dec!(1000), dec!(1), dec!(0.11477)), dec!(87.131));
        assert_eq!(calculate_quantity(dec!(500), dec!(2), dec!(4)), dec!(2.5));
    }

    #[test]
    fn quantity_rounds_half_away_from_zero() {
        // 1 × 1% ÷ 0.8 = 0.0125
        assert_eq!(calculate_quantity(dec!(1), dec!(1), dec!(0.8)), dec!(0.013));
        assert_eq!(calculate_quantity(dec!(10), dec!(1), dec!(0.16)), dec!(0.625));
        assert_eq!(calculate_quantity(dec!(1), dec!(1), dec!(8)), dec!(0.001));
    }

    #[test]
    fn degenerate_inputs_size_to_zero() {
        assert!(calculate_quantity(dec!(0), dec!(1), dec!(1)).is_zero());
        assert!(calculate_quantity(dec!(100), dec!(1), dec!(0)).is_zero());
        assert!(calculate_quantity(dec!(0.01), dec!(1), dec!(100)).is_zero());
    }

    #[test]
    fn margin_asset_prefers_first_match() {
        let balances = vec![
            AssetBalance {
                asset: "BTC".to_string(),
                available_balance: dec!(1),
                equity: dec!(1),
                unrealized_pnl: dec!(0),
            },
            AssetBalance {
                asset: "VST".to_string(),
                available_balance: dec!(1000),
                equity: dec!(1000),
                unrealized_pnl: dec!(0),
            },
        ];
        assert_eq!(margin_balance(&balances).map(|b| b.asset.as_str()), Some("VST"));
        assert!(margin_balance(&balances[..1]).is_none());
    }
}
