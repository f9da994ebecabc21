//! 상태 보고서.
//!
//! 원장과 거래소 포지션의 읽기 전용 스냅샷입니다. 어떤 상태도 변경하지 않습니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use trader_core::{ExchangeGateway, ManagedOrder, Position};

use crate::ledger::PositionLedger;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    /// 봇이 관리 중인 주문
    pub managed_orders: Vec<ManagedOrder>,
    /// 거래소에 열려 있는 포지션
    pub positions: Vec<Position>,
    /// 포지션 조회 실패 사유
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions_error: Option<String>,
}

impl StatusReport {
    /// 원장 스냅샷과 거래소 포지션을 모읍니다.
    ///
    /// 포지션 조회가 실패해도 원장 내용은 보고합니다.
    pub async fn collect(ledger: &PositionLedger, gateway: &dyn ExchangeGateway) -> Self {
        let managed_orders = ledger.snapshot().await;
        let (positions, positions_error) = match gateway.open_positions(None).await {
            Ok(positions) => (positions, None),
            Err(e) => {
                warn!(error = %e, "보고서용 포지션 조회 실패");
                (Vec::new(), Some(e.to_string()))
            }
        };

        Self {
            generated_at: Utc::now(),
            managed_orders,
            positions,
            positions_error,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📊 상태 보고서 ({})", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f)?;

        if self.managed_orders.is_empty() {
            writeln!(f, "--- 관리 중인 주문 없음 ---")?;
        } else {
            writeln!(f, "--- 관리 중인 주문 ({}) ---", self.managed_orders.len())?;
            for order in &self.managed_orders {
                let intent = &order.intent;
                writeln!(f, "주문 ID: {}", order.order_id)?;
                writeln!(f, "  심볼: {} {}", intent.symbol, intent.direction)?;
                if let Some(entry) = intent.effective_entry() {
                    writeln!(f, "  진입: {}", entry)?;
                }
                if let Some(tp) = intent.take_profit() {
                    writeln!(f, "  TP1: {}", tp)?;
                }
                writeln!(f, "  SL: {}", intent.stop_loss)?;
                writeln!(f, "  수량: {} ({}X)", order.quantity, intent.leverage)?;
                match order.trailing_stop.stop_price() {
                    Some(stop) => writeln!(f, "  트레일링 스탑: 활성 ({})", stop)?,
                    None => writeln!(f, "  트레일링 스탑: 비활성")?,
                }
            }
        }
        writeln!(f)?;

        if let Some(error) = &self.positions_error {
            return writeln!(f, "--- 포지션 조회 실패: {} ---", error);
        }
        if self.positions.is_empty() {
            return writeln!(f, "--- 열린 포지션 없음 ---");
        }

        writeln!(f, "--- 거래소 포지션 ({}) ---", self.positions.len())?;
        for position in &self.positions {
            writeln!(f, "{} {:?}", position.symbol, position.side)?;
            writeln!(f, "  수량: {}", position.quantity)?;
            writeln!(f, "  평균가: {}", position.avg_price)?;
            if let Some(liquidation) = position.liquidation_price {
                writeln!(f, "  청산가: {}", liquidation)?;
            }
            writeln!(f, "  미실현 손익: {}", position.unrealized_pnl)?;
        }
        Ok(())
    }
}
