//! 봇이 관리 중인 주문과 트레일링 스탑 상태.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Side, TradingIntent};

/// 트레일링 스탑 상태.
///
/// 활성화 이후 `current_stop_price`는 포지션에 유리한 방향으로만 움직입니다
/// (BUY는 비감소, SELL은 비증가).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailingStopState {
    /// 활성화 여부
    pub is_active: bool,
    /// 현재 스탑 가격 (활성 상태에서만 의미 있음)
    pub current_stop_price: Decimal,
}

impl TrailingStopState {
    /// 활성 상태일 때만 스탑 가격 반환.
    pub fn stop_price(&self) -> Option<Decimal> {
        self.is_active.then_some(self.current_stop_price)
    }
}

/// 진입 주문이 성공적으로 접수된 뒤 원장에 기록되는 관리 주문.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedOrder {
    /// 거래소가 부여한 주문 ID (원장 키)
    pub order_id: String,
    /// 클라이언트 주문 ID (거래소가 orderId 연결을 누락할 때 보조 키)
    #[serde(default)]
    pub client_order_id: Option<String>,
    /// 원본 매매 의도
    pub intent: TradingIntent,
    /// 주문 수량
    pub quantity: Decimal,
    /// 트레일링 스탑 상태
    #[serde(default)]
    pub trailing_stop: TrailingStopState,
    /// 진입 시각
    #[serde(default = "Utc::now")]
    pub opened_at: DateTime<Utc>,
}

impl ManagedOrder {
    /// 새 관리 주문 생성 (트레일링 스탑 비활성).
    pub fn new(
        order_id: impl Into<String>,
        client_order_id: Option<String>,
        intent: TradingIntent,
        quantity: Decimal,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            client_order_id,
            intent,
            quantity,
            trailing_stop: TrailingStopState::default(),
            opened_at: Utc::now(),
        }
    }

    /// 심볼.
    pub fn symbol(&self) -> &str {
        &self.intent.symbol
    }

    /// 방향.
    pub fn side(&self) -> Side {
        self.intent.direction
    }
}
