//! 거래소 중립 타입 정의.
//!
//! 거래소 커넥터는 자체 응답 형식을 이 타입으로 변환하여
//! 실행/조정 로직에 전달합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// 응답에서 주문 ID를 찾지 못했을 때 사용하는 값.
pub const UNKNOWN_ORDER_ID: &str = "UNKNOWN";

// =============================================================================
// 주문 요청/응답
// =============================================================================

/// 진입 주문 요청.
///
/// 시장가 진입 + (선택) 손절 + (선택) 익절을 하나의 주문으로 제출합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOrderRequest {
    /// 심볼
    pub symbol: String,
    /// 방향
    pub side: Side,
    /// 수량
    pub quantity: Decimal,
    /// 손절 트리거 가격
    pub stop_price: Option<Decimal>,
    /// 익절 트리거 가격
    pub take_profit_price: Option<Decimal>,
    /// 클라이언트 주문 ID
    pub client_order_id: Option<String>,
}

impl EntryOrderRequest {
    /// 손절/익절 없는 시장가 진입 요청.
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            stop_price: None,
            take_profit_price: None,
            client_order_id: None,
        }
    }

    /// 손절가 설정.
    pub fn with_stop(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    /// 익절가 설정.
    pub fn with_take_profit(mut self, take_profit_price: Decimal) -> Self {
        self.take_profit_price = Some(take_profit_price);
        self
    }

    /// 클라이언트 주문 ID 설정.
    pub fn with_client_order_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_order_id.into());
        self
    }
}

/// 주문 제출 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    /// 주문 ID (찾지 못하면 [`UNKNOWN_ORDER_ID`])
    pub order_id: String,
    /// 거래소 원본 응답
    pub raw: serde_json::Value,
}

impl OrderResult {
    /// 응답에서 실제 주문 ID를 찾았는지 여부.
    pub fn has_order_id(&self) -> bool {
        self.order_id != UNKNOWN_ORDER_ID
    }
}

// =============================================================================
// 포지션 / 주문 내역
// =============================================================================

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
    /// 단방향 모드
    Both,
}

/// 거래소에 열려 있는 포지션.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 심볼 (거래소 표기와 무관하게 "AERGOUSDT" 형태로 정규화)
    pub symbol: String,
    /// 방향
    pub side: PositionSide,
    /// 수량
    pub quantity: Decimal,
    /// 평균 진입가
    pub avg_price: Decimal,
    /// 청산가 (미제공 시 None)
    pub liquidation_price: Option<Decimal>,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
}

/// 주문 내역 항목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalOrder {
    /// 주문 ID
    pub order_id: String,
    /// 클라이언트 주문 ID
    pub client_order_id: Option<String>,
    /// 주문 유형 (예: "MARKET", "STOP_MARKET", "TAKE_PROFIT_MARKET")
    pub order_type: String,
    /// 주문 상태 (예: "FILLED")
    pub status: String,
}

impl HistoricalOrder {
    /// 익절 체결 여부.
    pub fn is_take_profit(&self) -> bool {
        self.order_type.contains("TAKE_PROFIT")
    }

    /// 손절(스탑) 체결 여부.
    pub fn is_stop(&self) -> bool {
        self.order_type.contains("STOP")
    }

    /// 주문 ID 또는 클라이언트 주문 ID로 일치 여부 확인.
    ///
    /// 클라이언트 주문 ID는 양쪽 모두 값이 있을 때만 비교합니다.
    pub fn matches(&self, order_id: &str, client_order_id: Option<&str>) -> bool {
        if self.order_id == order_id {
            return true;
        }
        match (self.client_order_id.as_deref(), client_order_id) {
            (Some(theirs), Some(ours)) => theirs == ours,
            _ => false,
        }
    }
}

/// 미체결 주문.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub symbol: String,
    pub order_id: String,
    pub side: String,
    pub order_type: String,
    pub quantity: Decimal,
    /// 지정가 (시장가 주문은 None)
    pub price: Option<Decimal>,
    pub status: String,
}

/// 자산별 잔고.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    /// 자산 (예: "USDT", 모의거래는 "VST")
    pub asset: String,
    /// 사용 가능 잔고
    pub available_balance: Decimal,
    /// 총 평가 자산
    pub equity: Decimal,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(order_id: &str, client: Option<&str>, order_type: &str) -> HistoricalOrder {
        HistoricalOrder {
            order_id: order_id.to_string(),
            client_order_id: client.map(str::to_string),
            order_type: order_type.to_string(),
            status: "FILLED".to_string(),
        }
    }

    #[test]
    fn matches_by_order_id_or_client_id() {
        let h = history("123", Some("cli-1"), "TAKE_PROFIT_MARKET");
        assert!(h.matches("123", None));
        assert!(h.matches("999", Some("cli-1")));
        assert!(!h.matches("999", Some("cli-2")));
    }

    #[test]
    fn missing_client_ids_never_match_each_other() {
        let h = history("123", None, "MARKET");
        assert!(!h.matches("999", None));
    }

    #[test]
    fn order_type_classification() {
        assert!(history("1", None, "TAKE_PROFIT_MARKET").is_take_profit());
        assert!(!history("1", None, "TAKE_PROFIT_MARKET").is_stop());
        assert!(history("1", None, "STOP_MARKET").is_stop());
        assert!(!history("1", None, "MARKET").is_stop());
    }
}
