//! Mock 거래소 ExchangeGateway 구현.
//!
//! 시세/포지션/주문 내역을 스크립트로 지정하는 가상 거래소입니다.
//! 조정 엔진 테스트와 `--dry-run` 실행에 사용합니다.
//!
//! # 아키텍처
//!
//! ```text
//! MockGateway
//! ├── MockState (RwLock)   - 시세, 포지션, 심볼별 주문 내역, 잔고, 제출 기록
//! ├── 실패 스위치 (Atomic) - 포지션/내역/주문/시세 조회 실패 주입
//! └── 주문 ID 카운터       - 진입 주문마다 증가
//! ```
//!
//! 진입 주문이 접수되면 해당 심볼의 포지션이 함께 열립니다.
//! 청산은 [`MockGateway::close_position`]과 [`MockGateway::push_history`]로 재현합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use trader_core::{
    AssetBalance, EntryOrderRequest, ExchangeGateway, HistoricalOrder, OpenOrder, OrderResult,
    Position, PositionSide, ProviderError, Side, UNKNOWN_ORDER_ID,
};

/// Mock 거래소 상태 (메모리)
#[derive(Debug, Default)]
struct MockState {
    prices: HashMap<String, Decimal>,
    positions: Vec<Position>,
    /// 심볼 -> 체결 내역 (최신순)
    history: HashMap<String, Vec<HistoricalOrder>>,
    balances: Vec<AssetBalance>,
    placed: Vec<EntryOrderRequest>,
    cancelled: Vec<(String, String)>,
    leverage: HashMap<String, u32>,
}

/// 스크립트 기반 Mock 게이트웨이.
pub struct MockGateway {
    state: RwLock<MockState>,
    next_order_id: AtomicU64,
    fail_positions: AtomicBool,
    fail_history: AtomicBool,
    fail_orders: AtomicBool,
    fail_price: AtomicBool,
    omit_order_id: AtomicBool,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState::default()),
            next_order_id: AtomicU64::new(1),
            fail_positions: AtomicBool::new(false),
            fail_history: AtomicBool::new(false),
            fail_orders: AtomicBool::new(false),
            fail_price: AtomicBool::new(false),
            omit_order_id: AtomicBool::new(false),
        }
    }

    /// 다음 진입 주문에 부여할 주문 ID 지정.
    pub fn with_next_order_id(self, order_id: u64) -> Self {
        self.next_order_id.store(order_id, Ordering::SeqCst);
        self
    }

    // ==================== 상태 스크립트 ====================

    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        self.state.write().await.prices.insert(symbol.to_string(), price);
    }

    pub async fn set_balance(&self, asset: &str, available: Decimal) {
        let mut state = self.state.write().await;
        state.balances.retain(|b| b.asset != asset);
        state.balances.push(AssetBalance {
            asset: asset.to_string(),
            available_balance: available,
            equity: available,
            unrealized_pnl: Decimal::ZERO,
        });
    }

    /// 포지션 직접 등록 (같은 심볼의 기존 포지션은 교체).
    pub async fn open_position(&self, symbol: &str, side: Side, quantity: Decimal) {
        let mut state = self.state.write().await;
        let avg_price = state.prices.get(symbol).copied().unwrap_or_default();
        state.positions.retain(|p| p.symbol != symbol);
        state.positions.push(Position {
            symbol: symbol.to_string(),
            side: position_side(side),
            quantity,
            avg_price,
            liquidation_price: None,
            unrealized_pnl: Decimal::ZERO,
        });
    }

    /// 해당 심볼의 포지션 제거 (거래소 측 청산 재현).
    pub async fn close_position(&self, symbol: &str) {
        self.state.write().await.positions.retain(|p| p.symbol != symbol);
    }

    /// 체결 내역 추가. 최신 항목이 앞에 오도록 삽입합니다.
    pub async fn push_history(&self, symbol: &str, order_id: &str, order_type: &str) {
        self.push_history_order(
            symbol,
            HistoricalOrder {
                order_id: order_id.to_string(),
                client_order_id: None,
                order_type: order_type.to_string(),
                status: "FILLED".to_string(),
            },
        )
        .await;
    }

    pub async fn push_history_order(&self, symbol: &str, order: HistoricalOrder) {
        self.state
            .write()
            .await
            .history
            .entry(symbol.to_string())
            .or_default()
            .insert(0, order);
    }

    /// 해당 심볼의 체결 내역 삭제.
    pub async fn clear_history(&self, symbol: &str) {
        self.state.write().await.history.remove(symbol);
    }

    // ==================== 실패 주입 ====================

    pub fn fail_positions(&self, fail: bool) {
        self.fail_positions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    pub fn fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    pub fn fail_price(&self, fail: bool) {
        self.fail_price.store(fail, Ordering::SeqCst);
    }

    /// 주문 응답에서 주문 ID를 누락 (UNKNOWN 경로 재현).
    pub fn omit_order_id(&self, omit: bool) {
        self.omit_order_id.store(omit, Ordering::SeqCst);
    }

    // ==================== 기록 조회 ====================

    /// 제출된 진입 주문 목록.
    pub async fn placed_orders(&self) -> Vec<EntryOrderRequest> {
        self.state.read().await.placed.clone()
    }

    /// 취소 요청 목록 (심볼, 주문 ID).
    pub async fn cancelled_orders(&self) -> Vec<(String, String)> {
        self.state.read().await.cancelled.clone()
    }

    /// 심볼에 설정된 레버리지.
    pub async fn leverage_for(&self, symbol: &str) -> Option<u32> {
        self.state.read().await.leverage.get(symbol).copied()
    }
}

fn position_side(side: Side) -> PositionSide {
    match side {
        Side::Buy => PositionSide::Long,
        Side::Sell => PositionSide::Short,
    }
}

fn injected(flag: &AtomicBool, what: &str) -> Result<(), ProviderError> {
    if flag.load(Ordering::SeqCst) {
        return Err(ProviderError::Network(format!("mock: {} 실패 주입", what)));
    }
    Ok(())
}

#[async_trait]
impl ExchangeGateway for MockGateway {
    fn exchange_name(&self) -> &str {
        "mock"
    }

    async fn place_entry_order(
        &self,
        request: &EntryOrderRequest,
    ) -> Result<OrderResult, ProviderError> {
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(ProviderError::Api("mock: 주문 거부".to_string()));
        }

        let order_id = if self.omit_order_id.load(Ordering::SeqCst) {
            UNKNOWN_ORDER_ID.to_string()
        } else {
            self.next_order_id.fetch_add(1, Ordering::SeqCst).to_string()
        };

        self.state.write().await.placed.push(request.clone());
        self.open_position(&request.symbol, request.side, request.quantity)
            .await;

        debug!(symbol = %request.symbol, order_id = %order_id, "mock 진입 주문 접수");
        Ok(OrderResult {
            raw: json!({ "order": { "orderId": order_id } }),
            order_id,
        })
    }

    async fn current_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        injected(&self.fail_price, "시세 조회")?;
        self.state
            .read()
            .await
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ProviderError::Api(format!("mock: {} 시세 없음", symbol)))
    }

    async fn open_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>, ProviderError> {
        injected(&self.fail_positions, "포지션 조회")?;
        let state = self.state.read().await;
        Ok(state
            .positions
            .iter()
            .filter(|p| symbol.map_or(true, |s| p.symbol == s))
            .cloned()
            .collect())
    }

    async fn order_history(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<HistoricalOrder>, ProviderError> {
        injected(&self.fail_history, "주문 내역 조회")?;
        let state = self.state.read().await;
        Ok(state
            .history
            .get(symbol)
            .map(|orders| orders.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), ProviderError> {
        self.state
            .write()
            .await
            .cancelled
            .push((symbol.to_string(), order_id.to_string()));
        Ok(())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ProviderError> {
        self.state
            .write()
            .await
            .leverage
            .insert(symbol.to_string(), leverage);
        Ok(())
    }

    async fn account_balance(&self) -> Result<Vec<AssetBalance>, ProviderError> {
        Ok(self.state.read().await.balances.clone())
    }

    async fn open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, ProviderError> {
        // 브라켓 손절/익절은 거래소 내부 주문으로만 존재한다
        let _ = symbol;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[tokio::test]
    async fn entry_order_opens_position_and_counts_ids() {
        let gateway = MockGateway::new().with_next_order_id(123);
        let request = EntryOrderRequest::market("XYZUSDT", Side::Sell, dec!(5));

        let first = gateway.place_entry_order(&request).await.unwrap();
        let second = gateway.place_entry_order(&request).await.unwrap();

        assert_eq!(first.order_id, "123");
        assert_eq!(second.order_id, "124");

        let positions = gateway.open_positions(Some("XYZUSDT")).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].side, PositionSide::Short);
        assert_eq!(gateway.placed_orders().await.len(), 2);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let gateway = MockGateway::new();
        gateway.push_history("XYZUSDT", "1", "TAKE_PROFIT_MARKET").await;
        gateway.push_history("XYZUSDT", "2", "STOP_MARKET").await;

        let history = gateway.order_history("XYZUSDT", 1).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].order_id, "2");
        assert!(gateway.order_history("ABCUSDT", 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let gateway = MockGateway::new();
        gateway.fail_positions(true);
        gateway.fail_history(true);

        assert!(matches!(
            gateway.open_positions(None).await,
            Err(ProviderError::Network(_))
        ));
        assert!(gateway.order_history("XYZUSDT", 50).await.is_err());

        gateway.fail_positions(false);
        assert!(gateway.open_positions(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_requests_are_recorded() {
        let gateway = MockGateway::new();
        gateway.cancel_order("XYZUSDT", "123").await.unwrap();

        assert_eq!(
            gateway.cancelled_orders().await,
            vec![("XYZUSDT".to_string(), "123".to_string())]
        );
    }

    #[tokio::test]
    async fn omitted_order_id_yields_unknown() {
        let gateway = MockGateway::new();
        gateway.omit_order_id(true);
        let result = gateway
            .place_entry_order(&EntryOrderRequest::market("XYZUSDT", Side::Buy, dec!(1)))
            .await
            .unwrap();
        assert!(!result.has_order_id());
    }
}
