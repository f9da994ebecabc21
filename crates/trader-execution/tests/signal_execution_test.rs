//! 시그널 실행 경로 테스트.
//!
//! 검증 범위:
//! 1. 해석 → 레버리지 → 수량 계산 → 진입 주문 → 원장 등록
//! 2. 해석/검증 실패 시 거래소 호출 없음
//! 3. 주문 실패 시 원장 변경 없음
//! 4. 주문 ID 누락 응답 처리

use std::sync::Arc;

use rust_decimal_macros::dec;
use trader_core::{ExchangeGateway, SignalError, Side, ValidationError};
use trader_exchange::MockGateway;
use trader_execution::{ExecutionError, ExecutorConfig, PositionLedger, SignalExecutor, StatusReport};

const AERGO_SIGNAL: &str = "🟢 LONG (AERGOUSDT)
Entrys: 0.11477 - 0.11458
Leverage: 5X
Tps: 0.11547 - 0.11593 - 0.1164
Stop Loss: 0.1143";

fn executor(gateway: Arc<MockGateway>, ledger: Arc<PositionLedger>) -> SignalExecutor {
    let gateway: Arc<dyn ExchangeGateway> = gateway;
    SignalExecutor::new(gateway, ledger, ExecutorConfig::default())
}

#[tokio::test]
async fn signal_becomes_managed_order() {
    let gateway = Arc::new(MockGateway::new().with_next_order_id(123));
    let ledger = Arc::new(PositionLedger::in_memory());
    gateway.set_balance("VST", dec!(1000)).await;

    let order = executor(gateway.clone(), ledger.clone())
        .process_text(AERGO_SIGNAL)
        .await
        .unwrap();

    assert_eq!(order.order_id, "123");
    assert_eq!(order.quantity, dec!(87.131));
    assert!(!order.trailing_stop.is_active);
    assert_eq!(ledger.get("123").await, Some(order.clone()));
    assert_eq!(gateway.leverage_for("AERGOUSDT").await, Some(5));

    let placed = gateway.placed_orders().await;
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].side, Side::Buy);
    assert_eq!(placed[0].stop_price, Some(dec!(0.1143)));
    assert_eq!(placed[0].take_profit_price, Some(dec!(0.11547)));
    assert_eq!(placed[0].client_order_id, order.client_order_id);
}

#[tokio::test]
async fn invalid_signal_touches_nothing() {
    let gateway = Arc::new(MockGateway::new());
    let ledger = Arc::new(PositionLedger::in_memory());
    gateway.set_balance("USDT", dec!(1000)).await;
    let executor = executor(gateway.clone(), ledger.clone());

    let wrong_stop = AERGO_SIGNAL.replace("Stop Loss: 0.1143", "Stop Loss: 0.12");
    let err = executor.process_text(&wrong_stop).await.unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::Signal(SignalError::Validation(ValidationError::StopLossOnWrongSide { .. }))
    ));

    let err = executor.process_text("hello").await.unwrap_err();
    assert!(matches!(err, ExecutionError::Signal(SignalError::Parse(_))));

    assert!(gateway.placed_orders().await.is_empty());
    assert_eq!(gateway.leverage_for("AERGOUSDT").await, None);
    assert!(ledger.is_empty().await);
}

#[tokio::test]
async fn rejected_order_leaves_ledger_empty() {
    let gateway = Arc::new(MockGateway::new());
    let ledger = Arc::new(PositionLedger::in_memory());
    gateway.set_balance("USDT", dec!(1000)).await;
    gateway.fail_orders(true);

    let err = executor(gateway, ledger.clone())
        .process_text(AERGO_SIGNAL)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Placement(_)));
    assert!(ledger.is_empty().await);
}

#[tokio::test]
async fn missing_margin_asset_aborts_before_placement() {
    let gateway = Arc::new(MockGateway::new());
    let ledger = Arc::new(PositionLedger::in_memory());
    gateway.set_balance("BTC", dec!(3)).await;

    let err = executor(gateway.clone(), ledger)
        .process_text(AERGO_SIGNAL)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::MarginAssetNotFound));
    assert!(gateway.placed_orders().await.is_empty());
}

#[tokio::test]
async fn dust_balance_sizes_to_zero() {
    let gateway = Arc::new(MockGateway::new());
    let ledger = Arc::new(PositionLedger::in_memory());
    gateway.set_balance("USDT", dec!(0.001)).await;

    let err = executor(gateway, ledger)
        .process_text(AERGO_SIGNAL)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::ZeroQuantity { .. }));
}

#[tokio::test]
async fn unknown_order_id_falls_back_to_client_id() {
    let gateway = Arc::new(MockGateway::new());
    let ledger = Arc::new(PositionLedger::in_memory());
    gateway.set_balance("USDT", dec!(1000)).await;
    gateway.omit_order_id(true);

    let order = executor(gateway, ledger.clone())
        .process_text(AERGO_SIGNAL)
        .await
        .unwrap();

    assert_eq!(Some(order.order_id.clone()), order.client_order_id);
    assert!(ledger.contains(&order.order_id).await);
}

#[tokio::test]
async fn status_report_lists_orders_and_positions() {
    let gateway = Arc::new(MockGateway::new());
    let ledger = Arc::new(PositionLedger::in_memory());
    gateway.set_balance("USDT", dec!(1000)).await;
    executor(gateway.clone(), ledger.clone())
        .process_text(AERGO_SIGNAL)
        .await
        .unwrap();

    let report = StatusReport::collect(&ledger, gateway.as_ref()).await;
    assert_eq!(report.managed_orders.len(), 1);
    assert_eq!(report.positions.len(), 1);
    assert_eq!(report.positions[0].symbol, "AERGOUSDT");

    let text = report.to_string();
    assert!(text.contains("AERGOUSDT"));
    assert!(text.contains("트레일링 스탑: 비활성"));

    gateway.fail_positions(true);
    let report = StatusReport::collect(&ledger, gateway.as_ref()).await;
    assert!(report.positions_error.is_some());
    assert_eq!(report.managed_orders.len(), 1);
}
