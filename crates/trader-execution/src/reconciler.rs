//! 조정(Reconciliation) 엔진.
//!
//! 주기적으로 거래소 포지션과 원장을 비교하여 관리 주문의 상태를 전이시킵니다.
//!
//! # 한 주기의 흐름
//!
//! ```text
//! ledger.snapshot()
//!        │
//!        ▼
//! open_positions() ──실패──▶ 주기 건너뜀 (원장 변경 없음)
//!        │
//!        ▼
//! 원장의 각 주문
//! ├── 심볼 포지션 없음 → order_history() → classify_closure()
//! │     ├── TakeProfitFilled → 트레일링 스탑 활성화 (주문 유지)
//! │     └── Closed / Unmatched → 원장에서 제거
//! └── 심볼 포지션 있음 + 트레일링 활성 → 스탑 갱신 → 돌파 시 제거
//! ```
//!
//! 주기는 겹치지 않습니다. 다음 tick은 이전 주기가 끝난 뒤에만 처리되고,
//! `start`/`stop`은 tick 경계에서만 반영됩니다.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use trader_core::{ExchangeGateway, HistoricalOrder, ManagedOrder};

use crate::ledger::{PersistenceError, PositionLedger};
use crate::trailing_stop::{StopUpdate, TrailingStopController};

/// 기본 폴링 주기.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// 청산 판정 시 조회하는 주문 내역 개수.
pub const DEFAULT_HISTORY_LOOKBACK: usize = 50;

// =============================================================================
// 청산 분류
// =============================================================================

/// 포지션이 사라진 주문의 분류 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureKind {
    /// TP1 체결. 트레일링 스탑을 시작하고 주문을 유지합니다.
    TakeProfitFilled,
    /// 손절 등 그 밖의 체결로 종료.
    Closed,
    /// 내역에서 찾지 못함. 수동 청산 등으로 간주하여 종료.
    Unmatched,
}

impl ClosureKind {
    /// 원장에서 제거해야 하는 종료 상태인지 여부.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClosureKind::TakeProfitFilled)
    }
}

/// 포지션이 사라진 주문을 내역 일치 항목과 트레일링 상태로 분류합니다.
///
/// - TAKE_PROFIT 유형 일치, 또는 트레일링 비활성이면서 STOP이 아닌 일치 → `TakeProfitFilled`
/// - 그 밖의 일치 → `Closed`
/// - 일치 없음 → `Unmatched`
pub fn classify_closure(history_match: Option<&HistoricalOrder>, trailing_active: bool) -> ClosureKind {
    match history_match {
        Some(order) if order.is_take_profit() || (!trailing_active && !order.is_stop()) => {
            ClosureKind::TakeProfitFilled
        }
        Some(_) => ClosureKind::Closed,
        None => ClosureKind::Unmatched,
    }
}

// =============================================================================
// 주기 결과
// =============================================================================

/// 원장에서 제거된 이유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// 손절/수동 등 TP1 이외의 체결
    Closed,
    /// 내역에 일치 항목 없음
    Unmatched,
    /// 주문 내역 조회 실패
    HistoryUnavailable,
    /// 트레일링 스탑 돌파
    StopTriggered,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RemovalReason::Closed => "closed",
            RemovalReason::Unmatched => "unmatched",
            RemovalReason::HistoryUnavailable => "history_unavailable",
            RemovalReason::StopTriggered => "stop_triggered",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub order_id: String,
    pub reason: RemovalReason,
}

/// 한 주기의 처리 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// 포지션 조회 실패로 주기를 건너뛰었는지
    pub skipped: bool,
    /// 검사한 관리 주문 수
    pub checked: usize,
    /// 트레일링 스탑이 새로 활성화된 주문
    pub activated: Vec<String>,
    /// 스탑이 유리하게 이동한 주문
    pub ratcheted: Vec<String>,
    /// 원장에서 제거된 주문
    pub removed: Vec<Removal>,
    /// 스냅샷 기록 실패 횟수
    pub persistence_failures: usize,
}

impl CycleReport {
    pub fn has_changes(&self) -> bool {
        !self.activated.is_empty() || !self.ratcheted.is_empty() || !self.removed.is_empty()
    }
}

// =============================================================================
// 엔진
// =============================================================================

/// 조정 엔진 설정.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub poll_interval: Duration,
    pub history_lookback: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            history_lookback: DEFAULT_HISTORY_LOOKBACK,
        }
    }
}

/// 조정 엔진.
///
/// 원장은 시그널 처리 경로와 `Arc`로 공유합니다.
pub struct ReconciliationEngine {
    gateway: Arc<dyn ExchangeGateway>,
    ledger: Arc<PositionLedger>,
    controller: TrailingStopController,
    config: ReconcilerConfig,
    running: AtomicBool,
}

impl ReconciliationEngine {
    /// 새 엔진 생성 (모니터링 정지 상태).
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        ledger: Arc<PositionLedger>,
        controller: TrailingStopController,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            gateway,
            ledger,
            controller,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn ledger(&self) -> &Arc<PositionLedger> {
        &self.ledger
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    // ==================== 제어 ====================

    /// 모니터링 시작. 이미 실행 중이면 `false`.
    pub fn start(&self) -> bool {
        let changed = !self.running.swap(true, Ordering::SeqCst);
        if changed {
            info!("모니터링 시작");
        }
        changed
    }

    /// 모니터링 정지. 진행 중인 주기는 끝까지 실행됩니다. 이미 정지 상태면 `false`.
    pub fn stop(&self) -> bool {
        let changed = self.running.swap(false, Ordering::SeqCst);
        if changed {
            info!("모니터링 정지");
        }
        changed
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn add_order(&self, order: ManagedOrder) -> Result<(), PersistenceError> {
        self.ledger.insert(order).await
    }

    pub async fn remove_order(&self, order_id: &str) -> Result<bool, PersistenceError> {
        self.ledger.remove(order_id).await
    }

    // ==================== 루프 ====================

    /// 종료 신호를 받을 때까지 폴링 루프를 실행합니다.
    ///
    /// 정지 상태에서는 tick만 소비하고 주기를 실행하지 않습니다.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            exchange = self.gateway.exchange_name(),
            interval_secs = self.config.poll_interval.as_secs(),
            "조정 루프 시작"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("조정 루프 종료 신호 수신");
                    break;
                }
                _ = interval.tick() => {
                    if !self.is_running() {
                        continue;
                    }
                    let report = self.run_cycle().await;
                    if report.has_changes() {
                        info!(
                            activated = report.activated.len(),
                            ratcheted = report.ratcheted.len(),
                            removed = report.removed.len(),
                            "조정 주기 완료"
                        );
                    } else {
                        debug!(checked = report.checked, skipped = report.skipped, "조정 주기 완료");
                    }
                }
            }
        }
    }

    /// 조정 주기 1회 실행.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        // 원장을 먼저 읽는다. 포지션 조회 이후 등록된 주문은 다음 주기에 검사한다
        let orders = self.ledger.snapshot().await;

        let positions = match self.gateway.open_positions(None).await {
            Ok(positions) => positions,
            Err(e) => {
                warn!(error = %e, "포지션 조회 실패, 이번 주기 건너뜀");
                report.skipped = true;
                return report;
            }
        };
        let open_symbols: HashSet<String> = positions.into_iter().map(|p| p.symbol).collect();

        // 같은 심볼의 내역은 주기당 한 번만 조회 (None = 조회 실패)
        let mut history_cache: HashMap<String, Option<Vec<HistoricalOrder>>> = HashMap::new();

        for order in orders {
            report.checked += 1;

            if !open_symbols.contains(order.symbol()) {
                let history = match history_cache.get(order.symbol()) {
                    Some(cached) => cached.clone(),
                    None => {
                        let fetched = self.fetch_history(order.symbol()).await;
                        history_cache.insert(order.symbol().to_string(), fetched.clone());
                        fetched
                    }
                };
                self.handle_missing_position(&order, history.as_deref(), &mut report)
                    .await;
            } else if order.trailing_stop.is_active {
                self.trail(&order, &mut report).await;
            }
        }

        report
    }

    async fn fetch_history(&self, symbol: &str) -> Option<Vec<HistoricalOrder>> {
        match self
            .gateway
            .order_history(symbol, self.config.history_lookback)
            .await
        {
            Ok(history) => Some(history),
            Err(e) => {
                warn!(symbol, error = %e, "주문 내역 조회 실패");
                None
            }
        }
    }

    async fn handle_missing_position(
        &self,
        order: &ManagedOrder,
        history: Option<&[HistoricalOrder]>,
        report: &mut CycleReport,
    ) {
        let Some(history) = history else {
            // 내역을 확인할 수 없으면 종료로 간주
            self.close(order, RemovalReason::HistoryUnavailable, report)
                .await;
            return;
        };

        let matched = history
            .iter()
            .find(|h| h.matches(&order.order_id, order.client_order_id.as_deref()));

        match classify_closure(matched, order.trailing_stop.is_active) {
            ClosureKind::TakeProfitFilled => self.activate(order, report).await,
            ClosureKind::Closed => self.close(order, RemovalReason::Closed, report).await,
            ClosureKind::Unmatched => self.close(order, RemovalReason::Unmatched, report).await,
        }
    }

    async fn activate(&self, order: &ManagedOrder, report: &mut CycleReport) {
        let Some(price) = self.price_of(order).await else {
            return;
        };

        let was_active = order.trailing_stop.is_active;
        let update = self
            .controller
            .activate(&order.trailing_stop, order.side(), price);

        if !was_active {
            info!(
                order_id = %order.order_id,
                symbol = order.symbol(),
                price = %price,
                stop = %update.state.current_stop_price,
                "TP1 체결 확인, 트레일링 스탑 활성화"
            );
            report.activated.push(order.order_id.clone());
        } else if update.changed {
            report.ratcheted.push(order.order_id.clone());
        }

        self.commit(order, update, report).await;
    }

    async fn trail(&self, order: &ManagedOrder, report: &mut CycleReport) {
        let Some(price) = self.price_of(order).await else {
            return;
        };

        let update = self
            .controller
            .ratchet(&order.trailing_stop, order.side(), price);
        if update.changed {
            debug!(
                order_id = %order.order_id,
                from = %order.trailing_stop.current_stop_price,
                to = %update.state.current_stop_price,
                "트레일링 스탑 이동"
            );
            report.ratcheted.push(order.order_id.clone());
        }

        self.commit(order, update, report).await;
    }

    /// 변경된 스탑을 원장에 기록하고, 돌파되었으면 주문을 제거합니다.
    async fn commit(&self, order: &ManagedOrder, update: StopUpdate, report: &mut CycleReport) {
        if update.changed {
            let state = update.state;
            let result = self
                .ledger
                .update(&order.order_id, |managed| {
                    managed.trailing_stop = state;
                    true
                })
                .await;

            match result {
                Ok(true) => {}
                Ok(false) => {
                    debug!(order_id = %order.order_id, "주기 중 원장에서 이미 제거됨");
                    return;
                }
                Err(e) => {
                    warn!(order_id = %order.order_id, error = %e, "원장 저장 실패, 내구성 저하");
                    report.persistence_failures += 1;
                }
            }
        }

        if update.triggered {
            warn!(
                order_id = %order.order_id,
                symbol = order.symbol(),
                stop = %update.state.current_stop_price,
                "트레일링 스탑 돌파"
            );
            self.close(order, RemovalReason::StopTriggered, report).await;
        }
    }

    async fn close(&self, order: &ManagedOrder, reason: RemovalReason, report: &mut CycleReport) {
        info!(
            order_id = %order.order_id,
            symbol = order.symbol(),
            reason = %reason,
            "포지션 종료, 관리 중단"
        );

        if let Err(e) = self.ledger.remove(&order.order_id).await {
            warn!(order_id = %order.order_id, error = %e, "원장 저장 실패, 내구성 저하");
            report.persistence_failures += 1;
        }
        report.removed.push(Removal {
            order_id: order.order_id.clone(),
            reason,
        });
    }

    async fn price_of(&self, order: &ManagedOrder) -> Option<rust_decimal::Decimal> {
        match self.gateway.current_price(order.symbol()).await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!(
                    order_id = %order.order_id,
                    symbol = order.symbol(),
                    error = %e,
                    "시세 조회 실패, 다음 주기에 재시도"
                );
                None
            }
        }
    }
}
