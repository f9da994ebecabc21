//! 시그널 실행과 포지션 조정.
//!
//! 이 crate는 다음을 제공합니다:
//! - 시그널을 진입 주문으로 바꾸는 실행기 (`SignalExecutor`)
//! - 관리 주문 원장과 JSON 스냅샷 영속화 (`PositionLedger`)
//! - 거래소 상태와 원장을 맞추는 폴링 엔진 (`ReconciliationEngine`)
//! - TP1 이후 스탑을 따라 올리는 트레일링 스탑 (`TrailingStopController`)
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_execution::{PositionLedger, ReconciliationEngine, SignalExecutor};
//!
//! let ledger = Arc::new(PositionLedger::load("ledger.json").await?);
//! let executor = SignalExecutor::new(gateway.clone(), ledger.clone(), ExecutorConfig::default());
//! let engine = ReconciliationEngine::new(gateway, ledger, TrailingStopController::default(), ReconcilerConfig::default());
//!
//! executor.process_text(signal_text).await?;
//! engine.start();
//! engine.run(shutdown_rx).await;
//! ```

pub mod ledger;
pub mod reconciler;
pub mod report;
pub mod signal_executor;
pub mod trailing_stop;

pub use ledger::{PersistenceError, PositionLedger};
pub use reconciler::{
    classify_closure, ClosureKind, CycleReport, ReconcilerConfig, ReconciliationEngine, Removal,
    RemovalReason, DEFAULT_HISTORY_LOOKBACK, DEFAULT_POLL_INTERVAL,
};
pub use report::StatusReport;
pub use signal_executor::{calculate_quantity, ExecutionError, ExecutorConfig, SignalExecutor};
pub use trailing_stop::{StopUpdate, TrailingStopController, DEFAULT_TRAILING_OFFSET};
