//! 시그널 트레이딩 봇의 핵심 도메인.
//!
//! 이 crate는 다음을 제공합니다:
//! - 매매 의도(`TradingIntent`)와 관리 주문(`ManagedOrder`) 도메인 타입
//! - 텍스트 시그널 해석기 (`signal::parse`, `signal::validate`)
//! - 거래소 접근 추상화 (`ExchangeGateway` trait)
//!
//! 거래소 커넥터와 실행/조정 로직은 각각 `trader-exchange`,
//! `trader-execution` crate에 있으며, 모두 이 crate의 타입만을 공유합니다.

pub mod domain;
pub mod signal;

pub use domain::{
    AssetBalance, EntryOrderRequest, ExchangeGateway, HistoricalOrder, ManagedOrder, OpenOrder,
    OrderResult, Position, PositionSide, ProviderError, Side, TradingIntent, TrailingStopState,
    UNKNOWN_ORDER_ID,
};
pub use signal::{interpret, parse, validate, validate_signal, ParseError, SignalError, ValidationError};
