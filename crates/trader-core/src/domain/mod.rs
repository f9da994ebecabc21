//! 도메인 타입.

mod exchange_provider;
mod exchange_types;
mod intent;
mod order;

pub use exchange_provider::{ExchangeGateway, ProviderError};
pub use exchange_types::{
    AssetBalance, EntryOrderRequest, HistoricalOrder, OpenOrder, OrderResult, Position,
    PositionSide, UNKNOWN_ORDER_ID,
};
pub use intent::{Side, TradingIntent};
pub use order::{ManagedOrder, TrailingStopState};
