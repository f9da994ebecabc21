//! ExchangeGateway 구현체.
//!
//! - [`BingxGateway`]: BingX 무기한 선물 게이트웨이
//! - [`MockGateway`]: 테스트/드라이런용 스크립트 게이트웨이

mod bingx;
mod mock;

pub use bingx::{extract_order_id, BingxGateway};
pub use mock::MockGateway;
