//! BingX 무기한 선물(Perpetual Swap) 커넥터.

mod client;

pub use client::{
    BingxClient, BingxConfig, BingxResponse, DEFAULT_BASE_URL, HISTORY_UNAVAILABLE_CODE,
    INSUFFICIENT_MARGIN_CODE,
};
