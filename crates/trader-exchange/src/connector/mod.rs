//! 거래소별 REST 클라이언트.

pub mod bingx;
