//! 거래소 커넥터.
//!
//! `trader-core`의 [`ExchangeGateway`](trader_core::ExchangeGateway) trait 구현체를 제공합니다.
//!
//! # 구조
//!
//! ```text
//! connector/bingx   // BingX 무기한 선물 REST 클라이언트 (서명, 요청)
//! provider/bingx    // BingxGateway: 응답 → 도메인 타입 변환
//! provider/mock     // MockGateway: 테스트용 스크립트 게이트웨이
//! retry             // 조회 요청 재시도 유틸리티
//! ```

pub mod connector;
pub mod provider;
pub mod retry;

use thiserror::Error;
use trader_core::ProviderError;

pub use connector::bingx::{BingxClient, BingxConfig};
pub use provider::{extract_order_id, BingxGateway, MockGateway};
pub use retry::{with_retry, RetryConfig};

/// 커넥터 내부 에러.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error("네트워크 에러: {0}")]
    NetworkError(String),

    #[error("연결 끊김: {0}")]
    Disconnected(String),

    #[error("인증 실패: {0}")]
    Unauthorized(String),

    #[error("요청 한도 초과")]
    RateLimited,

    #[error("응답 파싱 실패: {0}")]
    ParseError(String),

    #[error("지원하지 않는 기능: {0}")]
    NotSupported(String),

    #[error("잔고 부족: {0}")]
    InsufficientBalance(String),

    #[error("거래소 API 에러 (code {code}): {message}")]
    ApiError { code: i64, message: String },
}

impl ExchangeError {
    /// 재시도로 해결될 수 있는 일시적 에러인지 여부.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_) | ExchangeError::Disconnected(_) | ExchangeError::RateLimited
        )
    }

    /// 재시도해서는 안 되는 에러인지 여부.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExchangeError::Unauthorized(_) | ExchangeError::InsufficientBalance(_)
        )
    }

    /// 에러가 지정한 대기 시간 (밀리초).
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::RateLimited => Some(2_000),
            _ => None,
        }
    }
}

/// ExchangeError → ProviderError 변환.
pub fn to_provider_error(e: ExchangeError) -> ProviderError {
    match e {
        ExchangeError::Unauthorized(msg) => ProviderError::Authentication(msg),
        ExchangeError::NetworkError(msg) | ExchangeError::Disconnected(msg) => {
            ProviderError::Network(msg)
        }
        ExchangeError::RateLimited => ProviderError::Api("Rate limit exceeded".to_string()),
        ExchangeError::ParseError(msg) => ProviderError::Parse(msg),
        ExchangeError::NotSupported(msg) => ProviderError::Unsupported(msg),
        other => ProviderError::Api(other.to_string()),
    }
}
