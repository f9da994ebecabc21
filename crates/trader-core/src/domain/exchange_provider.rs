//! 거래소 접근 추상화.
//!
//! 실행/조정 로직이 소비하는 거래소 인터페이스를 정의합니다.
//! 각 호출은 단일 시도이며, 재시도 여부는 호출자(또는 구현체)가 결정합니다.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use super::{AssetBalance, EntryOrderRequest, HistoricalOrder, OpenOrder, OrderResult, Position};

// =============================================================================
// 에러 타입
// =============================================================================

/// ExchangeGateway 에러.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 인증 실패
    #[error("인증 실패: {0}")]
    Authentication(String),

    /// API 에러 (주문 거부 포함)
    #[error("API 에러: {0}")]
    Api(String),

    /// 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 지원하지 않는 기능
    #[error("지원하지 않는 기능: {0}")]
    Unsupported(String),

    /// 기타 에러
    #[error("기타 에러: {0}")]
    Other(String),
}

// =============================================================================
// ExchangeGateway Trait
// =============================================================================

/// 거래소 게이트웨이 trait.
///
/// 주문 제출, 취소, 시세/포지션/주문 내역 조회를 제공합니다.
///
/// # 구현 예시
///
/// ```ignore
/// pub struct BingxGateway {
///     client: Arc<BingxClient>,
/// }
///
/// #[async_trait]
/// impl ExchangeGateway for BingxGateway {
///     async fn current_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
///         // BingX API 호출 및 변환
///     }
///
///     // ... 나머지 메서드 구현
/// }
/// ```
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// 거래소 이름 반환.
    ///
    /// 로깅 목적으로 사용됩니다.
    fn exchange_name(&self) -> &str;

    /// 시장가 진입 주문 제출 (손절/익절 첨부 가능).
    ///
    /// 응답에서 주문 ID를 찾지 못해도 실패하지 않고
    /// [`crate::UNKNOWN_ORDER_ID`]를 담아 반환합니다.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Api`: 거래소가 주문을 거부함
    /// - `ProviderError::Network`: 네트워크 연결 실패
    async fn place_entry_order(
        &self,
        request: &EntryOrderRequest,
    ) -> Result<OrderResult, ProviderError>;

    /// 현재가 조회.
    async fn current_price(&self, symbol: &str) -> Result<Decimal, ProviderError>;

    /// 열린 포지션 조회.
    ///
    /// `symbol`이 None이면 전체 포지션을 조회합니다.
    /// 포지션이 없으면 빈 벡터를 반환합니다.
    async fn open_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>, ProviderError>;

    /// 체결된 주문 내역 조회.
    ///
    /// 거래소의 내역 엔드포인트를 사용할 수 없는 경우 에러가 아닌
    /// 빈 벡터를 반환해야 합니다.
    async fn order_history(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<HistoricalOrder>, ProviderError>;

    /// 주문 취소 (best-effort).
    ///
    /// 브라켓 주문 내부에서 생성된 손절/익절 주문은 취소할 수 없을 수 있습니다.
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), ProviderError>;

    /// 레버리지 설정.
    ///
    /// # 기본 구현
    ///
    /// 기본적으로 `Unsupported` 에러를 반환합니다.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ProviderError> {
        let _ = (symbol, leverage);
        Err(ProviderError::Unsupported(format!(
            "{}: 레버리지 설정",
            self.exchange_name()
        )))
    }

    /// 자산별 잔고 조회.
    async fn account_balance(&self) -> Result<Vec<AssetBalance>, ProviderError>;

    /// 미체결 주문 조회.
    ///
    /// # 기본 구현
    ///
    /// 기본적으로 `Unsupported` 에러를 반환합니다.
    async fn open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, ProviderError> {
        let _ = symbol;
        Err(ProviderError::Unsupported(format!(
            "{}: 미체결 주문 조회",
            self.exchange_name()
        )))
    }
}
