use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{header::CONTENT_TYPE, Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use crate::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

/// 모의거래(VST) 엔드포인트.
pub const DEFAULT_BASE_URL: &str = "https://open-api-vst.bingx.com";

/// 주문 내역 엔드포인트를 사용할 수 없을 때 BingX가 돌려주는 코드.
pub const HISTORY_UNAVAILABLE_CODE: i64 = 100404;

/// 증거금 부족으로 주문이 거부될 때의 코드.
pub const INSUFFICIENT_MARGIN_CODE: i64 = 101204;

const API_KEY_HEADER: &str = "X-BX-APIKEY";

// ============================================================================
// 설정
// ============================================================================

#[derive(Clone)]
pub struct BingxConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    /// `demoTrade=on` 파라미터 추가 여부
    pub demo_trade: bool,
    pub recv_window_ms: u64,
}

impl std::fmt::Debug for BingxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BingxConfig")
            .field("api_key", &"***")
            .field("secret_key", &"***")
            .field("base_url", &self.base_url)
            .field("demo_trade", &self.demo_trade)
            .finish()
    }
}

impl BingxConfig {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            demo_trade: true,
            recv_window_ms: 5_000,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_demo_trade(mut self, demo_trade: bool) -> Self {
        self.demo_trade = demo_trade;
        self
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

/// BingX 공통 응답 봉투 (`{ code, msg, data }`).
#[derive(Debug, Clone, Deserialize)]
pub struct BingxResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl BingxResponse {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// 성공 응답이면 `data`를 꺼내고, 아니면 API 에러로 변환.
    pub fn into_data(self) -> Result<Value, ExchangeError> {
        match self.code {
            0 => {}
            INSUFFICIENT_MARGIN_CODE => return Err(ExchangeError::InsufficientBalance(self.msg)),
            code => {
                return Err(ExchangeError::ApiError {
                    code,
                    message: self.msg,
                })
            }
        }
        Ok(self.data.unwrap_or(Value::Null))
    }
}

// ============================================================================
// BingX 클라이언트
// ============================================================================

pub struct BingxClient {
    http: Client,
    config: BingxConfig,
}

impl BingxClient {
    pub fn new(config: BingxConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &BingxConfig {
        &self.config
    }

    /// `AERGOUSDT` → `AERGO-USDT`.
    pub fn format_symbol(symbol: &str) -> String {
        if symbol.contains('-') {
            return symbol.to_string();
        }
        for quote in ["USDT", "USDC"] {
            if let Some(base) = symbol.strip_suffix(quote) {
                if !base.is_empty() {
                    return format!("{}-{}", base, quote);
                }
            }
        }
        symbol.to_string()
    }

    /// `AERGO-USDT` → `AERGOUSDT` (원장 심볼과 비교 가능한 형태).
    pub fn normalize_symbol(symbol: &str) -> String {
        symbol.replace('-', "")
    }

    /// HMAC-SHA256 서명 (hex).
    pub fn sign(&self, payload: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.config.secret_key.as_bytes())
            .map_err(|e| ExchangeError::Unauthorized(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 타임스탬프/recvWindow를 붙이고 서명한 쿼리 문자열.
    fn signed_query(&self, params: &[(&str, String)]) -> Result<String, ExchangeError> {
        let mut all: Vec<(&str, String)> = params.to_vec();
        all.push(("timestamp", Utc::now().timestamp_millis().to_string()));
        all.push(("recvWindow", self.config.recv_window_ms.to_string()));
        if self.config.demo_trade {
            all.push(("demoTrade", "on".to_string()));
        }

        let query = serde_urlencoded::to_string(&all)
            .map_err(|e| ExchangeError::ParseError(e.to_string()))?;
        let signature = self.sign(&query)?;
        Ok(format!("{}&signature={}", query, signature))
    }

    async fn signed_request(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<BingxResponse, ExchangeError> {
        let query = self.signed_query(params)?;
        let url = format!("{}{}", self.config.base_url, endpoint);

        let builder = if method == Method::GET {
            self.http.get(format!("{}?{}", url, query))
        } else {
            self.http
                .request(method, &url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(query)
        };

        let response = builder
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        let body = Self::read_body(response).await?;
        serde_json::from_str::<BingxResponse>(&body)
            .map_err(|e| ExchangeError::ParseError(format!("{}: {}", e, body)))
    }

    /// 서명 없는 공개 엔드포인트. 응답 본문을 그대로 반환합니다.
    async fn public_get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ExchangeError> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        let body = Self::read_body(response).await?;
        serde_json::from_str(&body).map_err(|e| ExchangeError::ParseError(e.to_string()))
    }

    async fn read_body(response: Response) -> Result<String, ExchangeError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        match status {
            s if s.is_success() => Ok(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ExchangeError::Unauthorized(body))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(ExchangeError::RateLimited),
            s => Err(ExchangeError::ApiError {
                code: s.as_u16() as i64,
                message: body,
            }),
        }
    }
}

// ============================================================================
// 엔드포인트
// ============================================================================

impl BingxClient {
    /// 계좌 잔고 (GET /openApi/swap/v2/user/balance)
    pub async fn get_balance(&self) -> Result<Value, ExchangeError> {
        self.signed_request(Method::GET, "/openApi/swap/v2/user/balance", &[])
            .await?
            .into_data()
    }

    /// 현재가 (GET /openApi/swap/v1/ticker/price, 공개)
    pub async fn get_price(&self, symbol: &str) -> Result<Value, ExchangeError> {
        self.public_get(
            "/openApi/swap/v1/ticker/price",
            &[("symbol", Self::format_symbol(symbol))],
        )
        .await
    }

    /// 레버리지 설정 (POST /openApi/swap/v1/trade/leverage)
    pub async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<Value, ExchangeError> {
        let params = [
            ("symbol", Self::format_symbol(symbol)),
            ("leverage", leverage.to_string()),
        ];
        self.signed_request(Method::POST, "/openApi/swap/v1/trade/leverage", &params)
            .await?
            .into_data()
    }

    /// 주문 제출 (POST /openApi/swap/v2/trade/order)
    pub async fn place_order(&self, params: &[(&str, String)]) -> Result<Value, ExchangeError> {
        let data = self
            .signed_request(Method::POST, "/openApi/swap/v2/trade/order", params)
            .await?
            .into_data()?;
        debug!(response = %data, "BingX 주문 응답");
        Ok(data)
    }

    /// 주문 취소 (POST /openApi/swap/v1/trade/cancelOrder)
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<Value, ExchangeError> {
        let params = [
            ("symbol", Self::format_symbol(symbol)),
            ("orderId", order_id.to_string()),
        ];
        self.signed_request(Method::POST, "/openApi/swap/v1/trade/cancelOrder", &params)
            .await?
            .into_data()
    }

    /// 미체결 주문 (GET /openApi/swap/v2/trade/openOrders)
    pub async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Value, ExchangeError> {
        let params: Vec<(&str, String)> = symbol
            .map(|s| vec![("symbol", Self::format_symbol(s))])
            .unwrap_or_default();
        self.signed_request(Method::GET, "/openApi/swap/v2/trade/openOrders", &params)
            .await?
            .into_data()
    }

    /// 주문 내역 (GET /openApi/swap/v2/trade/historyOrders)
    ///
    /// 엔드포인트 사용 불가 코드를 호출자가 판단할 수 있도록 응답 봉투를 그대로 반환합니다.
    pub async fn get_order_history(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<BingxResponse, ExchangeError> {
        let params = [
            ("symbol", Self::format_symbol(symbol)),
            ("limit", limit.to_string()),
        ];
        self.signed_request(Method::GET, "/openApi/swap/v2/trade/historyOrders", &params)
            .await
    }

    /// 포지션 (GET /openApi/swap/v2/user/positions)
    pub async fn get_positions(&self, symbol: Option<&str>) -> Result<Value, ExchangeError> {
        let params: Vec<(&str, String)> = symbol
            .map(|s| vec![("symbol", Self::format_symbol(s))])
            .unwrap_or_default();
        self.signed_request(Method::GET, "/openApi/swap/v2/user/positions", &params)
            .await?
            .into_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BingxClient {
        BingxClient::new(BingxConfig::new("key", "key"))
    }

    #[test]
    fn symbol_formatting() {
        assert_eq!(BingxClient::format_symbol("AERGOUSDT"), "AERGO-USDT");
        assert_eq!(BingxClient::format_symbol("BTCUSDC"), "BTC-USDC");
        assert_eq!(BingxClient::format_symbol("BTC-USDT"), "BTC-USDT");
        assert_eq!(BingxClient::format_symbol("USDT"), "USDT");
        assert_eq!(BingxClient::normalize_symbol("AERGO-USDT"), "AERGOUSDT");
    }

    #[test]
    fn hmac_signature_matches_reference_vector() {
        let signature = client()
            .sign("The quick brown fox jumps over the lazy dog")
            .unwrap();
        assert_eq!(
            signature,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn signed_query_appends_signature_last() {
        let query = client()
            .signed_query(&[("symbol", "BTC-USDT".to_string())])
            .unwrap();

        assert!(query.starts_with("symbol=BTC-USDT&timestamp="));
        assert!(query.contains("&recvWindow=5000&demoTrade=on&signature="));

        let (payload, signature) = query.rsplit_once("&signature=").unwrap();
        assert_eq!(client().sign(payload).unwrap(), signature);
    }

    #[test]
    fn config_debug_masks_keys() {
        let debug = format!("{:?}", BingxConfig::new("public", "secret"));
        assert!(!debug.contains("public"));
        assert!(!debug.contains("secret\""));
    }

    #[test]
    fn envelope_error_code_becomes_api_error() {
        let response: BingxResponse =
            serde_json::from_str(r#"{"code":80001,"msg":"rejected"}"#).unwrap();
        assert!(matches!(
            response.into_data(),
            Err(ExchangeError::ApiError { code: 80001, .. })
        ));
    }

    #[test]
    fn insufficient_margin_is_fatal() {
        let response: BingxResponse =
            serde_json::from_str(r#"{"code":101204,"msg":"Insufficient margin"}"#).unwrap();
        let err = response.into_data().unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientBalance(ref msg) if msg == "Insufficient margin"));
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }
}
