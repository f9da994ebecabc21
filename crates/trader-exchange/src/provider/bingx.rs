//! BingX ExchangeGateway 구현.
//!
//! BingxClient를 래핑하여 응답 JSON을 거래소 중립 타입으로 변환합니다.
//!
//! # 아키텍처
//!
//! ```text
//! BingxGateway
//! ├── place_entry_order() - 시장가 + STOP_MARKET + TAKE_PROFIT_MARKET 묶음 주문
//! ├── current_price()     - 공개 시세 (재시도)
//! ├── open_positions()    - 포지션 (재시도, 심볼 정규화)
//! ├── order_history()     - FILLED 주문 내역 (재시도, 100404 → 빈 목록)
//! ├── cancel_order()      - best-effort 취소
//! ├── set_leverage()
//! ├── account_balance()   - USDT/VST 잔고 (재시도)
//! └── open_orders()       - 미체결 주문 (재시도)
//! ```
//!
//! 조회 요청만 재시도하며, 주문 제출/취소/레버리지 설정은 단일 시도입니다.

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};
use trader_core::{
    AssetBalance, EntryOrderRequest, ExchangeGateway, HistoricalOrder, OpenOrder, OrderResult,
    Position, PositionSide, ProviderError, Side, UNKNOWN_ORDER_ID,
};

use crate::connector::bingx::{BingxClient, HISTORY_UNAVAILABLE_CODE};
use crate::retry::{with_retry, RetryConfig};
use crate::to_provider_error;

/// 주문 응답(`data`)에서 주문 ID를 찾는 순서.
const ORDER_ID_PATHS: &[&[&str]] = &[&["order", "orderId"], &["orderID"], &["id"], &["orderId"]];

/// 시세 응답 본문에서 가격을 찾는 순서.
const PRICE_PATHS: &[&[&str]] = &[&["data", "price"], &["price"]];

const FILLED_STATUS: &str = "FILLED";

// ==================== 응답 해석 ====================

/// 주문 응답에서 주문 ID를 추출합니다.
///
/// [`ORDER_ID_PATHS`] 순서대로 처음 발견된 값을 사용하고,
/// 어디에도 없으면 [`UNKNOWN_ORDER_ID`]를 반환합니다.
pub fn extract_order_id(data: &Value) -> String {
    ORDER_ID_PATHS
        .iter()
        .find_map(|path| lookup(data, path).and_then(as_text))
        .unwrap_or_else(|| UNKNOWN_ORDER_ID.to_string())
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn text_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(as_text)
}

fn decimal_field(item: &Value, key: &str) -> Option<Decimal> {
    item.get(key).and_then(as_decimal)
}

/// `data.<key>` 배열, 또는 `data` 자체가 배열인 경우 그 배열.
fn array_at<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    data.get(key)
        .and_then(Value::as_array)
        .or_else(|| data.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn parse_position(item: &Value) -> Option<Position> {
    let symbol = BingxClient::normalize_symbol(&text_field(item, "symbol")?);
    let amount = decimal_field(item, "positionAmt")?;
    if amount.is_zero() {
        return None;
    }

    let side = match item.get("positionSide").and_then(Value::as_str) {
        Some("LONG") => PositionSide::Long,
        Some("SHORT") => PositionSide::Short,
        _ => PositionSide::Both,
    };

    Some(Position {
        symbol,
        side,
        quantity: amount.abs(),
        avg_price: decimal_field(item, "avgPrice").unwrap_or_default(),
        liquidation_price: decimal_field(item, "liquidationPrice"),
        unrealized_pnl: decimal_field(item, "unrealizedProfit").unwrap_or_default(),
    })
}

fn parse_historical_order(item: &Value) -> Option<HistoricalOrder> {
    Some(HistoricalOrder {
        order_id: text_field(item, "orderId")?,
        client_order_id: text_field(item, "clientOrderId")
            .or_else(|| text_field(item, "clientOrderID")),
        order_type: text_field(item, "type").unwrap_or_default(),
        status: text_field(item, "status").unwrap_or_default(),
    })
}

fn parse_open_order(item: &Value) -> Option<OpenOrder> {
    Some(OpenOrder {
        symbol: BingxClient::normalize_symbol(&text_field(item, "symbol")?),
        order_id: text_field(item, "orderId")?,
        side: text_field(item, "side").unwrap_or_default(),
        order_type: text_field(item, "type").unwrap_or_default(),
        quantity: decimal_field(item, "origQty")
            .or_else(|| decimal_field(item, "quantity"))
            .unwrap_or_default(),
        price: decimal_field(item, "price").filter(|p| !p.is_zero()),
        status: text_field(item, "status").unwrap_or_default(),
    })
}

fn parse_balance(item: &Value) -> Option<AssetBalance> {
    Some(AssetBalance {
        asset: text_field(item, "asset")?,
        available_balance: decimal_field(item, "availableMargin")
            .or_else(|| decimal_field(item, "balance"))
            .unwrap_or_default(),
        equity: decimal_field(item, "equity").unwrap_or_default(),
        unrealized_pnl: decimal_field(item, "unrealizedProfit").unwrap_or_default(),
    })
}

// ==================== 주문 파라미터 ====================

fn entry_order_params(request: &EntryOrderRequest) -> Vec<(&'static str, String)> {
    let position_side = match request.side {
        Side::Buy => "LONG",
        Side::Sell => "SHORT",
    };

    let mut params = vec![
        ("symbol", BingxClient::format_symbol(&request.symbol)),
        ("side", request.side.as_str().to_string()),
        ("positionSide", position_side.to_string()),
        ("type", "MARKET".to_string()),
        ("quantity", request.quantity.normalize().to_string()),
    ];

    if let Some(stop) = request.stop_price {
        params.push(("stopLoss", bracket_leg("STOP_MARKET", request.quantity, stop)));
    }
    if let Some(take_profit) = request.take_profit_price {
        params.push((
            "takeProfit",
            bracket_leg("TAKE_PROFIT_MARKET", request.quantity, take_profit),
        ));
    }
    if let Some(client_order_id) = &request.client_order_id {
        params.push(("clientOrderID", client_order_id.clone()));
    }

    params
}

/// 진입 주문에 첨부되는 손절/익절 JSON.
fn bracket_leg(order_type: &str, quantity: Decimal, price: Decimal) -> String {
    format!(
        r#"{{"type":"{}","quantity":{},"stopPrice":{},"workingType":"MARK_PRICE"}}"#,
        order_type,
        quantity.normalize(),
        price.normalize()
    )
}

// ==================== Gateway ====================

/// BingX 무기한 선물 게이트웨이.
pub struct BingxGateway {
    client: Arc<BingxClient>,
    retry: RetryConfig,
}

impl BingxGateway {
    pub fn new(client: Arc<BingxClient>) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
        }
    }

    pub fn from_client(client: BingxClient) -> Self {
        Self::new(Arc::new(client))
    }

    /// 조회 요청 재시도 설정 변경.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl ExchangeGateway for BingxGateway {
    fn exchange_name(&self) -> &str {
        "bingx"
    }

    async fn place_entry_order(
        &self,
        request: &EntryOrderRequest,
    ) -> Result<OrderResult, ProviderError> {
        let params = entry_order_params(request);
        let data = self
            .client
            .place_order(&params)
            .await
            .map_err(to_provider_error)?;

        let order_id = extract_order_id(&data);
        if order_id == UNKNOWN_ORDER_ID {
            warn!(symbol = %request.symbol, "주문 응답에서 주문 ID를 찾지 못함");
        }
        info!(
            symbol = %request.symbol,
            side = %request.side,
            quantity = %request.quantity,
            order_id = %order_id,
            "BingX 진입 주문 접수"
        );

        Ok(OrderResult { order_id, raw: data })
    }

    async fn current_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        let body = with_retry(&self.retry, || self.client.get_price(symbol))
            .await
            .map_err(to_provider_error)?;

        if let Some(code) = body.get("code").and_then(Value::as_i64) {
            if code != 0 {
                let msg = text_field(&body, "msg").unwrap_or_default();
                return Err(ProviderError::Api(format!("시세 조회 실패 ({}): {}", code, msg)));
            }
        }

        PRICE_PATHS
            .iter()
            .find_map(|path| lookup(&body, path).and_then(as_decimal))
            .ok_or_else(|| ProviderError::Parse(format!("{} 시세 응답에 가격 없음", symbol)))
    }

    async fn open_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>, ProviderError> {
        let data = with_retry(&self.retry, || self.client.get_positions(symbol))
            .await
            .map_err(to_provider_error)?;

        let positions: Vec<Position> = array_at(&data, "positions")
            .iter()
            .filter_map(parse_position)
            .collect();
        debug!(count = positions.len(), "BingX 포지션 조회");
        Ok(positions)
    }

    async fn order_history(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<HistoricalOrder>, ProviderError> {
        let response = with_retry(&self.retry, || self.client.get_order_history(symbol, limit))
            .await
            .map_err(to_provider_error)?;

        if response.code == HISTORY_UNAVAILABLE_CODE {
            warn!(symbol, "주문 내역 엔드포인트 사용 불가, 빈 목록 반환");
            return Ok(Vec::new());
        }

        let data = response.into_data().map_err(to_provider_error)?;
        let Some(orders) = data.get("orders").and_then(Value::as_array) else {
            warn!(symbol, "주문 내역 응답에 orders 없음, 빈 목록 반환");
            return Ok(Vec::new());
        };

        Ok(orders
            .iter()
            .filter_map(parse_historical_order)
            .filter(|order| order.status == FILLED_STATUS)
            .collect())
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), ProviderError> {
        self.client
            .cancel_order(symbol, order_id)
            .await
            .map_err(to_provider_error)?;
        info!(symbol, order_id, "BingX 주문 취소");
        Ok(())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ProviderError> {
        self.client
            .set_leverage(symbol, leverage)
            .await
            .map_err(to_provider_error)?;
        info!(symbol, leverage, "BingX 레버리지 설정");
        Ok(())
    }

    async fn account_balance(&self) -> Result<Vec<AssetBalance>, ProviderError> {
        let data = with_retry(&self.retry, || self.client.get_balance())
            .await
            .map_err(to_provider_error)?;

        // `balance`가 단일 객체 또는 배열로 온다
        let balances: Vec<AssetBalance> = match data.get("balance") {
            Some(Value::Array(items)) => items.iter().filter_map(parse_balance).collect(),
            Some(item @ Value::Object(_)) => parse_balance(item).into_iter().collect(),
            _ => Vec::new(),
        };

        if balances.is_empty() {
            return Err(ProviderError::Parse("계좌 응답에 잔고 없음".to_string()));
        }
        Ok(balances)
    }

    async fn open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, ProviderError> {
        let data = with_retry(&self.retry, || self.client.get_open_orders(symbol))
            .await
            .map_err(to_provider_error)?;

        Ok(array_at(&data, "orders")
            .iter()
            .filter_map(parse_open_order)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server, ServerGuard};
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::connector::bingx::BingxConfig;

    fn gateway(server: &ServerGuard) -> BingxGateway {
        let config = BingxConfig::new("test-key", "test-secret").with_base_url(server.url());
        BingxGateway::from_client(BingxClient::new(config)).with_retry(RetryConfig::no_retry())
    }

    #[test]
    fn order_id_fallback_chain() {
        assert_eq!(extract_order_id(&json!({"order": {"orderId": "A1"}})), "A1");
        assert_eq!(extract_order_id(&json!({"orderID": 42})), "42");
        assert_eq!(extract_order_id(&json!({"id": "x-9"})), "x-9");
        assert_eq!(extract_order_id(&json!({"orderId": 7})), "7");
        assert_eq!(extract_order_id(&json!({"order": {}})), UNKNOWN_ORDER_ID);
        assert_eq!(extract_order_id(&Value::Null), UNKNOWN_ORDER_ID);

        // 앞선 경로가 우선
        assert_eq!(
            extract_order_id(&json!({"order": {"orderId": "first"}, "id": "later"})),
            "first"
        );
        // 빈 문자열은 없는 것으로 취급
        assert_eq!(extract_order_id(&json!({"orderID": "", "id": "fallback"})), "fallback");
    }

    #[test]
    fn bracket_legs_are_plain_json_numbers() {
        let request = EntryOrderRequest::market("AERGOUSDT", Side::Buy, dec!(87.100))
            .with_stop(dec!(0.1143))
            .with_take_profit(dec!(0.11547));
        let params = entry_order_params(&request);

        let stop = params.iter().find(|(k, _)| *k == "stopLoss").unwrap();
        let parsed: Value = serde_json::from_str(&stop.1).unwrap();
        assert_eq!(parsed["type"], "STOP_MARKET");
        assert_eq!(parsed["stopPrice"], json!(0.1143));
        assert_eq!(parsed["quantity"], json!(87.1));

        assert!(params.contains(&("positionSide", "LONG".to_string())));
        assert!(params.contains(&("symbol", "AERGO-USDT".to_string())));
    }

    #[tokio::test]
    async fn place_entry_order_posts_signed_bracket_order() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/openApi/swap/v2/trade/order")
            .match_header("X-BX-APIKEY", "test-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("symbol=AERGO-USDT".to_string()),
                Matcher::Regex("side=BUY".to_string()),
                Matcher::Regex("stopLoss=".to_string()),
                Matcher::Regex("takeProfit=".to_string()),
                Matcher::Regex("signature=[0-9a-f]{64}$".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"code":0,"msg":"","data":{"order":{"orderId":1735950529123456789}}}"#)
            .create_async()
            .await;

        let request = EntryOrderRequest::market("AERGOUSDT", Side::Buy, dec!(87.1))
            .with_stop(dec!(0.1143))
            .with_take_profit(dec!(0.11547));
        let result = gateway(&server).place_entry_order(&request).await.unwrap();

        assert_eq!(result.order_id, "1735950529123456789");
        assert!(result.has_order_id());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_order_surfaces_api_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/openApi/swap/v2/trade/order")
            .with_status(200)
            .with_body(r#"{"code":101204,"msg":"Insufficient margin"}"#)
            .create_async()
            .await;

        let request = EntryOrderRequest::market("AERGOUSDT", Side::Buy, dec!(1));
        let err = gateway(&server).place_entry_order(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api(ref msg) if msg.contains("잔고 부족")));
    }

    #[tokio::test]
    async fn positions_are_normalized_and_empty_slots_dropped() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/openApi/swap/v2/user/positions")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "code": 0,
                    "data": [
                        {"symbol": "AERGO-USDT", "positionSide": "LONG", "positionAmt": "87.1",
                         "avgPrice": "0.11477", "liquidationPrice": "0.0921", "unrealizedProfit": "0.31"},
                        {"symbol": "BTC-USDT", "positionSide": "SHORT", "positionAmt": "0",
                         "avgPrice": "0", "unrealizedProfit": "0"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let positions = gateway(&server).open_positions(None).await.unwrap();

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol, "AERGOUSDT");
        assert_eq!(positions[0].side, PositionSide::Long);
        assert_eq!(positions[0].quantity, dec!(87.1));
        assert_eq!(positions[0].liquidation_price, Some(dec!(0.0921)));
    }

    #[tokio::test]
    async fn unavailable_history_is_empty_not_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/openApi/swap/v2/trade/historyOrders")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code":100404,"msg":"api is not exist"}"#)
            .create_async()
            .await;

        let history = gateway(&server).order_history("XYZUSDT", 50).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn history_keeps_only_filled_orders() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/openApi/swap/v2/trade/historyOrders")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".to_string(), "XYZ-USDT".to_string()),
                Matcher::UrlEncoded("limit".to_string(), "50".to_string()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "code": 0,
                    "data": {"orders": [
                        {"orderId": 123, "type": "TAKE_PROFIT_MARKET", "status": "FILLED"},
                        {"orderId": 124, "type": "STOP_MARKET", "status": "CANCELLED"},
                        {"orderId": 125, "clientOrderId": "cli-1", "type": "MARKET", "status": "FILLED"}
                    ]}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let history = gateway(&server).order_history("XYZUSDT", 50).await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].order_id, "123");
        assert!(history[0].is_take_profit());
        assert_eq!(history[1].client_order_id.as_deref(), Some("cli-1"));
    }

    #[tokio::test]
    async fn price_is_read_from_data_or_top_level() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/openApi/swap/v1/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".to_string(), "XYZ-USDT".to_string()))
            .with_status(200)
            .with_body(r#"{"code":0,"data":{"symbol":"XYZ-USDT","price":"1.2345"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/openApi/swap/v1/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".to_string(), "ABC-USDT".to_string()))
            .with_status(200)
            .with_body(r#"{"price":"2.5"}"#)
            .create_async()
            .await;

        let gateway = gateway(&server);
        assert_eq!(gateway.current_price("XYZUSDT").await.unwrap(), dec!(1.2345));
        assert_eq!(gateway.current_price("ABCUSDT").await.unwrap(), dec!(2.5));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/openApi/swap/v2/user/balance")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let err = gateway(&server).account_balance().await.unwrap_err();
        assert!(matches!(err, ProviderError::Authentication(_)));
    }

    #[tokio::test]
    async fn balance_accepts_single_object() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/openApi/swap/v2/user/balance")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"code":0,"data":{"balance":{"asset":"VST","balance":"1000","availableMargin":"950.5","equity":"1001","unrealizedProfit":"1"}}}"#,
            )
            .create_async()
            .await;

        let balances = gateway(&server).account_balance().await.unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].asset, "VST");
        assert_eq!(balances[0].available_balance, dec!(950.5));
    }
}
