//! TradeLocker REST client.
//!
//! Authenticates once with email/password/server, selects one trading
//! account, and maps TradeLocker's column-array payloads onto the
//! gateway's types.

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::{Broker, BrokerError};
use crate::config::TradeLockerConfig;
use crate::types::{
    BrokerAccount, BrokerOrder, BrokerOrderParams, Instrument, OrderSide, PositionRecord, Quote,
};

const API_PREFIX: &str = "/backend-api";

// Column positions in `/positions` rows.
const POS_ID: usize = 0;
const POS_INSTRUMENT: usize = 1;
const POS_SIDE: usize = 3;
const POS_QTY: usize = 4;
const POS_AVG_PRICE: usize = 5;
const POS_UNREALIZED_PL: usize = 9;

// Column positions in `/orders` rows.
const ORD_ID: usize = 0;
const ORD_INSTRUMENT: usize = 1;
const ORD_QTY: usize = 3;
const ORD_SIDE: usize = 4;
const ORD_TYPE: usize = 5;
const ORD_STATUS: usize = 6;
const ORD_PRICE: usize = 9;
const ORD_STOP_PRICE: usize = 10;
const ORD_VALIDITY: usize = 11;
const ORD_POSITION_ID: usize = 16;
const ORD_STOP_LOSS: usize = 17;
const ORD_TAKE_PROFIT: usize = 19;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct InstrumentRoutes {
    trade: Option<i64>,
    info: Option<i64>,
}

/// Connected TradeLocker session bound to one account.
pub struct TradeLockerClient {
    client: Client,
    base_url: String,
    access_token: String,
    account_id: i64,
    acc_num: i64,
    /// instrument id -> routes, refreshed on every catalog fetch
    routes: DashMap<i64, InstrumentRoutes>,
    connected: AtomicBool,
}

impl TradeLockerClient {
    /// Log in and select the trading account.
    pub async fn connect(config: &TradeLockerConfig) -> Result<Self, BrokerError> {
        if config.username.is_empty() || config.password.is_empty() || config.server.is_empty() {
            return Err(BrokerError::Rejected(
                "TradeLocker credentials are not configured".to_string(),
            ));
        }

        let client = Client::new();
        let base_url = format!(
            "{}{}",
            config.environment.trim_end_matches('/'),
            API_PREFIX
        );

        let response = client
            .post(format!("{}/auth/jwt/token", base_url))
            .json(&json!({
                "email": config.username,
                "password": config.password,
                "server": config.server,
            }))
            .send()
            .await?;
        let token: TokenResponse = decode(response).await?;

        let response = client
            .get(format!("{}/auth/jwt/all-accounts", base_url))
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        let body: Value = decode(response).await?;
        let accounts = parse_accounts(&body)?;

        let account = match config.account_id {
            Some(id) => accounts.into_iter().find(|a| a.id == id).ok_or_else(|| {
                BrokerError::Rejected(format!("Account {} not found", id))
            })?,
            None => accounts
                .into_iter()
                .next()
                .ok_or_else(|| BrokerError::Rejected("No accounts found".to_string()))?,
        };

        info!(
            "TradeLocker session opened for account {} ({})",
            account.id, account.name
        );

        Ok(Self {
            client,
            base_url,
            access_token: token.access_token,
            account_id: account.id,
            acc_num: account.acc_num.unwrap_or(account.id),
            routes: DashMap::new(),
            connected: AtomicBool::new(true),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.access_token)
            .header("accNum", self.acc_num.to_string())
    }

    /// Send a request and return the decoded body. A 401 marks the session
    /// disconnected.
    async fn send_raw(&self, builder: RequestBuilder) -> Result<Value, BrokerError> {
        let response = builder.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("TradeLocker session rejected; marking broker disconnected");
            self.connected.store(false, Ordering::Relaxed);
        }
        decode(response).await
    }

    /// Send a request and return the `d` member of a successful reply.
    async fn send(&self, builder: RequestBuilder) -> Result<Value, BrokerError> {
        unwrap_data(self.send_raw(builder).await?)
    }

    fn account_path(&self, suffix: &str) -> String {
        format!("/trade/accounts/{}/{}", self.account_id, suffix)
    }

    async fn routes_for(&self, instrument_id: i64) -> Result<InstrumentRoutes, BrokerError> {
        if let Some(routes) = self.routes.get(&instrument_id) {
            return Ok(*routes);
        }
        self.list_instruments().await?;
        Ok(self
            .routes
            .get(&instrument_id)
            .map(|r| *r)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Broker for TradeLockerClient {
    fn name(&self) -> &'static str {
        "tradelocker"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn list_accounts(&self) -> Result<Vec<BrokerAccount>, BrokerError> {
        let body = self
            .send_raw(
                self.client
                    .get(format!("{}/auth/jwt/all-accounts", self.base_url))
                    .bearer_auth(&self.access_token),
            )
            .await?;
        let mut accounts = parse_accounts(&body)?;
        // Trading account first
        accounts.sort_by_key(|a| a.id != self.account_id);
        Ok(accounts)
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>, BrokerError> {
        let data = self
            .send(self.request(Method::GET, &self.account_path("instruments")))
            .await?;

        let instruments: Vec<Instrument> = data
            .get("instruments")
            .and_then(Value::as_array)
            .ok_or_else(|| BrokerError::Decode("missing instruments".to_string()))?
            .iter()
            .filter_map(parse_instrument)
            .collect();

        for instrument in &instruments {
            self.routes.insert(
                instrument.id,
                InstrumentRoutes {
                    trade: instrument.trade_route_id,
                    info: instrument.info_route_id,
                },
            );
        }
        debug!("Fetched {} TradeLocker instruments", instruments.len());
        Ok(instruments)
    }

    async fn list_positions(&self) -> Result<Vec<PositionRecord>, BrokerError> {
        let data = self
            .send(self.request(Method::GET, &self.account_path("positions")))
            .await?;
        rows(&data, "positions")?
            .iter()
            .map(parse_position_row)
            .collect()
    }

    async fn list_orders(&self) -> Result<Vec<BrokerOrder>, BrokerError> {
        let data = self
            .send(self.request(Method::GET, &self.account_path("orders")))
            .await?;
        rows(&data, "orders")?
            .iter()
            .map(parse_order_row)
            .collect()
    }

    async fn create_order(&self, params: &BrokerOrderParams) -> Result<String, BrokerError> {
        let routes = self.routes_for(params.instrument_id).await?;
        let route_id = routes.trade.ok_or_else(|| {
            BrokerError::Rejected(format!(
                "No trade route for instrument {}",
                params.instrument_id
            ))
        })?;

        let body = order_body(params, route_id);
        debug!("Submitting TradeLocker order: {}", body);

        let data = self
            .send(
                self.request(Method::POST, &self.account_path("orders"))
                    .json(&body),
            )
            .await?;

        data.get("orderId")
            .and_then(value_to_string)
            .ok_or_else(|| BrokerError::Decode("missing orderId".to_string()))
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        self.send(self.request(Method::DELETE, &format!("/trade/orders/{}", order_id)))
            .await?;
        Ok(())
    }

    fn supports_direct_close(&self) -> bool {
        true
    }

    async fn close_position(&self, position_id: &str) -> Result<Option<String>, BrokerError> {
        let data = self
            .send(
                self.request(Method::DELETE, &format!("/trade/positions/{}", position_id))
                    .json(&json!({ "qty": 0 })),
            )
            .await?;
        Ok(data.get("orderId").and_then(value_to_string))
    }

    async fn quote(&self, instrument: &Instrument) -> Result<Option<Quote>, BrokerError> {
        let route_id = match instrument.info_route_id {
            Some(id) => Some(id),
            None => self.routes_for(instrument.id).await?.info,
        };
        let Some(route_id) = route_id else {
            return Ok(None);
        };

        let data = self
            .send(self.request(Method::GET, "/trade/quotes").query(&[
                ("routeId", route_id.to_string()),
                ("tradableInstrumentId", instrument.id.to_string()),
            ]))
            .await?;

        let ask = data.get("ap").and_then(lenient_f64);
        let bid = data.get("bp").and_then(lenient_f64);
        Ok(match (ask, bid) {
            (Some(ask), Some(bid)) => Some(Quote { ask, bid }),
            _ => None,
        })
    }
}

// =============================================================================
// Decoding
// =============================================================================

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BrokerError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(BrokerError::Status {
            status: status.as_u16(),
            message: upstream_message(&text),
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| BrokerError::Decode(e.to_string()))
}

/// Best human-readable message from an error body.
fn upstream_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| {
            v.get("errmsg")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.to_string())
}

/// Unwrap TradeLocker's `{s, errmsg, d}` reply.
fn unwrap_data(body: Value) -> Result<Value, BrokerError> {
    if body.get("s").and_then(Value::as_str) == Some("error") {
        let message = body
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or("TradeLocker rejected the request");
        return Err(BrokerError::Rejected(message.to_string()));
    }
    Ok(body.get("d").cloned().unwrap_or(Value::Null))
}

fn rows<'a>(data: &'a Value, key: &str) -> Result<&'a Vec<Value>, BrokerError> {
    data.get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| BrokerError::Decode(format!("missing {}", key)))
}

/// Numbers arrive either as JSON numbers or numeric strings.
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_side(value: Option<&Value>) -> Result<OrderSide, BrokerError> {
    match value.and_then(Value::as_str) {
        Some("buy") => Ok(OrderSide::Buy),
        Some("sell") => Ok(OrderSide::Sell),
        other => Err(BrokerError::Decode(format!("unknown side {:?}", other))),
    }
}

fn parse_accounts(body: &Value) -> Result<Vec<BrokerAccount>, BrokerError> {
    let accounts = body
        .get("accounts")
        .and_then(Value::as_array)
        .ok_or_else(|| BrokerError::Decode("missing accounts".to_string()))?;

    accounts
        .iter()
        .map(|a| {
            Ok(BrokerAccount {
                id: a
                    .get("id")
                    .and_then(lenient_i64)
                    .ok_or_else(|| BrokerError::Decode("account without id".to_string()))?,
                name: a
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                currency: a
                    .get("currency")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                acc_num: a.get("accNum").and_then(lenient_i64),
                balance: a
                    .get("accountBalance")
                    .and_then(lenient_f64)
                    .unwrap_or(0.0),
                status: a
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

fn parse_instrument(value: &Value) -> Option<Instrument> {
    let id = value.get("tradableInstrumentId").and_then(lenient_i64)?;
    let symbol = value.get("name").and_then(Value::as_str)?.to_string();

    let route = |kind: &str| {
        value
            .get("routes")
            .and_then(Value::as_array)
            .and_then(|routes| {
                routes
                    .iter()
                    .find(|r| r.get("type").and_then(Value::as_str) == Some(kind))
            })
            .and_then(|r| r.get("id"))
            .and_then(lenient_i64)
    };

    Some(Instrument {
        id,
        symbol,
        description: value
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        instrument_type: value.get("type").and_then(Value::as_str).map(str::to_string),
        trade_route_id: route("TRADE"),
        info_route_id: route("INFO"),
        reference_price: None,
    })
}

fn parse_position_row(row: &Value) -> Result<PositionRecord, BrokerError> {
    let cols = row
        .as_array()
        .ok_or_else(|| BrokerError::Decode("position row is not an array".to_string()))?;
    let col = |i: usize| cols.get(i);

    Ok(PositionRecord {
        id: col(POS_ID)
            .and_then(value_to_string)
            .ok_or_else(|| BrokerError::Decode("position without id".to_string()))?,
        instrument_id: col(POS_INSTRUMENT)
            .and_then(lenient_i64)
            .ok_or_else(|| BrokerError::Decode("position without instrument".to_string()))?,
        symbol: None,
        side: parse_side(col(POS_SIDE))?,
        quantity: col(POS_QTY).and_then(lenient_f64),
        avg_price: col(POS_AVG_PRICE).and_then(lenient_f64),
        unrealized_pnl: col(POS_UNREALIZED_PL).and_then(lenient_f64),
    })
}

fn parse_order_row(row: &Value) -> Result<BrokerOrder, BrokerError> {
    let cols = row
        .as_array()
        .ok_or_else(|| BrokerError::Decode("order row is not an array".to_string()))?;
    let col = |i: usize| cols.get(i);
    let text = |i: usize| col(i).and_then(Value::as_str).map(str::to_string);

    Ok(BrokerOrder {
        id: col(ORD_ID)
            .and_then(value_to_string)
            .ok_or_else(|| BrokerError::Decode("order without id".to_string()))?,
        instrument_id: col(ORD_INSTRUMENT)
            .and_then(lenient_i64)
            .ok_or_else(|| BrokerError::Decode("order without instrument".to_string()))?,
        side: parse_side(col(ORD_SIDE))?,
        order_type: text(ORD_TYPE).unwrap_or_default(),
        quantity: col(ORD_QTY).and_then(lenient_f64).unwrap_or(0.0),
        price: col(ORD_PRICE).and_then(lenient_f64),
        stop_price: col(ORD_STOP_PRICE).and_then(lenient_f64),
        status: text(ORD_STATUS).unwrap_or_default(),
        validity: text(ORD_VALIDITY),
        stop_loss: col(ORD_STOP_LOSS).and_then(lenient_f64),
        take_profit: col(ORD_TAKE_PROFIT).and_then(lenient_f64),
        position_id: col(ORD_POSITION_ID)
            .and_then(value_to_string)
            .filter(|id| id != "0"),
    })
}

/// TradeLocker order body for the given parameters.
fn order_body(params: &BrokerOrderParams, route_id: i64) -> Value {
    let mut body = json!({
        "tradableInstrumentId": params.instrument_id,
        "qty": params.quantity,
        "side": params.side.as_str(),
        "type": params.order_type.as_str(),
        "validity": params.validity.as_str(),
        "routeId": route_id,
    });

    let optional = [
        ("price", params.price.map(Value::from)),
        ("stopPrice", params.stop_price.map(Value::from)),
        ("stopLoss", params.stop_loss.map(Value::from)),
        (
            "stopLossType",
            params.stop_loss_type.map(|t| Value::from(t.as_str())),
        ),
        ("takeProfit", params.take_profit.map(Value::from)),
        (
            "takeProfitType",
            params.take_profit_type.map(|t| Value::from(t.as_str())),
        ),
        ("trStopOffset", params.trailing_distance.map(Value::from)),
    ];

    if let Some(obj) = body.as_object_mut() {
        for (key, value) in optional {
            if let Some(v) = value {
                obj.insert(key.to_string(), v);
            }
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LevelType, OrderType, Validity};

    #[test]
    fn test_parse_accounts_with_string_numbers() {
        let body = json!({
            "accounts": [{
                "id": "12345",
                "name": "Demo",
                "currency": "USD",
                "accNum": "2",
                "accountBalance": "1000.50",
                "status": "ACTIVE"
            }]
        });

        let accounts = parse_accounts(&body).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, 12345);
        assert_eq!(accounts[0].acc_num, Some(2));
        assert_eq!(accounts[0].balance, 1000.5);
    }

    #[test]
    fn test_parse_instrument_routes() {
        let value = json!({
            "tradableInstrumentId": 206,
            "name": "BTCUSD.TTF",
            "description": "Bitcoin",
            "type": "CRYPTO",
            "routes": [{"id": 451, "type": "INFO"}, {"id": 452, "type": "TRADE"}]
        });

        let instrument = parse_instrument(&value).unwrap();
        assert_eq!(instrument.id, 206);
        assert_eq!(instrument.symbol, "BTCUSD.TTF");
        assert_eq!(instrument.info_route_id, Some(451));
        assert_eq!(instrument.trade_route_id, Some(452));
    }

    #[test]
    fn test_parse_position_row() {
        let row = json!([
            "7001", "206", "452", "buy", "2", "100", null, null, "1700000000000", "5"
        ]);

        let position = parse_position_row(&row).unwrap();
        assert_eq!(position.id, "7001");
        assert_eq!(position.instrument_id, 206);
        assert_eq!(position.side, OrderSide::Buy);
        assert_eq!(position.quantity, Some(2.0));
        assert_eq!(position.avg_price, Some(100.0));
        assert_eq!(position.unrealized_pnl, Some(5.0));
    }

    #[test]
    fn test_parse_short_position_row_without_pnl() {
        let row = json!(["7002", 206, 452, "sell", 1.5, 99.5]);
        let position = parse_position_row(&row).unwrap();
        assert_eq!(position.side, OrderSide::Sell);
        assert_eq!(position.unrealized_pnl, None);
    }

    #[test]
    fn test_parse_order_row() {
        let row = json!([
            "9001", "206", "452", "0.5", "sell", "limit", "New", "0", "0", "101.5", null,
            "GTC", null, "1700000000000", "1700000000000", "true", "0", "105", "absolute",
            "95", "absolute", null
        ]);

        let order = parse_order_row(&row).unwrap();
        assert_eq!(order.id, "9001");
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.order_type, "limit");
        assert_eq!(order.price, Some(101.5));
        assert_eq!(order.stop_price, None);
        assert_eq!(order.validity.as_deref(), Some("GTC"));
        assert_eq!(order.position_id, None);
        assert_eq!(order.stop_loss, Some(105.0));
        assert_eq!(order.take_profit, Some(95.0));
    }

    #[test]
    fn test_unwrap_data_error_reply() {
        let body = json!({"s": "error", "errmsg": "Insufficient margin"});
        let err = unwrap_data(body).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient margin");
    }

    #[test]
    fn test_unwrap_data_ok_reply() {
        let body = json!({"s": "ok", "d": {"orderId": "55"}});
        let data = unwrap_data(body).unwrap();
        assert_eq!(data["orderId"], "55");
    }

    #[test]
    fn test_upstream_message_prefers_errmsg() {
        assert_eq!(upstream_message(r#"{"errmsg":"bad token"}"#), "bad token");
        assert_eq!(upstream_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_order_body_includes_only_present_fields() {
        let mut params =
            BrokerOrderParams::base(206, 1.0, OrderSide::Buy, OrderType::Limit, Validity::Gtc);
        params.price = Some(100.0);
        params.stop_loss = Some(95.0);
        params.stop_loss_type = Some(LevelType::Absolute);

        let body = order_body(&params, 452);
        let obj = body.as_object().unwrap();

        assert_eq!(body["routeId"], 452);
        assert_eq!(body["type"], "limit");
        assert_eq!(body["price"], 100.0);
        assert_eq!(body["stopLossType"], "absolute");
        assert!(!obj.contains_key("takeProfit"));
        assert!(!obj.contains_key("stopPrice"));
        assert!(!obj.contains_key("trStopOffset"));
    }

    #[tokio::test]
    async fn test_connect_requires_credentials() {
        let err = TradeLockerClient::connect(&TradeLockerConfig::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "TradeLocker credentials are not configured");
    }

    #[tokio::test]
    async fn test_rejected_session_on_account_list_disconnects() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Answers every request with 401
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await;
            }
        });

        let client = TradeLockerClient {
            client: Client::new(),
            base_url: format!("http://{}{}", addr, API_PREFIX),
            access_token: "expired".to_string(),
            account_id: 1,
            acc_num: 1,
            routes: DashMap::new(),
            connected: AtomicBool::new(true),
        };

        assert!(client.list_accounts().await.is_err());
        assert!(!client.is_connected());
    }
}
