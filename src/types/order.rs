//! Order Types
//!
//! Client order intents, the validated request, the parameter set sent to
//! the broker, and the audit record written after a successful submit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// Enums
// =============================================================================

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Execute immediately at best available price
    Market,
    /// Execute at specified price or better
    Limit,
    /// Becomes a market order once the stop price trades
    Stop,
    /// Becomes a limit order once the stop price trades
    StopLimit,
}

impl OrderType {
    pub const ALL: [OrderType; 4] = [
        OrderType::Market,
        OrderType::Limit,
        OrderType::Stop,
        OrderType::StopLimit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::Stop => "stop",
            OrderType::StopLimit => "stop_limit",
        }
    }

    /// Whether a limit price is mandatory.
    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    /// Whether a stop trigger price is mandatory.
    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }

    /// Validity applied when the client does not choose one.
    pub fn default_validity(&self) -> Validity {
        match self {
            OrderType::Market => Validity::Ioc,
            _ => Validity::Gtc,
        }
    }
}

impl FromStr for OrderType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub const ALL: [OrderSide; 2] = [OrderSide::Buy, OrderSide::Sell];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }

    /// The opposite side, used to offset an open position.
    pub fn flipped(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl FromStr for OrderSide {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderSide::ALL
            .into_iter()
            .find(|side| side.as_str() == s)
            .ok_or(())
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Validity {
    /// Good till cancelled
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
}

impl Validity {
    pub const ALL: [Validity; 3] = [Validity::Gtc, Validity::Ioc, Validity::Fok];

    pub fn as_str(&self) -> &'static str {
        match self {
            Validity::Gtc => "GTC",
            Validity::Ioc => "IOC",
            Validity::Fok => "FOK",
        }
    }
}

impl FromStr for Validity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Validity::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or(())
    }
}

/// How a stop-loss or take-profit level is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LevelType {
    Absolute,
    Offset,
    TrailingOffset,
}

impl LevelType {
    pub const ALL: [LevelType; 3] = [
        LevelType::Absolute,
        LevelType::Offset,
        LevelType::TrailingOffset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LevelType::Absolute => "absolute",
            LevelType::Offset => "offset",
            LevelType::TrailingOffset => "trailingOffset",
        }
    }
}

impl FromStr for LevelType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LevelType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Raw order intent as posted by a client.
///
/// Every field is optional so missing and unknown values reach the
/// normalizer instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: Option<String>,
    pub order_type: Option<String>,
    pub side: Option<String>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub stop_loss_type: Option<String>,
    pub take_profit: Option<f64>,
    pub take_profit_type: Option<String>,
    pub trailing_distance: Option<f64>,
    pub validity: Option<String>,
    pub user_id: Option<String>,
}

/// An order intent that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub stop_loss_type: Option<LevelType>,
    pub take_profit: Option<f64>,
    pub take_profit_type: Option<LevelType>,
    pub trailing_distance: Option<f64>,
    pub validity: Option<Validity>,
    pub user_id: String,
}

impl OrderRequest {
    /// Explicit validity, or the default for the order type.
    pub fn effective_validity(&self) -> Validity {
        self.validity
            .unwrap_or_else(|| self.order_type.default_validity())
    }
}

/// Parameter set submitted to the upstream broker.
///
/// Optional fields are omitted entirely when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrderParams {
    pub instrument_id: i64,
    pub quantity: f64,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub validity: Validity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_type: Option<LevelType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_type: Option<LevelType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_distance: Option<f64>,
}

impl BrokerOrderParams {
    /// The required-field base every order starts from.
    pub fn base(
        instrument_id: i64,
        quantity: f64,
        side: OrderSide,
        order_type: OrderType,
        validity: Validity,
    ) -> Self {
        Self {
            instrument_id,
            quantity,
            side,
            order_type,
            validity,
            price: None,
            stop_price: None,
            stop_loss: None,
            stop_loss_type: None,
            take_profit: None,
            take_profit_type: None,
            trailing_distance: None,
        }
    }

    /// Market IOC order on the opposite side of a position.
    pub fn offsetting(instrument_id: i64, position_side: OrderSide, quantity: f64) -> Self {
        Self::base(
            instrument_id,
            quantity.abs(),
            position_side.flipped(),
            OrderType::Market,
            Validity::Ioc,
        )
    }
}

// =============================================================================
// Upstream records
// =============================================================================

/// An order as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrder {
    pub id: String,
    pub instrument_id: i64,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: String,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub status: String,
    pub validity: Option<String>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub position_id: Option<String>,
}

// =============================================================================
// Audit
// =============================================================================

/// Order record written to the audit store after a successful submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAuditRecord {
    pub order_id: String,
    pub user_id: String,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub status: String,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderAuditRecord {
    /// Build a record for a freshly created order. Absent prices are
    /// recorded as 0.
    pub fn created(order_id: &str, request: &OrderRequest) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.to_string(),
            user_id: request.user_id.clone(),
            symbol: request.symbol.clone(),
            order_type: request.order_type,
            side: request.side,
            quantity: request.quantity,
            price: request.price.unwrap_or(0.0),
            status: "created".to_string(),
            stop_loss: request.stop_loss.unwrap_or(0.0),
            take_profit: request.take_profit.unwrap_or(0.0),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Response payloads
// =============================================================================

/// Result of creating or cancelling an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrdersPayload {
    pub orders: Vec<BrokerOrder>,
}
