//! Account Types
//!
//! Raw account and position rows from the broker, and the derived
//! account snapshot.

use serde::{Deserialize, Serialize};

use super::order::OrderSide;

/// Account as listed by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerAccount {
    pub id: i64,
    pub name: String,
    pub currency: String,
    /// Account number used for routing on some brokers.
    pub acc_num: Option<i64>,
    pub balance: f64,
    pub status: String,
}

/// Open position as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: String,
    pub instrument_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub side: OrderSide,
    pub quantity: Option<f64>,
    pub avg_price: Option<f64>,
    pub unrealized_pnl: Option<f64>,
}

impl PositionRecord {
    /// Absolute notional value, when both quantity and price are known.
    pub fn position_value(&self) -> Option<f64> {
        match (self.quantity, self.avg_price) {
            (Some(qty), Some(price)) => Some((qty * price).abs()),
            _ => None,
        }
    }
}

/// Derived account metrics plus the open positions they were computed from.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSnapshot {
    pub account_id: i64,
    pub account_name: String,
    pub currency: String,
    pub balance: f64,
    pub equity: f64,
    pub margin_used: f64,
    pub margin_available: f64,
    pub margin_level: f64,
    pub free_margin: f64,
    pub total_positions_value: f64,
    pub unrealized_pnl: f64,
    pub positions_count: usize,
    pub account_status: String,
    pub positions: Vec<PositionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountsPayload {
    pub accounts: Vec<BrokerAccount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionsPayload {
    pub positions: Vec<PositionRecord>,
}

/// How a position close was achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseMethod {
    /// Broker's native close-by-id removed the position
    Direct,
    /// An opposite market order neutralized the exposure
    OffsettingOrder,
}

/// Result of a successful position close.
#[derive(Debug, Clone, Serialize)]
pub struct PositionClosed {
    pub position_id: String,
    pub order_id: String,
    pub status: String,
    pub close_method: CloseMethod,
    pub message: String,
}
