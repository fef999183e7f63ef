//! Paper broker
//!
//! Simulated in-process broker. Market orders fill immediately at the
//! quoted side of a fixed spread around each instrument's reference price;
//! every other order type rests as a working order.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{Broker, BrokerError};
use crate::types::{
    BrokerAccount, BrokerOrder, BrokerOrderParams, Instrument, OrderSide, OrderType,
    PositionRecord, Quote,
};

/// Half of the bid/ask spread, as a fraction of the reference price.
const HALF_SPREAD: f64 = 0.0001;

const PAPER_ACCOUNT_ID: i64 = 1;

fn default_instruments() -> Vec<Instrument> {
    [
        (1, "EURUSD", "Euro vs US Dollar", "FOREX", 1.0850),
        (2, "GBPUSD", "British Pound vs US Dollar", "FOREX", 1.2700),
        (3, "XAUUSD", "Gold vs US Dollar", "CFD", 2350.0),
        (4, "BTCUSD", "Bitcoin vs US Dollar", "CRYPTO", 65_000.0),
        (5, "ETHUSD", "Ether vs US Dollar", "CRYPTO", 3_200.0),
    ]
    .into_iter()
    .map(|(id, symbol, description, kind, price)| Instrument {
        id,
        symbol: symbol.to_string(),
        description: Some(description.to_string()),
        instrument_type: Some(kind.to_string()),
        trade_route_id: None,
        info_route_id: None,
        reference_price: Some(price),
    })
    .collect()
}

/// In-memory broker with a single account.
pub struct PaperBroker {
    account: BrokerAccount,
    instruments: Vec<Instrument>,
    positions: DashMap<String, PositionRecord>,
    orders: DashMap<String, BrokerOrder>,
    next_id: AtomicU64,
}

impl PaperBroker {
    /// Create a paper broker seeded with the default instrument catalog.
    pub fn new(starting_balance: f64) -> Self {
        Self::with_instruments(starting_balance, default_instruments())
    }

    /// Create a paper broker with a custom instrument catalog.
    pub fn with_instruments(starting_balance: f64, instruments: Vec<Instrument>) -> Self {
        Self {
            account: BrokerAccount {
                id: PAPER_ACCOUNT_ID,
                name: "Paper Account".to_string(),
                currency: "USD".to_string(),
                acc_num: Some(1),
                balance: starting_balance,
                status: "ACTIVE".to_string(),
            },
            instruments,
            positions: DashMap::new(),
            orders: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn instrument(&self, id: i64) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    fn quote_for(instrument: &Instrument) -> Option<Quote> {
        instrument.reference_price.map(|price| Quote {
            ask: price * (1.0 + HALF_SPREAD),
            bid: price * (1.0 - HALF_SPREAD),
        })
    }

    /// Mark-to-mid unrealized P&L of a position.
    fn unrealized_pnl(&self, position: &PositionRecord) -> Option<f64> {
        let mid = self
            .instrument(position.instrument_id)
            .and_then(|i| i.reference_price)?;
        let qty = position.quantity?;
        let avg = position.avg_price?;
        Some(match position.side {
            OrderSide::Buy => (mid - avg) * qty,
            OrderSide::Sell => (avg - mid) * qty,
        })
    }
}

#[async_trait]
impl Broker for PaperBroker {
    fn name(&self) -> &'static str {
        "paper"
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn list_accounts(&self) -> Result<Vec<BrokerAccount>, BrokerError> {
        Ok(vec![self.account.clone()])
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>, BrokerError> {
        Ok(self.instruments.clone())
    }

    async fn list_positions(&self) -> Result<Vec<PositionRecord>, BrokerError> {
        let mut positions: Vec<PositionRecord> = self
            .positions
            .iter()
            .map(|entry| {
                let mut position = entry.value().clone();
                position.unrealized_pnl = self.unrealized_pnl(&position);
                position
            })
            .collect();
        positions.sort_by_key(|p| p.id.parse::<u64>().unwrap_or(u64::MAX));
        Ok(positions)
    }

    async fn list_orders(&self) -> Result<Vec<BrokerOrder>, BrokerError> {
        let mut orders: Vec<BrokerOrder> =
            self.orders.iter().map(|entry| entry.value().clone()).collect();
        orders.sort_by_key(|o| o.id.parse::<u64>().unwrap_or(u64::MAX));
        Ok(orders)
    }

    async fn create_order(&self, params: &BrokerOrderParams) -> Result<String, BrokerError> {
        let instrument = self.instrument(params.instrument_id).ok_or_else(|| {
            BrokerError::Rejected(format!("Unknown instrument {}", params.instrument_id))
        })?;

        let order_id = self.next_id();
        let mut order = BrokerOrder {
            id: order_id.clone(),
            instrument_id: params.instrument_id,
            side: params.side,
            order_type: params.order_type.to_string(),
            quantity: params.quantity,
            price: params.price,
            stop_price: params.stop_price,
            status: "working".to_string(),
            validity: Some(params.validity.as_str().to_string()),
            stop_loss: params.stop_loss,
            take_profit: params.take_profit,
            position_id: None,
        };

        if params.order_type == OrderType::Market {
            let quote = Self::quote_for(instrument).ok_or_else(|| {
                BrokerError::Rejected(format!("No price for instrument {}", instrument.symbol))
            })?;
            let fill_price = match params.side {
                OrderSide::Buy => quote.ask,
                OrderSide::Sell => quote.bid,
            };

            let position_id = self.next_id();
            self.positions.insert(
                position_id.clone(),
                PositionRecord {
                    id: position_id.clone(),
                    instrument_id: instrument.id,
                    symbol: Some(instrument.symbol.clone()),
                    side: params.side,
                    quantity: Some(params.quantity),
                    avg_price: Some(fill_price),
                    unrealized_pnl: None,
                },
            );

            order.status = "filled".to_string();
            order.price = Some(fill_price);
            order.position_id = Some(position_id.clone());
            debug!(
                "Paper fill: order {} opened position {} at {}",
                order_id, position_id, fill_price
            );
        }

        self.orders.insert(order_id.clone(), order);
        Ok(order_id)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| BrokerError::Rejected(format!("Order {} not found", order_id)))?;

        if order.status != "working" {
            return Err(BrokerError::Rejected(format!(
                "Order {} cannot be cancelled: status is {}",
                order_id, order.status
            )));
        }

        order.status = "cancelled".to_string();
        Ok(())
    }

    fn supports_direct_close(&self) -> bool {
        true
    }

    async fn close_position(&self, position_id: &str) -> Result<Option<String>, BrokerError> {
        let (_, position) = self
            .positions
            .remove(position_id)
            .ok_or_else(|| BrokerError::Rejected(format!("Position {} not found", position_id)))?;

        let instrument = self.instrument(position.instrument_id);
        let exit_price = instrument.and_then(Self::quote_for).map(|q| match position.side {
            OrderSide::Buy => q.bid,
            OrderSide::Sell => q.ask,
        });

        let order_id = self.next_id();
        self.orders.insert(
            order_id.clone(),
            BrokerOrder {
                id: order_id.clone(),
                instrument_id: position.instrument_id,
                side: position.side.flipped(),
                order_type: OrderType::Market.to_string(),
                quantity: position.quantity.unwrap_or(0.0).abs(),
                price: exit_price,
                stop_price: None,
                status: "filled".to_string(),
                validity: Some("IOC".to_string()),
                stop_loss: None,
                take_profit: None,
                position_id: Some(position_id.to_string()),
            },
        );

        Ok(Some(order_id))
    }

    async fn quote(&self, instrument: &Instrument) -> Result<Option<Quote>, BrokerError> {
        Ok(self.instrument(instrument.id).and_then(Self::quote_for))
    }
}
