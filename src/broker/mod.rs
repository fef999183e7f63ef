//! Upstream broker integrations.
//!
//! The gateway talks to exactly one broker per process through the
//! [`Broker`] trait. [`connect`] builds the configured implementation.

pub mod paper;
pub mod tradelocker;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::types::{
    BrokerAccount, BrokerDescriptor, BrokerOrder, BrokerOrderParams, BrokerStatus, Instrument,
    PositionRecord, Quote,
};

pub use paper::PaperBroker;
pub use tradelocker::TradeLockerClient;

/// Broker errors. Messages are passed to clients verbatim.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Not connected to broker")]
    NotConnected,

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Rejected(String),

    #[error("Upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    #[error("{0} is not supported by this broker")]
    Unsupported(&'static str),

    #[error("Unsupported broker type: {0}")]
    UnknownBroker(String),
}

/// Operations the gateway consumes from an upstream broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Short identifier, e.g. `tradelocker`.
    fn name(&self) -> &'static str;

    fn is_connected(&self) -> bool;

    async fn list_accounts(&self) -> Result<Vec<BrokerAccount>, BrokerError>;

    async fn list_instruments(&self) -> Result<Vec<Instrument>, BrokerError>;

    async fn list_positions(&self) -> Result<Vec<PositionRecord>, BrokerError>;

    async fn list_orders(&self) -> Result<Vec<BrokerOrder>, BrokerError>;

    /// Submit an order and return the broker's order id.
    async fn create_order(&self, params: &BrokerOrderParams) -> Result<String, BrokerError>;

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError>;

    /// Whether [`Broker::close_position`] is backed by a native operation.
    fn supports_direct_close(&self) -> bool {
        false
    }

    /// Close a position by id. Returns the closing order id when the
    /// broker reports one.
    async fn close_position(&self, _position_id: &str) -> Result<Option<String>, BrokerError> {
        Err(BrokerError::Unsupported("close_position"))
    }

    /// Current quote, if the broker offers market data for the instrument.
    async fn quote(&self, _instrument: &Instrument) -> Result<Option<Quote>, BrokerError> {
        Ok(None)
    }
}

/// Connect to the broker named by `config.broker_type`.
pub async fn connect(config: &Config) -> Result<Arc<dyn Broker>, BrokerError> {
    match config.broker_type.as_str() {
        "tradelocker" => {
            let client = TradeLockerClient::connect(&config.tradelocker).await?;
            info!("Connected to TradeLocker at {}", config.tradelocker.environment);
            Ok(Arc::new(client))
        }
        "paper" => {
            info!(
                "Using paper broker with starting balance {}",
                config.paper_starting_balance
            );
            Ok(Arc::new(PaperBroker::new(config.paper_starting_balance)))
        }
        other => match catalog().get(other) {
            Some(d) if d.status == BrokerStatus::Planned => Err(BrokerError::Rejected(format!(
                "{} broker not yet implemented",
                d.name
            ))),
            _ => Err(BrokerError::UnknownBroker(other.to_string())),
        },
    }
}

/// Known broker integrations keyed by `BROKER_TYPE` value.
pub fn catalog() -> BTreeMap<&'static str, BrokerDescriptor> {
    let entries = [
        (
            "tradelocker",
            "TradeLocker",
            BrokerStatus::Implemented,
            "TradeLocker CFD and forex trading",
        ),
        (
            "paper",
            "Paper",
            BrokerStatus::Implemented,
            "In-process simulated broker for development",
        ),
        (
            "oanda",
            "OANDA",
            BrokerStatus::Planned,
            "OANDA forex and CFD trading",
        ),
        (
            "alpaca",
            "Alpaca",
            BrokerStatus::Planned,
            "Alpaca stock and crypto trading",
        ),
        (
            "interactive_brokers",
            "Interactive Brokers",
            BrokerStatus::Planned,
            "Interactive Brokers multi-asset trading",
        ),
    ];

    entries
        .into_iter()
        .map(|(key, name, status, description)| {
            (
                key,
                BrokerDescriptor {
                    name,
                    status,
                    description,
                },
            )
        })
        .collect()
}
