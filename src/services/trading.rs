//! Trading Service
//!
//! One method per gateway operation. Each runs against the injected broker
//! and converts every outcome, success or failure, into an [`Envelope`].
//!
//! Order creation flows through the normalizer, the instrument catalog and
//! the broker, then hands an audit record to a detached task. Account
//! details are derived through the configured margin policy. Position
//! closing is delegated to [`PositionCloser`].

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::broker::{self, Broker, BrokerError};
use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::services::audit::OrderAuditSink;
use crate::services::metrics::{derive_snapshot, FixedRateMargin, MarginPolicy};
use crate::services::normalizer;
use crate::services::position_closer::PositionCloser;
use crate::types::{
    AccountSnapshot, AccountsPayload, BrokerInfo, Envelope, InstrumentPrice, InstrumentsPayload,
    OrderAuditRecord, OrderIntent, OrderResult, OrdersPayload, PositionClosed, PositionsPayload,
};

pub struct TradingService {
    broker: Arc<dyn Broker>,
    audit: Arc<dyn OrderAuditSink>,
    margin_policy: Arc<dyn MarginPolicy>,
    settle_delay: Duration,
}

impl TradingService {
    pub fn new(
        broker: Arc<dyn Broker>,
        audit: Arc<dyn OrderAuditSink>,
        margin_policy: Arc<dyn MarginPolicy>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            broker,
            audit,
            margin_policy,
            settle_delay,
        }
    }

    /// Build a service with the fixed-rate margin policy and settle delay
    /// from `config`.
    pub fn from_config(
        broker: Arc<dyn Broker>,
        audit: Arc<dyn OrderAuditSink>,
        config: &Config,
    ) -> Self {
        Self::new(
            broker,
            audit,
            Arc::new(FixedRateMargin::new(config.margin_rate)),
            config.close_settle_delay(),
        )
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.broker.is_connected() {
            Ok(())
        } else {
            Err(BrokerError::NotConnected.into())
        }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    pub async fn get_accounts(&self) -> Envelope<AccountsPayload> {
        respond("get_accounts", self.accounts().await)
    }

    async fn accounts(&self) -> Result<AccountsPayload> {
        self.ensure_connected()?;
        let accounts = self.broker.list_accounts().await?;
        Ok(AccountsPayload { accounts })
    }

    pub async fn get_account_details(&self) -> Envelope<AccountSnapshot> {
        respond("get_account_details", self.account_details().await)
    }

    async fn account_details(&self) -> Result<AccountSnapshot> {
        self.ensure_connected()?;
        let account = self
            .broker
            .list_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound("No accounts found".to_string()))?;
        let positions = self.broker.list_positions().await?;

        Ok(derive_snapshot(&account, positions, self.margin_policy.as_ref()))
    }

    // =========================================================================
    // Instruments
    // =========================================================================

    pub async fn get_instruments(&self) -> Envelope<InstrumentsPayload> {
        respond("get_instruments", self.instruments().await)
    }

    async fn instruments(&self) -> Result<InstrumentsPayload> {
        self.ensure_connected()?;
        let instruments = self.broker.list_instruments().await?;
        Ok(InstrumentsPayload { instruments })
    }

    pub async fn get_current_price(&self, symbol: &str) -> Envelope<InstrumentPrice> {
        respond("get_current_price", self.current_price(symbol).await)
    }

    async fn current_price(&self, symbol: &str) -> Result<InstrumentPrice> {
        self.ensure_connected()?;
        let catalog = self.broker.list_instruments().await?;
        let instrument = normalizer::resolve_instrument(symbol, &catalog)?;
        let quote = self.broker.quote(instrument).await?;
        if quote.is_none() {
            debug!("No quote available for {}, returning placeholder", symbol);
        }
        Ok(InstrumentPrice::from_quote(instrument, quote))
    }

    // =========================================================================
    // Orders
    // =========================================================================

    pub async fn create_order(&self, intent: &OrderIntent) -> Envelope<OrderResult> {
        respond("create_order", self.submit_order(intent).await)
    }

    async fn submit_order(&self, intent: &OrderIntent) -> Result<OrderResult> {
        self.ensure_connected()?;
        let request = normalizer::validate(intent)?;

        let catalog = self.broker.list_instruments().await?;
        let instrument = normalizer::resolve_instrument(&request.symbol, &catalog)?;
        let params = normalizer::build_params(&request, instrument.id);

        let order_id = self.broker.create_order(&params).await?;
        info!(
            "Created {} {} order {} for {} x {}",
            request.order_type, request.side, order_id, request.symbol, request.quantity
        );

        // The response never waits on the audit write
        let record = OrderAuditRecord::created(&order_id, &request);
        let audit = Arc::clone(&self.audit);
        tokio::spawn(async move {
            audit.put(&record).await;
        });

        Ok(OrderResult {
            order_id,
            status: "created".to_string(),
            message: "Order created successfully".to_string(),
        })
    }

    pub async fn get_orders(&self) -> Envelope<OrdersPayload> {
        respond("get_orders", self.orders().await)
    }

    async fn orders(&self) -> Result<OrdersPayload> {
        self.ensure_connected()?;
        let orders = self.broker.list_orders().await?;
        Ok(OrdersPayload { orders })
    }

    pub async fn cancel_order(&self, order_id: &str) -> Envelope<OrderResult> {
        respond("cancel_order", self.cancel(order_id).await)
    }

    async fn cancel(&self, order_id: &str) -> Result<OrderResult> {
        self.ensure_connected()?;
        self.broker.cancel_order(order_id).await?;
        info!("Cancelled order {}", order_id);
        Ok(OrderResult {
            order_id: order_id.to_string(),
            status: "cancelled".to_string(),
            message: "Order cancelled successfully".to_string(),
        })
    }

    // =========================================================================
    // Positions
    // =========================================================================

    pub async fn get_positions(&self) -> Envelope<PositionsPayload> {
        respond("get_positions", self.positions().await)
    }

    async fn positions(&self) -> Result<PositionsPayload> {
        self.ensure_connected()?;
        let positions = self.broker.list_positions().await?;
        Ok(PositionsPayload { positions })
    }

    pub async fn close_position(&self, position_id: &str) -> Envelope<PositionClosed> {
        let result = match self.ensure_connected() {
            Ok(()) => {
                PositionCloser::new(self.broker.as_ref(), self.settle_delay)
                    .close(position_id)
                    .await
            }
            Err(e) => Err(e),
        };
        respond("close_position", result)
    }

    // =========================================================================
    // Broker
    // =========================================================================

    pub fn broker_info(&self) -> Envelope<BrokerInfo> {
        Envelope::ok(BrokerInfo {
            current_broker: self.broker.name().to_string(),
            available_brokers: broker::catalog(),
            connected: self.broker.is_connected(),
        })
    }
}

/// Log a failed operation and wrap the outcome in an envelope.
fn respond<T>(operation: &str, result: Result<T>) -> Envelope<T> {
    if let Err(e) = &result {
        error!("Error in {}: {}", operation, e);
    }
    Envelope::from_result(result)
}
