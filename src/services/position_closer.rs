//! Position Closer
//!
//! Closes an open position in up to two attempts. When the broker offers a
//! native close-by-id it is tried first and verified by re-querying the
//! position list after a settle delay. If that call fails, or the position
//! is still listed afterwards, an offsetting market order is submitted.
//!
//! The procedure is modelled as an explicit state machine so every
//! transition can be driven and checked on its own.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::broker::{Broker, BrokerError};
use crate::error::{GatewayError, Result};
use crate::types::{BrokerOrderParams, CloseMethod, PositionClosed, PositionRecord};

const CLOSED_STATUS: &str = "closed";
const DIRECT_MESSAGE: &str = "Position closed successfully";
const OFFSET_MESSAGE: &str =
    "Position closed with an offsetting order; the original position record remains for audit";

/// Close strategy being attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseStrategy {
    Direct,
    /// Offsetting market order. Carries the direct-close failure that led
    /// here, if any.
    Offsetting { direct_error: Option<String> },
}

#[derive(Debug)]
pub enum CloseState {
    Attempting(CloseStrategy),
    Resolved(Result<PositionClosed>),
}

impl CloseState {
    /// Entry state for a broker.
    pub fn initial(supports_direct_close: bool) -> Self {
        if supports_direct_close {
            CloseState::Attempting(CloseStrategy::Direct)
        } else {
            CloseState::Attempting(CloseStrategy::Offsetting { direct_error: None })
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, CloseState::Resolved(_))
    }
}

pub struct PositionCloser<'a> {
    broker: &'a dyn Broker,
    settle_delay: Duration,
}

impl<'a> PositionCloser<'a> {
    pub fn new(broker: &'a dyn Broker, settle_delay: Duration) -> Self {
        Self {
            broker,
            settle_delay,
        }
    }

    /// Close `position_id`, running the state machine to resolution.
    pub async fn close(&self, position_id: &str) -> Result<PositionClosed> {
        let position = self.find_position(position_id).await?;

        let mut state = CloseState::initial(self.broker.supports_direct_close());
        loop {
            state = match state {
                CloseState::Resolved(outcome) => return outcome,
                CloseState::Attempting(strategy) => self.step(&position, strategy).await,
            };
        }
    }

    /// Look the position up in the broker's current list.
    pub async fn find_position(&self, position_id: &str) -> Result<PositionRecord> {
        self.broker
            .list_positions()
            .await?
            .into_iter()
            .find(|p| p.id == position_id)
            .ok_or_else(|| GatewayError::NotFound(format!("Position {} not found", position_id)))
    }

    /// Run one attempt and return the next state.
    pub async fn step(&self, position: &PositionRecord, strategy: CloseStrategy) -> CloseState {
        match strategy {
            CloseStrategy::Direct => self.try_direct(position).await,
            CloseStrategy::Offsetting { direct_error } => {
                self.try_offsetting(position, direct_error).await
            }
        }
    }

    async fn try_direct(&self, position: &PositionRecord) -> CloseState {
        let order_id = match self.broker.close_position(&position.id).await {
            Ok(order_id) => order_id,
            Err(e) => {
                warn!("Direct close of position {} failed: {}", position.id, e);
                return CloseState::Attempting(CloseStrategy::Offsetting {
                    direct_error: Some(e.to_string()),
                });
            }
        };

        tokio::time::sleep(self.settle_delay).await;

        let still_open = match self.broker.list_positions().await {
            Ok(positions) => positions.iter().any(|p| p.id == position.id),
            Err(e) => return CloseState::Resolved(Err(e.into())),
        };

        if still_open {
            warn!(
                "Position {} still listed after direct close, submitting offsetting order",
                position.id
            );
            return CloseState::Attempting(CloseStrategy::Offsetting { direct_error: None });
        }

        info!("Position {} closed directly", position.id);
        CloseState::Resolved(Ok(PositionClosed {
            position_id: position.id.clone(),
            order_id: order_id.unwrap_or_else(|| position.id.clone()),
            status: CLOSED_STATUS.to_string(),
            close_method: CloseMethod::Direct,
            message: DIRECT_MESSAGE.to_string(),
        }))
    }

    async fn try_offsetting(
        &self,
        position: &PositionRecord,
        direct_error: Option<String>,
    ) -> CloseState {
        if let Some(err) = &direct_error {
            debug!("Offsetting position {} after direct close error: {}", position.id, err);
        }

        let Some(quantity) = position.quantity else {
            return CloseState::Resolved(Err(close_failed(format!(
                "position {} has no quantity",
                position.id
            ))));
        };

        let params = BrokerOrderParams::offsetting(position.instrument_id, position.side, quantity);
        match self.broker.create_order(&params).await {
            Ok(order_id) => {
                info!(
                    "Position {} offset by order {} ({} {})",
                    position.id, order_id, params.side, params.quantity
                );
                CloseState::Resolved(Ok(PositionClosed {
                    position_id: position.id.clone(),
                    order_id,
                    status: CLOSED_STATUS.to_string(),
                    close_method: CloseMethod::OffsettingOrder,
                    message: OFFSET_MESSAGE.to_string(),
                }))
            }
            Err(e) => CloseState::Resolved(Err(close_failed(e.to_string()))),
        }
    }
}

fn close_failed(detail: String) -> GatewayError {
    GatewayError::Upstream(BrokerError::Rejected(format!(
        "Failed to close position: {}",
        detail
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BrokerAccount, BrokerOrder, Instrument, OrderSide, OrderType, Validity,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Broker whose close behaviour is scripted per test.
    struct ScriptedBroker {
        positions: Mutex<Vec<PositionRecord>>,
        direct: bool,
        /// Direct close succeeds but leaves the position listed
        sticky: bool,
        direct_fails: bool,
        order_fails: bool,
        submitted: Mutex<Vec<BrokerOrderParams>>,
    }

    impl ScriptedBroker {
        fn new(direct: bool) -> Self {
            Self {
                positions: Mutex::new(vec![PositionRecord {
                    id: "42".to_string(),
                    instrument_id: 7,
                    symbol: Some("EURUSD".to_string()),
                    side: OrderSide::Buy,
                    quantity: Some(-3.0),
                    avg_price: Some(1.1),
                    unrealized_pnl: None,
                }]),
                direct,
                sticky: false,
                direct_fails: false,
                order_fails: false,
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn submitted(&self) -> Vec<BrokerOrderParams> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Broker for ScriptedBroker {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn list_accounts(&self) -> std::result::Result<Vec<BrokerAccount>, BrokerError> {
            Ok(vec![])
        }

        async fn list_instruments(&self) -> std::result::Result<Vec<Instrument>, BrokerError> {
            Ok(vec![])
        }

        async fn list_positions(&self) -> std::result::Result<Vec<PositionRecord>, BrokerError> {
            Ok(self.positions.lock().unwrap().clone())
        }

        async fn list_orders(&self) -> std::result::Result<Vec<BrokerOrder>, BrokerError> {
            Ok(vec![])
        }

        async fn create_order(
            &self,
            params: &BrokerOrderParams,
        ) -> std::result::Result<String, BrokerError> {
            if self.order_fails {
                return Err(BrokerError::Rejected("Market is closed".to_string()));
            }
            self.submitted.lock().unwrap().push(params.clone());
            Ok("900".to_string())
        }

        async fn cancel_order(&self, _order_id: &str) -> std::result::Result<(), BrokerError> {
            Ok(())
        }

        fn supports_direct_close(&self) -> bool {
            self.direct
        }

        async fn close_position(
            &self,
            position_id: &str,
        ) -> std::result::Result<Option<String>, BrokerError> {
            if self.direct_fails {
                return Err(BrokerError::Rejected("close rejected".to_string()));
            }
            if !self.sticky {
                self.positions.lock().unwrap().retain(|p| p.id != position_id);
            }
            Ok(None)
        }
    }

    fn closer(broker: &ScriptedBroker) -> PositionCloser<'_> {
        PositionCloser::new(broker, Duration::ZERO)
    }

    // =========================================================================
    // Full runs
    // =========================================================================

    #[tokio::test]
    async fn test_unknown_position_is_not_found() {
        let broker = ScriptedBroker::new(true);
        let err = closer(&broker).close("nope").await.unwrap_err();

        assert_eq!(err.to_string(), "Position nope not found");
        assert!(matches!(err, GatewayError::NotFound(_)));
        assert!(broker.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_direct_close_verified() {
        let broker = ScriptedBroker::new(true);
        let closed = closer(&broker).close("42").await.unwrap();

        assert_eq!(closed.close_method, CloseMethod::Direct);
        assert_eq!(closed.status, "closed");
        // No order id reported, falls back to the position id
        assert_eq!(closed.order_id, "42");
        assert!(broker.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_sticky_direct_close_falls_back_to_offset() {
        let mut broker = ScriptedBroker::new(true);
        broker.sticky = true;
        let closed = closer(&broker).close("42").await.unwrap();

        assert_eq!(closed.close_method, CloseMethod::OffsettingOrder);
        assert_eq!(closed.order_id, "900");
        assert!(closed.message.contains("remains for audit"));

        let submitted = broker.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].side, OrderSide::Sell);
        assert_eq!(submitted[0].quantity, 3.0);
        assert_eq!(submitted[0].order_type, OrderType::Market);
        assert_eq!(submitted[0].validity, Validity::Ioc);
        assert_eq!(submitted[0].instrument_id, 7);
    }

    #[tokio::test]
    async fn test_no_direct_close_goes_straight_to_offset() {
        let broker = ScriptedBroker::new(false);
        let closed = closer(&broker).close("42").await.unwrap();

        assert_eq!(closed.close_method, CloseMethod::OffsettingOrder);
        assert_eq!(broker.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_offset_failure_reports_detail() {
        let mut broker = ScriptedBroker::new(false);
        broker.order_fails = true;
        let err = closer(&broker).close("42").await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to close position: Market is closed");
    }

    // =========================================================================
    // Single transitions
    // =========================================================================

    #[test]
    fn test_initial_state() {
        assert!(matches!(
            CloseState::initial(true),
            CloseState::Attempting(CloseStrategy::Direct)
        ));
        assert!(matches!(
            CloseState::initial(false),
            CloseState::Attempting(CloseStrategy::Offsetting { direct_error: None })
        ));
    }

    #[tokio::test]
    async fn test_direct_error_transitions_to_offset() {
        let mut broker = ScriptedBroker::new(true);
        broker.direct_fails = true;
        let c = closer(&broker);
        let position = c.find_position("42").await.unwrap();

        let next = c.step(&position, CloseStrategy::Direct).await;
        match next {
            CloseState::Attempting(CloseStrategy::Offsetting { direct_error }) => {
                assert_eq!(direct_error.as_deref(), Some("close rejected"));
            }
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_offset_step_resolves() {
        let broker = ScriptedBroker::new(false);
        let c = closer(&broker);
        let position = c.find_position("42").await.unwrap();

        let next = c
            .step(
                &position,
                CloseStrategy::Offsetting {
                    direct_error: Some("close rejected".to_string()),
                },
            )
            .await;
        assert!(next.is_resolved());
    }

    #[tokio::test]
    async fn test_offset_without_quantity_fails() {
        let broker = ScriptedBroker::new(false);
        broker.positions.lock().unwrap()[0].quantity = None;
        let err = closer(&broker).close("42").await.unwrap_err();

        assert!(err.to_string().starts_with("Failed to close position:"));
        assert!(broker.submitted().is_empty());
    }
}
