//! Account Metrics Deriver
//!
//! Computes equity and margin figures for one account from its balance and
//! open positions. Margin is estimated through a [`MarginPolicy`]; the
//! default [`FixedRateMargin`] charges a flat fraction of notional and does
//! not model instrument leverage.

use crate::types::{AccountSnapshot, BrokerAccount, PositionRecord};

/// Converts aggregate position notional into margin used.
pub trait MarginPolicy: Send + Sync {
    fn margin_used(&self, total_positions_value: f64) -> f64;
}

/// Margin as a fixed fraction of notional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRateMargin {
    pub rate: f64,
}

impl FixedRateMargin {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl Default for FixedRateMargin {
    fn default() -> Self {
        Self { rate: 0.01 }
    }
}

impl MarginPolicy for FixedRateMargin {
    fn margin_used(&self, total_positions_value: f64) -> f64 {
        total_positions_value * self.rate
    }
}

/// Equity as a percentage of margin used; 0 when no margin is in use.
pub fn margin_level(equity: f64, margin_used: f64) -> f64 {
    if margin_used > 0.0 {
        equity / margin_used * 100.0
    } else {
        0.0
    }
}

/// Build the account snapshot for `account` and its open `positions`.
pub fn derive_snapshot(
    account: &BrokerAccount,
    positions: Vec<PositionRecord>,
    policy: &dyn MarginPolicy,
) -> AccountSnapshot {
    let total_positions_value: f64 = positions.iter().filter_map(|p| p.position_value()).sum();
    let unrealized_pnl: f64 = positions.iter().filter_map(|p| p.unrealized_pnl).sum();

    let equity = account.balance + unrealized_pnl;
    let margin_used = policy.margin_used(total_positions_value);
    let margin_available = account.balance - margin_used;

    AccountSnapshot {
        account_id: account.id,
        account_name: account.name.clone(),
        currency: account.currency.clone(),
        balance: account.balance,
        equity,
        margin_used,
        margin_available,
        margin_level: margin_level(equity, margin_used),
        free_margin: margin_available,
        total_positions_value,
        unrealized_pnl,
        positions_count: positions.len(),
        account_status: account.status.clone(),
        positions,
    }
}
