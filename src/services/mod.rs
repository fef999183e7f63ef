pub mod audit;
pub mod metrics;
pub mod normalizer;
pub mod position_closer;
pub mod trading;

pub use audit::{DisabledAuditSink, OrderAuditSink, RedisAuditStore};
pub use metrics::{FixedRateMargin, MarginPolicy};
pub use position_closer::{CloseState, CloseStrategy, PositionCloser};
pub use trading::TradingService;
