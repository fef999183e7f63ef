use std::env;
use std::time::Duration;

/// TradeLocker connection settings.
#[derive(Debug, Clone)]
pub struct TradeLockerConfig {
    /// Base URL of the TradeLocker environment (demo or live).
    pub environment: String,
    /// Login email.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Broker server name.
    pub server: String,
    /// Account to trade on. Defaults to the first account returned.
    pub account_id: Option<i64>,
}

impl Default for TradeLockerConfig {
    fn default() -> Self {
        Self {
            environment: "https://demo.tradelocker.com".to_string(),
            username: String::new(),
            password: String::new(),
            server: String::new(),
            account_id: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Shared secret expected in the `X-API-Key` header on protected routes.
    pub api_key: Option<String>,
    /// Which broker implementation to connect to.
    pub broker_type: String,
    /// TradeLocker credentials.
    pub tradelocker: TradeLockerConfig,
    /// Starting balance of the paper broker account.
    pub paper_starting_balance: f64,
    /// Redis URL for the order audit log. Auditing is off when unset.
    pub redis_url: Option<String>,
    /// Key prefix for audit records.
    pub orders_table_name: String,
    /// Margin requirement as a fraction of position notional.
    pub margin_rate: f64,
    /// Wait between a direct close and the verifying re-query (ms).
    pub close_settle_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let tradelocker = TradeLockerConfig {
            environment: env::var("TRADELOCKER_ENVIRONMENT")
                .unwrap_or_else(|_| "https://demo.tradelocker.com".to_string()),
            username: env::var("TRADELOCKER_USERNAME").unwrap_or_default(),
            password: env::var("TRADELOCKER_PASSWORD").unwrap_or_default(),
            server: env::var("TRADELOCKER_SERVER").unwrap_or_default(),
            account_id: env::var("TRADELOCKER_ACCOUNT_ID")
                .ok()
                .and_then(|v| v.parse().ok()),
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            api_key: env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            broker_type: env::var("BROKER_TYPE")
                .map(|b| b.to_lowercase())
                .unwrap_or_else(|_| "tradelocker".to_string()),
            tradelocker,
            paper_starting_balance: env::var("PAPER_STARTING_BALANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000.0),
            redis_url: env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),
            orders_table_name: env::var("ORDERS_TABLE_NAME")
                .unwrap_or_else(|_| "tradelocker-orders".to_string()),
            margin_rate: env::var("MARGIN_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.01),
            close_settle_ms: env::var("CLOSE_SETTLE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
        }
    }

    /// Settle delay used by the position closer.
    pub fn close_settle_delay(&self) -> Duration {
        Duration::from_millis(self.close_settle_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_key: None,
            broker_type: "tradelocker".to_string(),
            tradelocker: TradeLockerConfig::default(),
            paper_starting_balance: 10_000.0,
            redis_url: None,
            orders_table_name: "tradelocker-orders".to_string(),
            margin_rate: 0.01,
            close_settle_ms: 1000,
        }
    }
}
