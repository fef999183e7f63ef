use broker_gateway::{
    app, broker,
    config::Config,
    services::{DisabledAuditSink, OrderAuditSink, RedisAuditStore, TradingService},
    AppState,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "broker_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!(
        "Starting broker gateway on {}:{} with broker {}",
        config.host, config.port, config.broker_type
    );
    if config.api_key.is_none() {
        warn!("API_KEY is not set; protected endpoints will reject every request");
    }

    // Connect to the broker before accepting traffic
    let broker = broker::connect(&config).await?;

    // Order audit log
    let audit: Arc<dyn OrderAuditSink> = match config.redis_url {
        Some(ref redis_url) => Arc::new(
            RedisAuditStore::new(redis_url, config.orders_table_name.clone()).await,
        ),
        None => {
            info!("REDIS_URL not set, order auditing disabled");
            Arc::new(DisabledAuditSink)
        }
    };

    let trading = TradingService::from_config(broker, audit, &config);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let app = app(AppState::new(config, trading));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Broker gateway listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
