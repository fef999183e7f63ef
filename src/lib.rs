//! Broker Gateway - REST façade over a retail trading broker

pub mod api;
pub mod broker;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

use axum::{body::Body, http::Request, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;
use uuid::Uuid;

use config::Config;
use services::TradingService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub trading: Arc<TradingService>,
}

impl AppState {
    pub fn new(config: Config, trading: TradingService) -> Self {
        Self {
            config: Arc::new(config),
            trading: Arc::new(trading),
        }
    }
}

/// Build the full application router with CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                request_id = %Uuid::new_v4(),
                method = %request.method(),
                uri = %request.uri(),
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(trace)
        .with_state(state)
}
