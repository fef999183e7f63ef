use crate::types::{Envelope, HealthStatus};
use crate::AppState;
use axum::{routing::get, Router};

async fn health() -> Envelope<HealthStatus> {
    Envelope::ok(HealthStatus {
        message: "Multi-Broker Trading API is healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
