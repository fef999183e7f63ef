//! Order endpoints. All of them require the API key.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, get},
    Json, Router,
};
use tracing::warn;

use super::auth::ApiKey;
use crate::error::GatewayError;
use crate::types::{Envelope, OrderIntent, OrderResult, OrdersPayload};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/:order_id", delete(cancel_order))
}

/// POST /orders
///
/// Malformed bodies are reported in the envelope like any other validation
/// failure.
async fn create_order(
    _key: ApiKey,
    State(state): State<AppState>,
    payload: Result<Json<OrderIntent>, JsonRejection>,
) -> Envelope<OrderResult> {
    match payload {
        Ok(Json(intent)) => state.trading.create_order(&intent).await,
        Err(rejection) => {
            warn!("Rejected order body: {}", rejection.body_text());
            Envelope::fail(GatewayError::Validation(rejection.body_text()))
        }
    }
}

/// GET /orders
async fn list_orders(_key: ApiKey, State(state): State<AppState>) -> Envelope<OrdersPayload> {
    state.trading.get_orders().await
}

/// DELETE /orders/:order_id
async fn cancel_order(
    _key: ApiKey,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Envelope<OrderResult> {
    state.trading.cancel_order(&order_id).await
}
