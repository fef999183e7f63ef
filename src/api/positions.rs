use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Router,
};

use super::auth::ApiKey;
use crate::types::{Envelope, PositionClosed, PositionsPayload};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/positions", get(list_positions))
        .route("/positions/:position_id", delete(close_position))
}

/// GET /positions (open)
async fn list_positions(State(state): State<AppState>) -> Envelope<PositionsPayload> {
    state.trading.get_positions().await
}

/// DELETE /positions/:position_id
///
/// May wait for the configured settle delay while the close is verified.
async fn close_position(
    _key: ApiKey,
    State(state): State<AppState>,
    Path(position_id): Path<String>,
) -> Envelope<PositionClosed> {
    state.trading.close_position(&position_id).await
}
