use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};

use crate::types::{Envelope, InstrumentPrice, InstrumentsPayload};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/instruments", get(list_instruments))
        .route("/instruments/:symbol/price", get(current_price))
}

async fn list_instruments(State(state): State<AppState>) -> Envelope<InstrumentsPayload> {
    state.trading.get_instruments().await
}

/// GET /instruments/:symbol/price
///
/// Zero prices flagged as `placeholder` when the broker has no quote.
async fn current_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Envelope<InstrumentPrice> {
    state.trading.get_current_price(&symbol).await
}
