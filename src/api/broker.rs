use axum::{extract::State, routing::get, Router};

use crate::types::{BrokerInfo, Envelope};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/broker", get(broker_info))
}

async fn broker_info(State(state): State<AppState>) -> Envelope<BrokerInfo> {
    state.trading.broker_info()
}
