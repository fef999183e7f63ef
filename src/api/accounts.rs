use axum::{extract::State, routing::get, Router};

use super::auth::ApiKey;
use crate::types::{AccountSnapshot, AccountsPayload, Envelope};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts))
        .route("/accounts/details", get(account_details))
}

/// GET /accounts (open)
async fn list_accounts(State(state): State<AppState>) -> Envelope<AccountsPayload> {
    state.trading.get_accounts().await
}

/// GET /accounts/details
async fn account_details(_key: ApiKey, State(state): State<AppState>) -> Envelope<AccountSnapshot> {
    state.trading.get_account_details().await
}
