pub mod accounts;
pub mod auth;
pub mod broker;
pub mod health;
pub mod instruments;
pub mod orders;
pub mod positions;

use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(broker::router())
        .merge(orders::router())
        .merge(accounts::router())
        .merge(instruments::router())
        .merge(positions::router())
}
