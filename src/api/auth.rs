//! API key check for protected routes.
//!
//! Handlers opt in by taking [`ApiKey`] as an argument. The key is compared
//! against `API_KEY`; when no key is configured every protected request is
//! rejected.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::error::GatewayError;
use crate::types::Envelope;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Proof that the request carried the configured API key.
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

#[axum::async_trait]
impl FromRequestParts<AppState> for ApiKey {
    type Rejection = Envelope<()>;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        match state.config.api_key.as_deref() {
            Some(expected) if provided == Some(expected) => Ok(ApiKey),
            Some(_) => Err(invalid_key()),
            None => {
                warn!("API_KEY is not set, rejecting {} {}", parts.method, parts.uri);
                Err(invalid_key())
            }
        }
    }
}

fn invalid_key() -> Envelope<()> {
    Envelope::fail(GatewayError::Unauthorized("Invalid API key".to_string()))
}
