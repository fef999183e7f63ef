//! Response Envelope
//!
//! Every outward operation answers with `{success, timestamp, ...payload}`
//! or `{success: false, error, timestamp}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ErrorKind, GatewayError};

/// Uniform response wrapper. The payload's fields are merged into the
/// envelope object on success.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
}

impl<T> Envelope<T> {
    /// Successful envelope carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
            kind: None,
        }
    }

    /// Failed envelope built from a gateway error.
    pub fn fail(err: GatewayError) -> Self {
        Self {
            success: false,
            data: None,
            kind: Some(err.kind()),
            error: Some(err.to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn from_result(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Error message of a failed envelope.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> StatusCode {
        self.kind.map(|k| k.status()).unwrap_or(StatusCode::OK)
    }

    /// Consume the envelope and return its payload, if any.
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}
