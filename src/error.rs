use axum::http::StatusCode;
use thiserror::Error;

use crate::broker::BrokerError;

/// Gateway error types.
///
/// Display strings are the exact messages returned to clients in the
/// envelope's `error` field.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Upstream(#[from] BrokerError),

    #[error("{0}")]
    Internal(String),
}

/// Error classification carried by failed envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    Upstream,
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Upstream => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Unauthorized(_) => ErrorKind::Unauthorized,
            GatewayError::Upstream(_) => ErrorKind::Upstream,
            GatewayError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = GatewayError::Validation("Quantity must be greater than 0".to_string());
        assert_eq!(err.to_string(), "Quantity must be greater than 0");
        assert_eq!(err.kind().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_passes_broker_message_through() {
        let err: GatewayError = BrokerError::Rejected("Market is closed".to_string()).into();
        assert_eq!(err.to_string(), "Market is closed");
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.kind().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
