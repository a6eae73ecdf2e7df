//! Service Error Taxonomy
//!
//! Every failure a request can hit is one of the variants below. The HTTP
//! layer only ever shows clients [`ContactError::public_message`]; the
//! variant's `Display` text carries the internal detail and goes to the log.
//!
//! | Variant           | Status | Caused by                                   |
//! |-------------------|--------|---------------------------------------------|
//! | `Validation`      | 400    | malformed or missing client input           |
//! | `PayloadTooLarge` | 413    | request body over `--max-body-bytes`        |
//! | `Conflict`        | 409    | uniqueness violation reported by the store  |
//! | `PoolTimeout`     | 503    | no connection free before the deadline      |
//! | `StoreFault`      | 500    | any other store failure                     |
//! | `IncompleteBody`  | 500    | body taken before end-of-body (caller bug)  |
//! | `AlreadyConsumed` | 500    | body taken twice (caller bug)               |

use crate::body::{BodyError, BodyReadError};
use crate::pool::PoolError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors surfaced by the contact service core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContactError {
    /// Client input is malformed or missing; never reaches the store
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request body exceeded the configured cap
    #[error("request body too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The store rejected a write as a duplicate
    #[error("conflict: {0}")]
    Conflict(String),

    /// No pooled connection became available in time
    #[error("timed out waiting for a database connection")]
    PoolTimeout,

    /// Any other store failure
    #[error("store fault: {0}")]
    StoreFault(String),

    /// The request body was taken before it was complete
    #[error("request body taken before completion")]
    IncompleteBody,

    /// The request body was taken more than once
    #[error("request body already consumed")]
    AlreadyConsumed,
}

/// Result type for contact service operations.
pub type ContactResult<T> = Result<T, ContactError>;

impl ContactError {
    pub fn validation(message: impl Into<String>) -> Self {
        ContactError::Validation(message.into())
    }

    /// HTTP status code for this error class.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ContactError::Validation(_) => StatusCode::BAD_REQUEST,
            ContactError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ContactError::Conflict(_) => StatusCode::CONFLICT,
            ContactError::PoolTimeout => StatusCode::SERVICE_UNAVAILABLE,
            ContactError::StoreFault(_)
            | ContactError::IncompleteBody
            | ContactError::AlreadyConsumed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Validation messages describe the client's own
    /// input and are passed through; everything else is generic.
    pub fn public_message(&self) -> String {
        match self {
            ContactError::Validation(message) => message.clone(),
            ContactError::PayloadTooLarge { .. } => "request body too large".to_string(),
            ContactError::Conflict(_) => "contact already exists".to_string(),
            ContactError::PoolTimeout => "service temporarily unavailable".to_string(),
            ContactError::StoreFault(_)
            | ContactError::IncompleteBody
            | ContactError::AlreadyConsumed => "internal server error".to_string(),
        }
    }

    /// Returns true for outcomes caused by the client (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Renders as `{"error": "<public message>"}`. The full detail only goes to
/// the log.
impl IntoResponse for ContactError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ContactError::Validation(_)
            | ContactError::Conflict(_)
            | ContactError::PayloadTooLarge { .. } => {
                debug!(status = status.as_u16(), error = %self, "request rejected")
            }
            ContactError::PoolTimeout => warn!(status = status.as_u16(), error = %self, "request shed"),
            _ => error!(status = status.as_u16(), error = %self, "request failed"),
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ContactError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(constraint) => ContactError::Conflict(constraint),
            other => ContactError::StoreFault(other.to_string()),
        }
    }
}

impl From<PoolError> for ContactError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Timeout(_) => ContactError::PoolTimeout,
            other => ContactError::StoreFault(other.to_string()),
        }
    }
}

impl From<BodyError> for ContactError {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::Incomplete => ContactError::IncompleteBody,
            BodyError::AlreadyConsumed | BodyError::Sealed => ContactError::AlreadyConsumed,
        }
    }
}

impl From<BodyReadError> for ContactError {
    fn from(err: BodyReadError) -> Self {
        match err {
            BodyReadError::TooLarge { size, max } => ContactError::PayloadTooLarge { size, max },
            BodyReadError::Transport(detail) => {
                debug!(detail = %detail, "request body unreadable");
                ContactError::validation("could not read request body")
            }
            BodyReadError::Assembly(err) => ContactError::from(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        assert_eq!(ContactError::validation("bad").status_code(), 400);
        assert_eq!(
            ContactError::PayloadTooLarge { size: 2, max: 1 }.status_code(),
            413
        );
        assert_eq!(ContactError::Conflict("x".into()).status_code(), 409);
        assert_eq!(ContactError::PoolTimeout.status_code(), 503);
        assert_eq!(ContactError::StoreFault("x".into()).status_code(), 500);
        assert_eq!(ContactError::IncompleteBody.status_code(), 500);
    }

    #[test]
    fn test_oversized_body_mapping() {
        let err = ContactError::from(BodyReadError::TooLarge { size: 70_000, max: 65_536 });
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(err.is_client_error());
        assert!(!err.public_message().contains("65536"));
    }

    #[tokio::test]
    async fn test_response_body_is_public_message_only() {
        use http_body_util::BodyExt;

        let response =
            ContactError::StoreFault("connection to 10.0.0.5 refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "internal server error" }));
    }

    #[test]
    fn test_store_detail_not_public() {
        let err = ContactError::from(StoreError::Query(
            "relation \"contacts\" does not exist".into(),
        ));
        assert!(err.to_string().contains("relation"));
        assert!(!err.public_message().contains("relation"));
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = ContactError::from(StoreError::UniqueViolation("contacts_external_id_key".into()));
        assert!(matches!(err, ContactError::Conflict(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_pool_timeout_mapping() {
        let err = ContactError::from(PoolError::Timeout(Duration::from_millis(5)));
        assert_eq!(err, ContactError::PoolTimeout);
        assert!(!err.is_client_error());
    }
}
