//! HTTP error mapping.
//!
//! Every failure leaves the gateway as `{"detail": "..."}`. Client mistakes
//! and load failures carry their message; anything unexpected is logged and
//! replaced by a generic detail.

use axum::extract::rejection::{BytesRejection, JsonRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use deepresearch_core::{Error, InitError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Detail sent for internal failures.
pub const GENERIC_DETAIL: &str = "Internal server error";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Well-formed request with invalid content (e.g. empty query)
    Validation(String),
    /// Body could not be decoded into the expected shape
    Rejected { status: StatusCode, detail: String },
    /// The research capability could not be loaded
    Init(InitError),
    /// Unexpected failure while handling the request
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Init(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::Validation(msg) => {
                debug!(detail = %msg, "Rejected invalid request");
                msg
            }
            ApiError::Rejected { detail, .. } => {
                debug!(detail = %detail, "Rejected malformed request body");
                detail
            }
            ApiError::Init(err) => err.to_string(),
            ApiError::Internal(cause) => {
                error!(error = %cause, "Request failed");
                GENERIC_DETAIL.to_string()
            }
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<InitError> for ApiError {
    fn from(err: InitError) -> Self {
        ApiError::Init(err)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => ApiError::Validation(msg),
            Error::Init(init) => ApiError::Init(init),
            Error::Research(err) => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepresearch_core::ResearchError;

    #[test]
    fn status_classes() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert!(
            ApiError::Init(InitError::Construction("x".into()))
                .status()
                .is_server_error()
        );
        assert!(ApiError::Internal("x".into()).status().is_server_error());
    }

    #[test]
    fn core_errors_map_by_kind() {
        assert!(matches!(
            ApiError::from(Error::Validation("empty".into())),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from(Error::Init(InitError::Timeout { timeout_ms: 5 })),
            ApiError::Init(_)
        ));
        assert!(matches!(
            ApiError::from(Error::Research(ResearchError::Processing("boom".into()))),
            ApiError::Internal(_)
        ));
    }
}
