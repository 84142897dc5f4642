//! Metrics server error types and conversions

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Handler result type
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Ways a request can fail. None of them touch the aggregates.
#[derive(Debug)]
pub enum CollectorError {
    /// Wrong method or a body that is not a valid result
    BadRequest(String),

    /// The request body could not be read or the metrics could not be encoded
    Internal(String),
}

impl CollectorError {
    pub fn status(&self) -> StatusCode {
        match self {
            CollectorError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CollectorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CollectorError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            CollectorError::BadRequest(msg) | CollectorError::Internal(msg) => msg,
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
