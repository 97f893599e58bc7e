//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use portage_common::error::TransferError;

use crate::api::response::ErrorResponse;

/// Transfer errors carried across an HTTP boundary.
///
/// Client mistakes (an engine kind outside the closed set, a malformed row
/// set) map to 400. Everything else means an upstream warehouse failed and
/// maps to 502, with the taxonomy code and cause description in the body.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct ApiError(#[from] pub TransferError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            TransferError::UnsupportedEngine(_) | TransferError::ShapeMismatch { .. } => {
                StatusCode::BAD_REQUEST
            },
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), "transfer operation failed: {}", self.0);
        }
        let body = ErrorResponse::new(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}
