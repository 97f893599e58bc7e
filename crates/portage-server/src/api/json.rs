//! JSON body extraction with the standard error envelope
//!
//! Axum's stock `Json` extractor answers malformed bodies with 422 and a
//! plain-text message. Request decoding is part of this API's validation
//! contract (an engine kind outside the closed set must be a 400 before any
//! connection is attempted), so handlers take [`ApiJson`] instead: every
//! rejection becomes a 400 carrying the usual `{success, error}` envelope.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::api::response::ErrorResponse;

/// `Json` with rejections mapped into the API's error envelope.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(reject(rejection)),
        }
    }
}

fn reject(rejection: JsonRejection) -> Response {
    let message = rejection.body_text();
    // The central engine-kind validation surfaces through serde; keep its
    // taxonomy code rather than flattening it into a generic one.
    let code = if message.contains("unsupported warehouse type") {
        "UNSUPPORTED_ENGINE"
    } else {
        "VALIDATION_ERROR"
    };
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(code, message))).into_response()
}
