use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use portage_common::types::{ExtractRequest, LoadRequest, RowSet, TransferRequest};
use portage_connectors::Registry;

use crate::api::json::ApiJson;
use crate::api::response::ApiResponse;
use crate::error::ApiError;

pub fn transfer_routes() -> Router<Arc<Registry>> {
    Router::new()
        .route("/extract", post(extract))
        .route("/load", post(load))
        .route("/transfer", post(transfer))
}

/// Body of a load call: the destination descriptor plus the canonical row
/// set to write.
#[derive(Debug, Deserialize)]
pub struct LoadBody {
    pub request: LoadRequest,
    pub data: RowSet,
}

#[tracing::instrument(skip(registry, req), fields(engine = %req.kind))]
async fn extract(
    State(registry): State<Arc<Registry>>,
    ApiJson(req): ApiJson<ExtractRequest>,
) -> Result<Response, ApiError> {
    let data = registry.extractor(req.kind).extract(&req).await?;

    tracing::info!(
        rows = data.len(),
        columns = data.width(),
        "extract completed via API"
    );

    Ok(ApiResponse::success(data).into_response())
}

#[tracing::instrument(skip(registry, body), fields(engine = %body.request.kind, table = %body.request.table))]
async fn load(
    State(registry): State<Arc<Registry>>,
    ApiJson(body): ApiJson<LoadBody>,
) -> Result<Response, ApiError> {
    // Row sets arriving over the wire have not been through the
    // constructor; re-check the shape invariant before touching the engine.
    body.data.validate()?;

    registry
        .loader(body.request.kind)
        .load(&body.request, &body.data)
        .await?;

    tracing::info!(rows = body.data.len(), "load completed via API");

    Ok(ApiResponse::success(serde_json::json!({"rows": body.data.len()})).into_response())
}

#[tracing::instrument(
    skip(registry, req),
    fields(source = %req.source.kind, destination = %req.destination.kind)
)]
async fn transfer(
    State(registry): State<Arc<Registry>>,
    ApiJson(req): ApiJson<TransferRequest>,
) -> Result<Response, ApiError> {
    let outcome = portage_connectors::transfer(&registry, &req).await?;

    tracing::info!("transfer completed via API");

    Ok(ApiResponse::success(outcome).into_response())
}
