//! Feature modules implementing the portage API
//!
//! One vertical slice: warehouse transfer operations (extract, load,
//! transfer). Route handlers stay thin and delegate to the connector layer.

pub mod transfers;

use axum::Router;
use portage_connectors::Registry;
use std::sync::Arc;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Connector registry resolving engine kinds to capabilities
    pub registry: Arc<Registry>,
}

/// Creates the main API router with all feature routes mounted
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().merge(transfers::transfer_routes().with_state(state.registry))
}
