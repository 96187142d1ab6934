//! Router assembly.

mod applications;
mod common;

pub use applications::application_routes;
pub use common::common_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Every route, with request bodies capped at `body_limit` bytes.
pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(application_routes(state))
        .layer(RequestBodyLimitLayer::new(body_limit))
}
