//! Application routes under /api/v1.

use crate::handlers::{
    bundle_application, create_application, import_application, delete_application, generate_application, get_application,
    list_applications, update_application, validate_application,
};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn application_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/applications", post(create_application).get(list_applications))
        .route("/api/v1/applications/validate", post(validate_application))
        .route("/api/v1/applications/import", post(import_application))
        .route(
            "/api/v1/applications/:name",
            get(get_application).put(update_application).delete(delete_application),
        )
        .route("/api/v1/applications/:name/generate", post(generate_application))
        .route("/api/v1/applications/:name/bundle", get(bundle_application))
        .with_state(state)
}
