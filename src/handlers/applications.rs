//! Application handlers: CRUD on stored definitions, validate-only, generate and bundle download.

use crate::definition::types::{ApplicationDraft, ModelSchema};
use crate::error::AppError;
use crate::response::{success_many, success_one, success_one_ok, success_one_with_meta};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

/// Body of a generate call. An empty body keeps the stored flags.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateRequest {
    /// Overrides the stored `overwrite` flag for this run.
    #[serde(default)]
    pub overwrite: Option<bool>,
}

pub async fn list_applications(State(state): State<AppState>) -> impl IntoResponse {
    success_many(state.service.list())
}

pub async fn create_application(
    State(state): State<AppState>,
    Json(draft): Json<ApplicationDraft>,
) -> Result<impl IntoResponse, AppError> {
    let stored = state.service.create(draft).await?;
    Ok(success_one(stored))
}

pub async fn get_application(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_one_ok(state.service.get(&name)?))
}

pub async fn update_application(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(draft): Json<ApplicationDraft>,
) -> Result<impl IntoResponse, AppError> {
    let stored = state.service.update(&name, draft).await?;
    Ok(success_one_ok(stored))
}

pub async fn delete_application(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.service.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/applications/import: multipart form with a `name` field and a `models` (or `file`)
/// field holding the JSON model list, the same shape as the CLI `--models-file`.
pub async fn import_application(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut models: Option<Vec<ModelSchema>> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "name" => name = Some(field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?),
            "label" => label = Some(field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?),
            "models" | "file" => {
                let data = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                let parsed = serde_json::from_slice(&data)
                    .map_err(|e| AppError::BadRequest(format!("invalid models JSON: {}", e)))?;
                models = Some(parsed);
            }
            _ => {}
        }
    }
    let name = name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("missing 'name' field in multipart body".into()))?;
    let models = models.ok_or_else(|| AppError::BadRequest("missing 'models' or 'file' field in multipart body".into()))?;
    let mut draft = ApplicationDraft::from_models(name, models);
    draft.label = label.filter(|l| !l.trim().is_empty());
    let stored = state.service.create(draft).await?;
    Ok(success_one(stored))
}

/// Validate, resolve, order and emit without storing or writing anything.
pub async fn validate_application(
    State(state): State<AppState>,
    Json(draft): Json<ApplicationDraft>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_one_ok(state.service.validate(&draft)?))
}

pub async fn generate_application(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: GenerateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("invalid generate request: {}", e)))?
    };
    let report = state.service.generate(&name, request.overwrite).await?;
    let counts = serde_json::to_value(report.counts()).unwrap_or_default();
    Ok(success_one_with_meta(report, counts))
}

/// Zip of the artifacts the application would produce; the output directory is not touched.
pub async fn bundle_application(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bytes = state.service.bundle(&name)?;
    let stored = state.service.get(&name)?;
    let disposition = format!("attachment; filename=\"{}.zip\"", stored.name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
