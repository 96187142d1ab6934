//! Typed errors and HTTP mapping.

use crate::definition::model::FieldTypeTag;
use crate::emit::bundle::BundleError;
use crate::regen::WriteReport;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// One validation problem. `entity` is `app`, `app.Model` or `app.Model.member`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{entity}: {field}: {reason}")]
pub struct ValidationError {
    pub entity: String,
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(entity: impl Into<String>, field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Every problem found in one definition, in discovery order.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{} validation error(s), first: {}", .0.len(), first_or_none(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

fn first_or_none<T: std::fmt::Display>(items: &[T]) -> String {
    items.first().map(|e| e.to_string()).unwrap_or_else(|| "none".into())
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{application}.{model}.{relation}: unknown target '{target}'")]
pub struct UnknownTargetError {
    pub application: String,
    pub model: String,
    pub relation: String,
    pub target: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{} unknown relationship target(s), first: {}", .0.len(), first_or_none(.0))]
pub struct UnknownTargetErrors(pub Vec<UnknownTargetError>);

/// A cycle of required references; names every model in it, in declaration order.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("required references form a cycle among models: {}", .models_in_cycle.join(", "))]
pub struct CycleError {
    pub models_in_cycle: Vec<String>,
}

/// The type map has no entry for a tag. Never expected with the built-in map.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{application}.{model}.{field}: no target type for {type_tag}")]
pub struct UnsupportedTypeError {
    pub application: String,
    pub model: String,
    pub field: String,
    pub type_tag: FieldTypeTag,
}

/// An artifact write failed; the report says what was written, what failed and what was never tried.
#[derive(Error, Debug, Clone, Serialize)]
#[error("artifact write failed after {} written", .report.completed().len())]
pub struct WriteFailure {
    pub report: WriteReport,
}

/// Failure of one pipeline run.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    UnknownTargets(#[from] UnknownTargetErrors),
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedTypeError),
    #[error(transparent)]
    Write(#[from] WriteFailure),
    #[error("application not found: {0}")]
    NotFound(String),
    #[error("application already exists: {0}")]
    AlreadyExists(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("bundle: {0}")]
    Bundle(#[from] BundleError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Generate(e) => match e {
                GenerateError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
                GenerateError::UnknownTargets(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unknown_target"),
                GenerateError::Cycle(_) => (StatusCode::CONFLICT, "dependency_cycle"),
                GenerateError::AlreadyExists(_) => (StatusCode::CONFLICT, "conflict"),
                GenerateError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                GenerateError::UnsupportedType(_) => (StatusCode::INTERNAL_SERVER_ERROR, "unsupported_type"),
                GenerateError::Write(_) => (StatusCode::INTERNAL_SERVER_ERROR, "write_failure"),
                GenerateError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
                GenerateError::Bundle(_) => (StatusCode::INTERNAL_SERVER_ERROR, "bundle_error"),
            },
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        let AppError::Generate(e) = self else {
            return None;
        };
        match e {
            GenerateError::Validation(errs) => serde_json::to_value(&errs.0).ok(),
            GenerateError::UnknownTargets(errs) => serde_json::to_value(&errs.0).ok(),
            GenerateError::Cycle(c) => serde_json::to_value(c).ok(),
            GenerateError::UnsupportedType(u) => serde_json::to_value(u).ok(),
            GenerateError::Write(w) => serde_json::to_value(&w.report).ok(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        (status, Json(body)).into_response()
    }
}
