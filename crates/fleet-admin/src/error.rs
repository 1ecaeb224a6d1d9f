//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use fleet_core::{Error as CoreError, MissingEntity};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a failed pass on `subject` to an HTTP error.
  ///
  /// A missing `subject` is a 404; any other missing entity means the
  /// request referenced something that does not exist and is a 409.
  pub fn from_pass(err: CoreError, subject: MissingEntity) -> Self {
    match err {
      CoreError::ReferentialIntegrity(missing) if missing == subject => {
        Self::NotFound(format!("{missing} does not exist"))
      }
      err @ CoreError::ReferentialIntegrity(_) => Self::Conflict(err.to_string()),
      err @ CoreError::GroupKindMismatch { .. } => Self::BadRequest(err.to_string()),
      CoreError::Store(e) => Self::Store(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
