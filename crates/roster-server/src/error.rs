//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use roster_core::Rejection;
use serde_json::json;
use thiserror::Error;

const CHALLENGE: &str = "Basic realm=\"roster\"";

/// An error returned by a handler or extractor.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Missing or unusable `Authorization` header, or credentials that do
  /// not name an identity of the required role.
  #[error("authentication required")]
  Unauthorized,

  #[error(transparent)]
  Rejected(#[from] Rejection),

  #[error("internal error")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<roster_core::Error> for ApiError {
  fn from(e: roster_core::Error) -> Self {
    match e {
      roster_core::Error::Rejected(r) => ApiError::Rejected(r),
      roster_core::Error::Internal(source) => ApiError::Internal(source),
    }
  }
}

fn status_for(rejection: &Rejection) -> StatusCode {
  match rejection {
    Rejection::NotFound | Rejection::NotEnrolled => StatusCode::NOT_FOUND,
    Rejection::BadCredential => StatusCode::UNAUTHORIZED,
    Rejection::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
    Rejection::InvalidInput(_) | Rejection::InvalidSlot { .. } | Rejection::InvalidCapacity(_) => {
      StatusCode::BAD_REQUEST
    }
    Rejection::DuplicateIdentity
    | Rejection::SlotConflict(_)
    | Rejection::CapacityLimitExceeded { .. }
    | Rejection::SessionFull
    | Rejection::AlreadyEnrolled
    | Rejection::ScheduleConflict(_) => StatusCode::CONFLICT,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Rejected(r) => status_for(r),
      ApiError::Internal(source) => {
        tracing::error!(error = %source, "internal error");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();

    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
    }
    if let ApiError::Rejected(Rejection::Throttled { retry_after_secs }) = self {
      res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    }
    res
  }
}
