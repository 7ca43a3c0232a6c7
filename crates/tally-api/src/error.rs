//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use tally_core::Error;
use thiserror::Error;

/// An error returned by an API handler. Wraps the coordinator's error and
/// decides the status code and machine-readable `code` for it.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match &self.0 {
      Error::JobNotFound(_) | Error::EntryNotFound(_) => StatusCode::NOT_FOUND,
      Error::InvalidDelta(_) | Error::InvalidCapacity(_) | Error::Validation(_) => {
        StatusCode::UNPROCESSABLE_ENTITY
      }
      Error::DeliveryExceedsProduction { .. }
      | Error::CapacityBelowProduction { .. }
      | Error::ForeignKeyMismatch { .. }
      | Error::TotalOverflow(_) => StatusCode::CONFLICT,
      Error::PartiallyApplied { .. } | Error::Backing(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  pub fn code(&self) -> &'static str {
    match &self.0 {
      Error::InvalidDelta(_) => "invalid_delta",
      Error::InvalidCapacity(_) => "invalid_capacity",
      Error::DeliveryExceedsProduction { .. } => "delivery_exceeds_production",
      Error::CapacityBelowProduction { .. } => "capacity_below_production",
      Error::JobNotFound(_) => "job_not_found",
      Error::EntryNotFound(_) => "entry_not_found",
      Error::ForeignKeyMismatch { .. } => "foreign_key_mismatch",
      Error::Validation(_) => "validation",
      Error::TotalOverflow(_) => "total_overflow",
      Error::Backing(_) => "backing",
      Error::PartiallyApplied { .. } => "partially_applied",
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let code = self.code();
    let message = self.0.to_string();

    if status.is_server_error() {
      tracing::error!(code, error = %message, "request failed");
    }

    let body = match &self.0 {
      Error::PartiallyApplied { job_id, .. } => json!({
        "error": message,
        "code": code,
        "partially_applied": true,
        "job_id": job_id,
      }),
      _ => json!({ "error": message, "code": code }),
    };
    (status, Json(body)).into_response()
  }
}
