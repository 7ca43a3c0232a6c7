//! Handlers for ledger endpoints under `/jobs/:id`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/jobs/:id/production` | Body: [`DeltaBody`]; returns the reconciled job |
//! | `POST`   | `/jobs/:id/delivery` | Body: [`DeltaBody`]; 409 if more than is available |
//! | `PUT`    | `/jobs/:id/entries/:entry_id` | Body: `{"delta":3}` |
//! | `DELETE` | `/jobs/:id/entries/:entry_id` | Returns the reconciled job |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tally_core::{Ledger, job::Job, store::LedgerStore};
use uuid::Uuid;

use crate::error::ApiError;

/// JSON body accepted by the production and delivery endpoints.
#[derive(Debug, Deserialize)]
pub struct DeltaBody {
  pub delta:      i64,
  /// Free-form name of whoever logged the entry.
  pub updated_by: Option<String>,
}

// ─── Append ───────────────────────────────────────────────────────────────────

/// `POST /jobs/:id/production` returns 201 + the job after reconciliation.
pub async fn add_production<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<DeltaBody>,
) -> Result<impl IntoResponse, ApiError> {
  let job = ledger.add_production(id, body.delta, body.updated_by).await?;
  Ok((StatusCode::CREATED, Json(job)))
}

/// `POST /jobs/:id/delivery` returns 201 + the job with `delivered` raised.
pub async fn add_delivery<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<DeltaBody>,
) -> Result<impl IntoResponse, ApiError> {
  let job = ledger.add_delivery(id, body.delta, body.updated_by).await?;
  Ok((StatusCode::CREATED, Json(job)))
}

// ─── Correct ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EntryBody {
  pub delta: i64,
}

/// `PUT /jobs/:id/entries/:entry_id`
pub async fn update_one<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path((job_id, entry_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<EntryBody>,
) -> Result<Json<Job>, ApiError> {
  let job = ledger
    .update_history_item(job_id, entry_id, body.delta)
    .await?;
  Ok(Json(job))
}

/// `DELETE /jobs/:id/entries/:entry_id`
pub async fn delete_one<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path((job_id, entry_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Job>, ApiError> {
  Ok(Json(ledger.delete_history_item(job_id, entry_id).await?))
}
