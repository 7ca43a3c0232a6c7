//! Handlers for `/jobs` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/jobs` | Optional `?archived=true\|false` |
//! | `POST`   | `/jobs` | Body: [`NewJob`]; returns 201 + stored job |
//! | `GET`    | `/jobs/:id` | Job plus its ledger, newest entry first |
//! | `PUT`    | `/jobs/:id` | Body: [`JobUpdate`] |
//! | `DELETE` | `/jobs/:id` | 204; removes the ledger too |
//! | `GET`    | `/jobs/:id/summary` | Restricted read-only projection |
//! | `PUT`    | `/jobs/:id/notes` | Body: `{"notes":"..."}`; blank clears |
//! | `POST`   | `/jobs/:id/archive` | Body: `{"archived":true}` |
//! | `POST`   | `/jobs/:id/repair` | Re-derive the aggregate from the ledger |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tally_core::{
  Ledger,
  entry::JobView,
  job::{Job, JobSummary, JobUpdate, NewJob},
  ledger::RepairOutcome,
  store::LedgerStore,
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub archived: Option<bool>,
}

/// `GET /jobs[?archived=<bool>]`
pub async fn list<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Job>>, ApiError> {
  let mut jobs = ledger.list_jobs().await?;
  if let Some(archived) = params.archived {
    jobs.retain(|j| j.archived == archived);
  }
  Ok(Json(jobs))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /jobs`, body: `{"name":"...","parts_needed":10,"assignee":"Samuil"}`
pub async fn create<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Json(body): Json<NewJob>,
) -> Result<impl IntoResponse, ApiError> {
  let job = ledger.create_job(body).await?;
  Ok((StatusCode::CREATED, Json(job)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /jobs/:id`
pub async fn get_one<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<JobView>, ApiError> {
  Ok(Json(ledger.view(id).await?))
}

/// `GET /jobs/:id/summary`
pub async fn summary<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<JobSummary>, ApiError> {
  Ok(Json(ledger.summary(id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /jobs/:id`, body: `{"name":"...","parts_needed":10,"assignee":"Oleksii"}`
pub async fn update<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<JobUpdate>,
) -> Result<Json<Job>, ApiError> {
  Ok(Json(ledger.update_job(id, body).await?))
}

#[derive(Debug, Deserialize)]
pub struct NotesBody {
  pub notes: Option<String>,
}

/// `PUT /jobs/:id/notes`, body: `{"notes":"..."}` (null or blank clears)
pub async fn update_notes<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<NotesBody>,
) -> Result<Json<Job>, ApiError> {
  Ok(Json(ledger.update_job_notes(id, body.notes).await?))
}

#[derive(Debug, Deserialize)]
pub struct ArchiveBody {
  pub archived: bool,
}

/// `POST /jobs/:id/archive`, body: `{"archived":true}`
pub async fn archive<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ArchiveBody>,
) -> Result<Json<Job>, ApiError> {
  Ok(Json(ledger.archive_job(id, body.archived).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /jobs/:id`
pub async fn delete_one<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  ledger.delete_job(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Repair ───────────────────────────────────────────────────────────────────

/// `POST /jobs/:id/repair`
pub async fn repair<S: LedgerStore + 'static>(
  State(ledger): State<Arc<Ledger<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<RepairOutcome>, ApiError> {
  Ok(Json(ledger.repair(id).await?))
}
